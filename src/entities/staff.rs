//! Staff entity - membership of a user account in a clinic

use super::enums::StaffRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Staff {
    pub staff_id: i64,
    pub clinic_id: i64,
    pub user_id: i64,
    pub role: StaffRole,
    pub specialization_id: Option<i64>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Staff {
    pub fn has_any_role(&self, roles: &[StaffRole]) -> bool {
        roles.contains(&self.role)
    }

    pub fn is_owner(&self) -> bool {
        self.role == StaffRole::Owner
    }
}

/// Staff row joined with the account it belongs to, used by listings
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct StaffWithUser {
    pub staff_id: i64,
    pub clinic_id: i64,
    pub user_id: i64,
    pub role: StaffRole,
    pub specialization_id: Option<i64>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
}
