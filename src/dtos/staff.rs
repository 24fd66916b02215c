//! Staff DTOs

use super::validation::validate_phone;
use crate::entities::{Staff, StaffRole, StaffWithUser};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StaffDTO {
    pub id: i64,
    pub clinic_id: i64,
    pub user_id: i64,
    pub role: StaffRole,
    pub specialization_id: Option<i64>,
    pub phone: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Staff> for StaffDTO {
    fn from(value: Staff) -> Self {
        Self {
            id: value.staff_id,
            clinic_id: value.clinic_id,
            user_id: value.user_id,
            role: value.role,
            specialization_id: value.specialization_id,
            phone: value.phone,
            is_active: value.is_active,
            email: None, // lives on the account, filled by joined queries
            first_name: None,
            last_name: None,
            created_at: value.created_at,
        }
    }
}

impl From<StaffWithUser> for StaffDTO {
    fn from(value: StaffWithUser) -> Self {
        Self {
            id: value.staff_id,
            clinic_id: value.clinic_id,
            user_id: value.user_id,
            role: value.role,
            specialization_id: value.specialization_id,
            phone: value.phone,
            is_active: value.is_active,
            email: Some(value.email),
            first_name: Some(value.first_name),
            last_name: Some(value.last_name),
            created_at: value.created_at,
        }
    }
}

/// DTO to create a staff row (onboarding or invitation acceptance)
#[derive(Debug, Clone)]
pub struct CreateStaffDTO {
    pub clinic_id: i64,
    pub user_id: i64,
    pub role: StaffRole,
    pub specialization_id: Option<i64>,
    pub phone: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateStaffDTO {
    pub role: Option<StaffRole>,
    pub specialization_id: Option<i64>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
}

impl UpdateStaffDTO {
    /// True when only the fields a staff member may edit on itself are set
    pub fn is_self_service(&self) -> bool {
        self.role.is_none()
    }
}

/// Query parameters of `GET /staff`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StaffQuery {
    pub role: Option<StaffRole>,
    pub active: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
