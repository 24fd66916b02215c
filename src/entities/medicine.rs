//! Medicine entity - inventory item of a clinic

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Medicine {
    pub medicine_id: i64,
    pub clinic_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub unit_price_cents: i64,
    pub stock_quantity: i64,
    pub reorder_level: i64,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Medicine {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.reorder_level
    }

    /// Stock after applying `delta`, or None when it would go negative
    pub fn stock_after(&self, delta: i64) -> Option<i64> {
        self.stock_quantity
            .checked_add(delta)
            .filter(|quantity| *quantity >= 0)
    }
}
