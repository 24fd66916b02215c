//! Medicine DTOs - inventory

use super::validation::validate_not_blank;
use crate::entities::Medicine;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use super::invoice::MAX_UNIT_PRICE_CENTS;
use validator::Validate;

/// Bounds of a single stock movement
pub const MIN_STOCK_DELTA: i64 = -1_000_000;
pub const MAX_STOCK_DELTA: i64 = 1_000_000;
pub const MAX_STOCK_QUANTITY: i64 = 1_000_000_000;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MedicineDTO {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub unit_price_cents: i64,
    pub stock_quantity: i64,
    pub reorder_level: i64,
    pub low_stock: bool,
    pub expiry_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl From<Medicine> for MedicineDTO {
    fn from(value: Medicine) -> Self {
        Self {
            low_stock: value.is_low_stock(),
            id: value.medicine_id,
            name: value.name,
            description: value.description,
            unit: value.unit,
            unit_price_cents: value.unit_price_cents,
            stock_quantity: value.stock_quantity,
            reorder_level: value.reorder_level,
            expiry_date: value.expiry_date,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateMedicineDTO {
    #[validate(
        length(min = 1, max = 150, message = "Name must be between 1 and 150 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 30, message = "Unit must be between 1 and 30 characters"))]
    pub unit: String,
    #[validate(range(min = 0, max = MAX_UNIT_PRICE_CENTS, message = "Price must be between 0 and 10000000000 cents"))]
    pub unit_price_cents: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = MAX_STOCK_QUANTITY, message = "Stock must be between 0 and 1000000000"))]
    pub stock_quantity: i64,
    #[serde(default)]
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    pub reorder_level: i64,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateMedicineDTO {
    #[validate(
        length(min = 1, max = 150, message = "Name must be between 1 and 150 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub unit: Option<String>,
    #[validate(range(min = 0, max = MAX_UNIT_PRICE_CENTS, message = "Price must be between 0 and 10000000000 cents"))]
    pub unit_price_cents: Option<i64>,
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    pub reorder_level: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct StockAdjustmentDTO {
    #[validate(range(min = MIN_STOCK_DELTA, max = MAX_STOCK_DELTA, message = "Delta must be between -1000000 and 1000000"))]
    pub delta: i64,
    #[validate(length(max = 255))]
    pub reason: Option<String>,
}

/// Query parameters of `GET /medicines`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MedicineQuery {
    pub search: Option<String>,
    pub low_stock: Option<bool>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
