//! Specialization entity - global reference data seeded by migrations

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Specialization {
    pub specialization_id: i64,
    pub name: String,
}
