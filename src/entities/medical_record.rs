//! MedicalRecord entity and the measurement attributes attached to records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct MedicalRecord {
    pub record_id: i64,
    pub clinic_id: i64,
    pub patient_id: i64,
    pub staff_id: i64,
    pub appointment_id: Option<i64>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Clinic-defined measurement (e.g. "Blood pressure", "Weight")
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct MeasurementAttribute {
    pub attribute_id: i64,
    pub clinic_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Value of an attribute measured in a record, joined with the attribute name
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct RecordMeasurement {
    pub record_id: i64,
    pub attribute_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub value: String,
}
