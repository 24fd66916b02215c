//! Medical record DTOs, measurement attributes included

use super::validation::validate_not_blank;
use crate::entities::{MeasurementAttribute, MedicalRecord, RecordMeasurement};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeasurementDTO {
    pub attribute_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub value: String,
}

impl From<RecordMeasurement> for MeasurementDTO {
    fn from(value: RecordMeasurement) -> Self {
        Self {
            attribute_id: value.attribute_id,
            name: value.name,
            unit: value.unit,
            value: value.value,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MedicalRecordDTO {
    pub id: i64,
    pub patient_id: i64,
    pub staff_id: i64,
    pub appointment_id: Option<i64>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Vec<MeasurementDTO>>,
}

impl From<MedicalRecord> for MedicalRecordDTO {
    fn from(value: MedicalRecord) -> Self {
        Self {
            id: value.record_id,
            patient_id: value.patient_id,
            staff_id: value.staff_id,
            appointment_id: value.appointment_id,
            diagnosis: value.diagnosis,
            treatment: value.treatment,
            notes: value.notes,
            recorded_at: value.recorded_at,
            updated_at: value.updated_at,
            measurements: None,
        }
    }
}

impl From<(MedicalRecord, Vec<RecordMeasurement>)> for MedicalRecordDTO {
    fn from(value: (MedicalRecord, Vec<RecordMeasurement>)) -> Self {
        let (record, measurements) = value;
        let mut dto = MedicalRecordDTO::from(record);
        dto.measurements = Some(measurements.into_iter().map(MeasurementDTO::from).collect());
        dto
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct MeasurementInputDTO {
    pub attribute_id: i64,
    #[validate(length(min = 1, max = 100, message = "Value must be between 1 and 100 characters"))]
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateMedicalRecordDTO {
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    #[validate(
        length(min = 1, max = 2000, message = "Diagnosis must be between 1 and 2000 characters"),
        custom(function = "validate_not_blank")
    )]
    pub diagnosis: String,
    #[validate(length(max = 4000))]
    pub treatment: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(nested)]
    pub measurements: Vec<MeasurementInputDTO>,
}

/// Repository level data for a new record
#[derive(Debug, Clone)]
pub struct NewMedicalRecordDTO {
    pub clinic_id: i64,
    pub staff_id: i64,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub measurements: Vec<MeasurementInputDTO>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateMedicalRecordDTO {
    #[validate(
        length(min = 1, max = 2000, message = "Diagnosis must be between 1 and 2000 characters"),
        custom(function = "validate_not_blank")
    )]
    pub diagnosis: Option<String>,
    #[validate(length(max = 4000))]
    pub treatment: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
    /// when present, replaces every measurement of the record
    #[validate(nested)]
    pub measurements: Option<Vec<MeasurementInputDTO>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeasurementAttributeDTO {
    pub id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MeasurementAttribute> for MeasurementAttributeDTO {
    fn from(value: MeasurementAttribute) -> Self {
        Self {
            id: value.attribute_id,
            name: value.name,
            unit: value.unit,
            created_at: value.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateMeasurementAttributeDTO {
    #[validate(
        length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 30))]
    pub unit: Option<String>,
}
