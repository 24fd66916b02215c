//! Patient DTOs

use super::validation::{validate_not_blank, validate_phone};
use crate::entities::{Gender, Patient};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PatientDTO {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Patient> for PatientDTO {
    fn from(value: Patient) -> Self {
        Self {
            id: value.patient_id,
            first_name: value.first_name,
            last_name: value.last_name,
            date_of_birth: value.date_of_birth,
            gender: value.gender,
            phone: value.phone,
            email: value.email,
            address: value.address,
            notes: value.notes,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreatePatientDTO {
    #[validate(
        length(min = 1, max = 100, message = "First name must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub first_name: String,
    #[validate(
        length(min = 1, max = 100, message = "Last name must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdatePatientDTO {
    #[validate(
        length(min = 1, max = 100, message = "First name must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 1, max = 100, message = "Last name must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub last_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

/// Query parameters of `GET /patients`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
