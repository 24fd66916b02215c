//! Clinic DTOs - onboarding and clinic settings

use super::validation::{validate_not_blank, validate_phone};
use crate::dtos::StaffDTO;
use crate::entities::Clinic;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClinicDTO {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl From<Clinic> for ClinicDTO {
    fn from(value: Clinic) -> Self {
        Self {
            id: value.clinic_id,
            name: value.name,
            address: value.address,
            phone: value.phone,
            email: value.email,
        }
    }
}

/// DTO to create a clinic during onboarding
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateClinicDTO {
    #[validate(
        length(min = 2, max = 150, message = "Clinic name must be between 2 and 150 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

/// Onboarding request: the clinic plus the owner's own staff details
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CompleteOnboardingDTO {
    #[validate(nested)]
    pub clinic: CreateClinicDTO,
    pub specialization_id: Option<i64>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OnboardingResultDTO {
    pub clinic: ClinicDTO,
    pub staff: StaffDTO,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateClinicDTO {
    #[validate(
        length(min = 2, max = 150, message = "Clinic name must be between 2 and 150 characters"),
        custom(function = "validate_not_blank")
    )]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}
