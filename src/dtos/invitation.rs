//! Invitation DTOs - Data Transfer Objects for staff invitations

use super::validation::{validate_not_blank, validate_password};
use crate::dtos::{StaffDTO, TokenResponseDTO};
use crate::entities::{InvitationStatus, StaffInvitation, StaffRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvitationDTO {
    pub id: i64,
    pub clinic_id: i64,
    pub email: String,
    pub role: StaffRole,
    /// status with the expiry deadline applied
    pub status: InvitationStatus,
    pub invited_by: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl InvitationDTO {
    pub fn from_entity(value: StaffInvitation, now: DateTime<Utc>) -> Self {
        Self {
            status: value.effective_status(now),
            id: value.invitation_id,
            clinic_id: value.clinic_id,
            email: value.email,
            role: value.role,
            invited_by: value.invited_by,
            expires_at: value.expires_at,
            created_at: value.created_at,
            accepted_at: value.accepted_at,
            cancelled_at: value.cancelled_at,
        }
    }
}

/// DTO to create a new invitation
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateInvitationDTO {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub role: StaffRole,
}

/// Repository level data for a new invitation
#[derive(Debug, Clone)]
pub struct NewInvitationDTO {
    pub clinic_id: i64,
    pub email: String,
    pub role: StaffRole,
    pub token_hash: String,
    pub invited_by: i64,
    pub expires_at: DateTime<Utc>,
}

/// Public view of an invitation looked up by its token
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvitationPreviewDTO {
    pub clinic_name: String,
    pub email: String,
    pub role: StaffRole,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct AcceptInvitationDTO {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
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
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AcceptedInvitationDTO {
    pub staff: StaffDTO,
    pub tokens: TokenResponseDTO,
}

/// Response of create / resend: the raw token is only shown here
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IssuedInvitationDTO {
    pub invitation: InvitationDTO,
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InvitationQuery {
    pub status: Option<InvitationStatus>,
}
