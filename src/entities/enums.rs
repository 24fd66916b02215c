//! Enumerations - enumerated types stored on the entities
//!
//! Every enum is persisted as upper-case text and serialized to the client
//! with the same spelling.

use serde::{Deserialize, Serialize};
use std::fmt;

// ********************* ROLES AND STATES **********************//

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffRole {
    Owner,
    Admin,
    Doctor,
    Nurse,
    Receptionist,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Owner => "OWNER",
            StaffRole::Admin => "ADMIN",
            StaffRole::Doctor => "DOCTOR",
            StaffRole::Nurse => "NURSE",
            StaffRole::Receptionist => "RECEPTIONIST",
        }
    }

    /// Roles allowed to manage the clinic (staff, invitations, settings)
    pub const MANAGERS: &'static [StaffRole] = &[StaffRole::Owner, StaffRole::Admin];

    /// Roles allowed to write clinical data
    pub const CLINICIANS: &'static [StaffRole] = &[
        StaffRole::Owner,
        StaffRole::Admin,
        StaffRole::Doctor,
        StaffRole::Nurse,
    ];

    /// Roles allowed to handle the front desk (patients, bookings, billing)
    pub const FRONT_DESK: &'static [StaffRole] = &[
        StaffRole::Owner,
        StaffRole::Admin,
        StaffRole::Doctor,
        StaffRole::Receptionist,
    ];

    pub const BILLING: &'static [StaffRole] =
        &[StaffRole::Owner, StaffRole::Admin, StaffRole::Receptionist];
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Purpose of a single-use token mailed to the account owner
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenPurpose {
    EmailConfirmation,
    PasswordReset,
}
