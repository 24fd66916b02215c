//! Appointment DTOs

use crate::entities::appointment::{MAX_DURATION_MINUTES, MIN_DURATION_MINUTES};
use crate::entities::{Appointment, AppointmentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppointmentDTO {
    pub id: i64,
    pub patient_id: i64,
    pub staff_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Appointment> for AppointmentDTO {
    fn from(value: Appointment) -> Self {
        Self {
            ends_at: value.ends_at(),
            id: value.appointment_id,
            patient_id: value.patient_id,
            staff_id: value.staff_id,
            scheduled_at: value.scheduled_at,
            duration_minutes: value.duration_minutes,
            status: value.status,
            reason: value.reason,
            notes: value.notes,
            created_at: value.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateAppointmentDTO {
    pub patient_id: i64,
    pub staff_id: i64,
    pub scheduled_at: DateTime<Utc>,
    #[validate(range(
        min = MIN_DURATION_MINUTES,
        max = MAX_DURATION_MINUTES,
        message = "Duration must be between 5 and 480 minutes"
    ))]
    pub duration_minutes: i64,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateAppointmentDTO {
    pub staff_id: Option<i64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[validate(range(
        min = MIN_DURATION_MINUTES,
        max = MAX_DURATION_MINUTES,
        message = "Duration must be between 5 and 480 minutes"
    ))]
    pub duration_minutes: Option<i64>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[validate(length(max = 4000))]
    pub notes: Option<String>,
}

/// Repository level update, status included
#[derive(Debug, Clone, Default)]
pub struct AppointmentChangesDTO {
    pub staff_id: Option<i64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl From<UpdateAppointmentDTO> for AppointmentChangesDTO {
    fn from(value: UpdateAppointmentDTO) -> Self {
        Self {
            staff_id: value.staff_id,
            scheduled_at: value.scheduled_at,
            duration_minutes: value.duration_minutes,
            reason: value.reason,
            notes: value.notes,
            status: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppointmentStatusDTO {
    pub status: AppointmentStatus,
}

/// Query parameters of `GET /appointments`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AppointmentQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub staff_id: Option<i64>,
    pub patient_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}
