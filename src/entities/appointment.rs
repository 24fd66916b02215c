//! Appointment entity - a booked slot between a patient and a staff member

use super::enums::AppointmentStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_DURATION_MINUTES: i64 = 5;
pub const MAX_DURATION_MINUTES: i64 = 480;

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Appointment {
    pub appointment_id: i64,
    pub clinic_id: i64,
    pub patient_id: i64,
    pub staff_id: i64,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }

    /// Half-open interval overlap: back-to-back slots do not collide
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_at < end && start < self.ends_at()
    }

    pub fn is_editable(&self) -> bool {
        self.status == AppointmentStatus::Scheduled
    }
}

impl AppointmentStatus {
    /// Only a scheduled appointment moves, and only to a final state
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (
                AppointmentStatus::Scheduled,
                AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn appointment_at(hour: u32, minutes: i64) -> Appointment {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap();
        Appointment {
            appointment_id: 1,
            clinic_id: 1,
            patient_id: 1,
            staff_id: 1,
            scheduled_at: start,
            duration_minutes: minutes,
            status: AppointmentStatus::Scheduled,
            reason: None,
            notes: None,
            created_at: start,
            updated_at: start,
            deleted_at: None,
        }
    }

    #[test]
    fn overlapping_slots_collide() {
        let a = appointment_at(9, 30);
        let start = a.scheduled_at + Duration::minutes(15);
        assert!(a.overlaps(start, start + Duration::minutes(30)));
    }

    #[test]
    fn back_to_back_slots_do_not_collide() {
        let a = appointment_at(9, 30);
        let start = a.ends_at();
        assert!(!a.overlaps(start, start + Duration::minutes(30)));
        assert!(!a.overlaps(a.scheduled_at - Duration::minutes(30), a.scheduled_at));
    }

    #[test]
    fn status_transitions() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(NoShow));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(!Scheduled.can_transition_to(Scheduled));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Scheduled));
    }
}
