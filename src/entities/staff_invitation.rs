//! StaffInvitation entity - token based invitation to join a clinic
//!
//! Lifecycle: `PENDING -> ACCEPTED | EXPIRED | CANCELLED`. Expiry is not
//! written by a background job: a pending invitation whose `expires_at` is
//! in the past is reported (and persisted on first encounter) as EXPIRED.

use super::enums::{InvitationStatus, StaffRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct StaffInvitation {
    pub invitation_id: i64,
    pub clinic_id: i64,
    pub email: String,
    pub role: StaffRole,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub status: InvitationStatus,
    pub invited_by: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Reason an invitation refused a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationGuardError {
    /// The invitation is in a state that does not allow the transition
    NotPending(InvitationStatus),
    /// The invitation was pending but its deadline has passed
    Expired,
}

impl StaffInvitation {
    /// Status with the expiry deadline applied
    pub fn effective_status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.status == InvitationStatus::Pending && now >= self.expires_at {
            InvitationStatus::Expired
        } else {
            self.status
        }
    }

    /// True when the stored status is PENDING but the deadline has passed
    pub fn is_stale_pending(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && now >= self.expires_at
    }

    pub fn ensure_acceptable(&self, now: DateTime<Utc>) -> Result<(), InvitationGuardError> {
        match self.effective_status(now) {
            InvitationStatus::Pending => Ok(()),
            InvitationStatus::Expired => Err(InvitationGuardError::Expired),
            other => Err(InvitationGuardError::NotPending(other)),
        }
    }

    pub fn ensure_cancellable(&self, now: DateTime<Utc>) -> Result<(), InvitationGuardError> {
        match self.effective_status(now) {
            InvitationStatus::Pending => Ok(()),
            other => Err(InvitationGuardError::NotPending(other)),
        }
    }

    /// Resend re-opens EXPIRED invitations with a fresh token
    pub fn ensure_resendable(&self) -> Result<(), InvitationGuardError> {
        match self.status {
            InvitationStatus::Pending | InvitationStatus::Expired => Ok(()),
            other => Err(InvitationGuardError::NotPending(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invitation(status: InvitationStatus, expires_in: Duration) -> StaffInvitation {
        let now = Utc::now();
        StaffInvitation {
            invitation_id: 1,
            clinic_id: 1,
            email: "nurse@example.com".to_string(),
            role: StaffRole::Nurse,
            token_hash: "hash".to_string(),
            status,
            invited_by: 1,
            expires_at: now + expires_in,
            created_at: now,
            accepted_at: None,
            cancelled_at: None,
        }
    }

    #[test]
    fn pending_invitation_can_be_accepted_before_deadline() {
        let inv = invitation(InvitationStatus::Pending, Duration::days(1));
        assert_eq!(inv.effective_status(Utc::now()), InvitationStatus::Pending);
        assert!(inv.ensure_acceptable(Utc::now()).is_ok());
    }

    #[test]
    fn expired_invitation_cannot_be_accepted() {
        let inv = invitation(InvitationStatus::Pending, Duration::hours(-1));
        assert_eq!(inv.effective_status(Utc::now()), InvitationStatus::Expired);
        assert!(inv.is_stale_pending(Utc::now()));
        assert_eq!(
            inv.ensure_acceptable(Utc::now()),
            Err(InvitationGuardError::Expired)
        );
    }

    #[test]
    fn deadline_is_exclusive() {
        let inv = invitation(InvitationStatus::Pending, Duration::zero());
        assert_eq!(
            inv.ensure_acceptable(inv.expires_at),
            Err(InvitationGuardError::Expired)
        );
    }

    #[test]
    fn terminal_states_refuse_accept_and_cancel() {
        for status in [InvitationStatus::Accepted, InvitationStatus::Cancelled] {
            let inv = invitation(status, Duration::days(1));
            assert_eq!(
                inv.ensure_acceptable(Utc::now()),
                Err(InvitationGuardError::NotPending(status))
            );
            assert_eq!(
                inv.ensure_cancellable(Utc::now()),
                Err(InvitationGuardError::NotPending(status))
            );
            assert!(inv.ensure_resendable().is_err());
        }
    }

    #[test]
    fn expired_invitation_can_be_resent_but_not_cancelled() {
        let inv = invitation(InvitationStatus::Expired, Duration::hours(-2));
        assert!(inv.ensure_resendable().is_ok());
        assert_eq!(
            inv.ensure_cancellable(Utc::now()),
            Err(InvitationGuardError::NotPending(InvitationStatus::Expired))
        );
    }
}
