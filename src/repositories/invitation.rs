//! InvitationRepository - staff invitations and their state transitions

use super::{Create, ReadInClinic};
use crate::dtos::{CreateUserDTO, NewInvitationDTO};
use crate::entities::{InvitationStatus, Staff, StaffInvitation, User};
use chrono::{DateTime, Utc};
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, instrument, warn};

/// Account that ends up owning the staff row of an accepted invitation
pub enum InvitationAccount {
    Existing(User),
    New(CreateUserDTO),
}

pub struct InvitationRepository {
    connection_pool: SqlitePool,
}

impl InvitationRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    #[instrument(skip(self, token_hash))]
    pub async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<StaffInvitation>, Error> {
        sqlx::query_as::<_, StaffInvitation>("SELECT * FROM staff_invitations WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Check if there's already a pending, unexpired invitation for the email
    #[instrument(skip(self))]
    pub async fn has_pending_invitation(
        &self,
        clinic_id: i64,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM staff_invitations
            WHERE clinic_id = ? AND email = ? AND status = 'PENDING' AND expires_at > ?
            "#,
        )
        .bind(clinic_id)
        .bind(email)
        .bind(now)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(count > 0)
    }

    /// Invitations of a clinic, newest first. The status filter is applied
    /// to the effective status, so stale PENDING rows count as EXPIRED.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        clinic_id: i64,
        status: Option<InvitationStatus>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StaffInvitation>, Error> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM staff_invitations WHERE clinic_id = ");
        query_builder.push_bind(clinic_id);

        match status {
            Some(InvitationStatus::Pending) => {
                query_builder
                    .push(" AND status = 'PENDING' AND expires_at > ")
                    .push_bind(now);
            }
            Some(InvitationStatus::Expired) => {
                query_builder
                    .push(" AND (status = 'EXPIRED' OR (status = 'PENDING' AND expires_at <= ")
                    .push_bind(now)
                    .push("))");
            }
            Some(other) => {
                query_builder.push(" AND status = ").push_bind(other);
            }
            None => {}
        }
        query_builder.push(" ORDER BY created_at DESC, invitation_id DESC");

        query_builder
            .build_query_as::<StaffInvitation>()
            .fetch_all(&self.connection_pool)
            .await
    }

    /// Persist the expiry of a stale PENDING invitation
    #[instrument(skip(self))]
    pub async fn mark_expired(&self, invitation_id: i64) -> Result<(), Error> {
        sqlx::query(
            "UPDATE staff_invitations SET status = 'EXPIRED' WHERE invitation_id = ? AND status = 'PENDING'",
        )
        .bind(invitation_id)
        .execute(&self.connection_pool)
        .await?;

        debug!("Invitation {} marked as expired", invitation_id);
        Ok(())
    }

    /// PENDING -> CANCELLED; `RowNotFound` if it is no longer pending
    #[instrument(skip(self))]
    pub async fn cancel(&self, invitation_id: i64) -> Result<StaffInvitation, Error> {
        sqlx::query_as::<_, StaffInvitation>(
            r#"
            UPDATE staff_invitations SET status = 'CANCELLED', cancelled_at = ?
            WHERE invitation_id = ? AND status = 'PENDING'
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(invitation_id)
        .fetch_one(&self.connection_pool)
        .await
    }

    /// Give a PENDING or EXPIRED invitation a new token and deadline
    #[instrument(skip(self, token_hash))]
    pub async fn reissue(
        &self,
        invitation_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<StaffInvitation, Error> {
        sqlx::query_as::<_, StaffInvitation>(
            r#"
            UPDATE staff_invitations SET status = 'PENDING', token_hash = ?, expires_at = ?
            WHERE invitation_id = ? AND status IN ('PENDING', 'EXPIRED')
            RETURNING *
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(invitation_id)
        .fetch_one(&self.connection_pool)
        .await
    }

    /// Accept an invitation: create the account if needed, create the staff
    /// row and mark the invitation ACCEPTED, all in one transaction.
    #[instrument(skip(self, invitation, account), fields(invitation_id = invitation.invitation_id))]
    pub async fn accept(
        &self,
        invitation: &StaffInvitation,
        account: InvitationAccount,
    ) -> Result<(User, Staff), Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        let user = match account {
            InvitationAccount::Existing(mut user) => {
                // the invitation link proves ownership of the address
                if !user.email_confirmed {
                    sqlx::query("UPDATE users SET email_confirmed = 1, updated_at = ? WHERE user_id = ?")
                        .bind(now)
                        .bind(user.user_id)
                        .execute(&mut *tx)
                        .await?;
                    user.email_confirmed = true;
                }
                user
            }
            InvitationAccount::New(data) => {
                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (email, password_hash, first_name, last_name, email_confirmed, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    RETURNING *
                    "#,
                )
                .bind(&data.email)
                .bind(&data.password_hash)
                .bind(&data.first_name)
                .bind(&data.last_name)
                .bind(data.email_confirmed)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let staff = sqlx::query_as::<_, Staff>(
            r#"
            INSERT INTO staff (clinic_id, user_id, role, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(invitation.clinic_id)
        .bind(user.user_id)
        .bind(invitation.role)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let accepted = sqlx::query(
            r#"
            UPDATE staff_invitations SET status = 'ACCEPTED', accepted_at = ?
            WHERE invitation_id = ? AND status = 'PENDING'
            "#,
        )
        .bind(now)
        .bind(invitation.invitation_id)
        .execute(&mut *tx)
        .await?;

        if accepted.rows_affected() == 0 {
            warn!("Invitation changed state during acceptance");
            return Err(Error::RowNotFound);
        }

        tx.commit().await?;
        info!("Invitation accepted, staff {} created", staff.staff_id);
        Ok((user, staff))
    }
}

impl Create<StaffInvitation, NewInvitationDTO> for InvitationRepository {
    #[instrument(skip(self, data), fields(clinic_id = data.clinic_id))]
    async fn create(&self, data: &NewInvitationDTO) -> Result<StaffInvitation, Error> {
        sqlx::query_as::<_, StaffInvitation>(
            r#"
            INSERT INTO staff_invitations (clinic_id, email, role, token_hash, status, invited_by, expires_at, created_at)
            VALUES (?, ?, ?, ?, 'PENDING', ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(data.clinic_id)
        .bind(&data.email)
        .bind(data.role)
        .bind(&data.token_hash)
        .bind(data.invited_by)
        .bind(data.expires_at)
        .bind(Utc::now())
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl ReadInClinic<StaffInvitation> for InvitationRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<StaffInvitation>, Error> {
        sqlx::query_as::<_, StaffInvitation>(
            "SELECT * FROM staff_invitations WHERE clinic_id = ? AND invitation_id = ?",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}
