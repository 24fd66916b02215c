//! StaffRepository - clinic memberships

use super::{Create, ReadInClinic, Update};
use crate::dtos::{CreateStaffDTO, Page, StaffQuery, UpdateStaffDTO};
use crate::entities::{Staff, StaffWithUser};
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, instrument};

const STAFF_WITH_USER_SELECT: &str = r#"
    SELECT s.staff_id, s.clinic_id, s.user_id, s.role, s.specialization_id, s.phone,
           s.is_active, u.email, u.first_name, u.last_name, s.created_at
    FROM staff s
    JOIN users u ON u.user_id = s.user_id
"#;

pub struct StaffRepository {
    connection_pool: SqlitePool,
}

impl StaffRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Current (not removed) staff row of an account
    #[instrument(skip(self))]
    pub async fn find_by_user_id(&self, user_id: &i64) -> Result<Option<Staff>, Error> {
        sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE user_id = ? AND deleted_at IS NULL")
            .bind(user_id)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Membership of an account as seen by the clinic routes: its current row,
    /// or else its most recently deactivated one
    #[instrument(skip(self))]
    pub async fn find_membership(&self, user_id: &i64) -> Result<Option<Staff>, Error> {
        sqlx::query_as::<_, Staff>(
            r#"
            SELECT * FROM staff
            WHERE user_id = ? AND (deleted_at IS NULL OR is_active = 0)
            ORDER BY deleted_at IS NOT NULL, deleted_at DESC, staff_id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.connection_pool)
        .await
    }

    /// Staff row of the clinic, deactivated members included
    #[instrument(skip(self))]
    pub async fn read_in_clinic_with_inactive(&self, clinic_id: i64, staff_id: i64) -> Result<Option<Staff>, Error> {
        sqlx::query_as::<_, Staff>("SELECT * FROM staff WHERE clinic_id = ? AND staff_id = ?")
            .bind(clinic_id)
            .bind(staff_id)
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Whether an account with this email is already staff of the clinic
    #[instrument(skip(self))]
    pub async fn is_email_in_clinic(&self, clinic_id: i64, email: &str) -> Result<bool, Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM staff s
            JOIN users u ON u.user_id = s.user_id
            WHERE s.clinic_id = ? AND u.email = ? AND s.deleted_at IS NULL
            "#,
        )
        .bind(clinic_id)
        .bind(email)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(count > 0)
    }

    #[instrument(skip(self))]
    pub async fn read_with_user(
        &self,
        clinic_id: i64,
        staff_id: i64,
    ) -> Result<Option<StaffWithUser>, Error> {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(STAFF_WITH_USER_SELECT);
        query_builder
            .push(" WHERE s.deleted_at IS NULL AND s.clinic_id = ")
            .push_bind(clinic_id)
            .push(" AND s.staff_id = ")
            .push_bind(staff_id);

        query_builder
            .build_query_as::<StaffWithUser>()
            .fetch_optional(&self.connection_pool)
            .await
    }

    /// Page of the clinic's staff plus the total matching the filters
    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        clinic_id: i64,
        query: &StaffQuery,
        page: Page,
    ) -> Result<(Vec<StaffWithUser>, i64), Error> {
        // current members by default, deactivated ones only with active=false
        fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, clinic_id: i64, query: &'a StaffQuery) {
            qb.push(" WHERE s.clinic_id = ").push_bind(clinic_id);
            match query.active {
                Some(false) => qb.push(" AND s.is_active = 0"),
                Some(true) => qb.push(" AND s.deleted_at IS NULL AND s.is_active = 1"),
                None => qb.push(" AND s.deleted_at IS NULL"),
            };
            if let Some(role) = query.role {
                qb.push(" AND s.role = ").push_bind(role);
            }
        }

        let mut count_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM staff s JOIN users u ON u.user_id = s.user_id");
        push_filters(&mut count_builder, clinic_id, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(STAFF_WITH_USER_SELECT);
        push_filters(&mut query_builder, clinic_id, query);
        query_builder
            .push(" ORDER BY u.last_name, u.first_name, s.staff_id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = query_builder
            .build_query_as::<StaffWithUser>()
            .fetch_all(&self.connection_pool)
            .await?;

        debug!("Listed {} of {} staff", items.len(), total);
        Ok((items, total))
    }

    /// Soft delete a staff row and revoke its account's refresh tokens
    #[instrument(skip(self))]
    pub async fn deactivate(&self, staff_id: i64, user_id: i64) -> Result<(), Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        sqlx::query(
            "UPDATE staff SET is_active = 0, deleted_at = ?, updated_at = ? WHERE staff_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(staff_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Staff {} deactivated", staff_id);
        Ok(())
    }
}

impl Create<Staff, CreateStaffDTO> for StaffRepository {
    #[instrument(skip(self, data), fields(clinic_id = data.clinic_id, user_id = data.user_id))]
    async fn create(&self, data: &CreateStaffDTO) -> Result<Staff, Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Staff>(
            r#"
            INSERT INTO staff (clinic_id, user_id, role, specialization_id, phone, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(data.clinic_id)
        .bind(data.user_id)
        .bind(data.role)
        .bind(data.specialization_id)
        .bind(&data.phone)
        .bind(now)
        .bind(now)
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl ReadInClinic<Staff> for StaffRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<Staff>, Error> {
        sqlx::query_as::<_, Staff>(
            "SELECT * FROM staff WHERE clinic_id = ? AND staff_id = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Update<Staff, UpdateStaffDTO, i64> for StaffRepository {
    #[instrument(skip(self, data))]
    async fn update(&self, id: &i64, data: &UpdateStaffDTO) -> Result<Staff, Error> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE staff SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(role) = data.role {
            query_builder.push(", role = ").push_bind(role);
        }
        if let Some(specialization_id) = data.specialization_id {
            query_builder.push(", specialization_id = ").push_bind(specialization_id);
        }
        if let Some(phone) = &data.phone {
            query_builder.push(", phone = ").push_bind(phone);
        }

        query_builder
            .push(" WHERE staff_id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING *");

        query_builder
            .build_query_as::<Staff>()
            .fetch_one(&self.connection_pool)
            .await
    }
}
