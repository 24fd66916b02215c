//! ClinicRepository - tenants

use super::{Read, Update};
use crate::dtos::{CreateClinicDTO, UpdateClinicDTO};
use crate::entities::{Clinic, Staff, StaffRole};
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, instrument};

pub struct ClinicRepository {
    connection_pool: SqlitePool,
}

impl ClinicRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Create a clinic and its OWNER staff row in one transaction
    #[instrument(skip(self, data), fields(clinic = %data.name))]
    pub async fn create_with_owner(
        &self,
        data: &CreateClinicDTO,
        owner_user_id: i64,
        specialization_id: Option<i64>,
        phone: Option<&str>,
    ) -> Result<(Clinic, Staff), Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        let clinic = sqlx::query_as::<_, Clinic>(
            r#"
            INSERT INTO clinics (name, address, phone, email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(data.name.trim())
        .bind(&data.address)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let owner = sqlx::query_as::<_, Staff>(
            r#"
            INSERT INTO staff (clinic_id, user_id, role, specialization_id, phone, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            RETURNING *
            "#,
        )
        .bind(clinic.clinic_id)
        .bind(owner_user_id)
        .bind(StaffRole::Owner)
        .bind(specialization_id)
        .bind(phone)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Clinic {} created with owner staff {}", clinic.clinic_id, owner.staff_id);
        Ok((clinic, owner))
    }
}

impl Read<Clinic, i64> for ClinicRepository {
    #[instrument(skip(self))]
    async fn read(&self, id: &i64) -> Result<Option<Clinic>, Error> {
        sqlx::query_as::<_, Clinic>("SELECT * FROM clinics WHERE clinic_id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.connection_pool)
            .await
    }
}

impl Update<Clinic, UpdateClinicDTO, i64> for ClinicRepository {
    #[instrument(skip(self, data))]
    async fn update(&self, id: &i64, data: &UpdateClinicDTO) -> Result<Clinic, Error> {
        debug!("Updating clinic");
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE clinics SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(name) = &data.name {
            query_builder.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(address) = &data.address {
            query_builder.push(", address = ").push_bind(address);
        }
        if let Some(phone) = &data.phone {
            query_builder.push(", phone = ").push_bind(phone);
        }
        if let Some(email) = &data.email {
            query_builder.push(", email = ").push_bind(email);
        }

        query_builder
            .push(" WHERE clinic_id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING *");

        query_builder
            .build_query_as::<Clinic>()
            .fetch_one(&self.connection_pool)
            .await
    }
}
