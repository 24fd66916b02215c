//! PatientRepository

use super::{Create, Delete, ReadInClinic, Update, like_prefix};
use crate::dtos::{CreatePatientDTO, Page, UpdatePatientDTO};
use crate::entities::Patient;
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

pub struct PatientRepository {
    connection_pool: SqlitePool,
}

impl PatientRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Page of patients; `search` is a case-insensitive prefix matched
    /// against first name, last name, email and phone
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        clinic_id: i64,
        search: Option<&str>,
        page: Page,
    ) -> Result<(Vec<Patient>, i64), Error> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_prefix);

        fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, clinic_id: i64, pattern: &Option<String>) {
            qb.push(" WHERE clinic_id = ")
                .push_bind(clinic_id)
                .push(" AND deleted_at IS NULL");
            if let Some(pattern) = pattern {
                qb.push(" AND (");
                for (i, column) in ["first_name", "last_name", "email", "phone"].iter().enumerate() {
                    if i > 0 {
                        qb.push(" OR ");
                    }
                    qb.push(*column)
                        .push(" LIKE ")
                        .push_bind(pattern.clone())
                        .push(" ESCAPE '\\'");
                }
                qb.push(")");
            }
        }

        let mut count_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM patients");
        push_filters(&mut count_builder, clinic_id, &pattern);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM patients");
        push_filters(&mut query_builder, clinic_id, &pattern);
        query_builder
            .push(" ORDER BY last_name, first_name, patient_id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let patients = query_builder
            .build_query_as::<Patient>()
            .fetch_all(&self.connection_pool)
            .await?;

        debug!("Found {} of {} patients", patients.len(), total);
        Ok((patients, total))
    }
}

impl Create<Patient, (i64, CreatePatientDTO)> for PatientRepository {
    #[instrument(skip(self, data))]
    async fn create(&self, data: &(i64, CreatePatientDTO)) -> Result<Patient, Error> {
        let (clinic_id, data) = data;
        let now = Utc::now();

        sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (clinic_id, first_name, last_name, date_of_birth, gender, phone, email, address, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(clinic_id)
        .bind(data.first_name.trim())
        .bind(data.last_name.trim())
        .bind(data.date_of_birth)
        .bind(data.gender)
        .bind(&data.phone)
        .bind(&data.email)
        .bind(&data.address)
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl ReadInClinic<Patient> for PatientRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<Patient>, Error> {
        sqlx::query_as::<_, Patient>(
            "SELECT * FROM patients WHERE clinic_id = ? AND patient_id = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Update<Patient, UpdatePatientDTO, i64> for PatientRepository {
    #[instrument(skip(self, data))]
    async fn update(&self, id: &i64, data: &UpdatePatientDTO) -> Result<Patient, Error> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE patients SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(first_name) = &data.first_name {
            query_builder.push(", first_name = ").push_bind(first_name.trim().to_string());
        }
        if let Some(last_name) = &data.last_name {
            query_builder.push(", last_name = ").push_bind(last_name.trim().to_string());
        }
        if let Some(date_of_birth) = data.date_of_birth {
            query_builder.push(", date_of_birth = ").push_bind(date_of_birth);
        }
        if let Some(gender) = data.gender {
            query_builder.push(", gender = ").push_bind(gender);
        }
        if let Some(phone) = &data.phone {
            query_builder.push(", phone = ").push_bind(phone);
        }
        if let Some(email) = &data.email {
            query_builder.push(", email = ").push_bind(email);
        }
        if let Some(address) = &data.address {
            query_builder.push(", address = ").push_bind(address);
        }
        if let Some(notes) = &data.notes {
            query_builder.push(", notes = ").push_bind(notes);
        }

        query_builder
            .push(" WHERE patient_id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING *");

        query_builder
            .build_query_as::<Patient>()
            .fetch_one(&self.connection_pool)
            .await
    }
}

impl Delete<i64> for PatientRepository {
    #[instrument(skip(self))]
    async fn delete(&self, id: &i64) -> Result<(), Error> {
        let now = Utc::now();
        sqlx::query("UPDATE patients SET deleted_at = ?, updated_at = ? WHERE patient_id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(())
    }
}
