//! MeasurementAttributeRepository - clinic defined measurement kinds

use super::{Create, Delete, ReadInClinic};
use crate::dtos::CreateMeasurementAttributeDTO;
use crate::entities::MeasurementAttribute;
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

pub struct MeasurementAttributeRepository {
    connection_pool: SqlitePool,
}

impl MeasurementAttributeRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    #[instrument(skip(self))]
    pub async fn find_by_name(&self, clinic_id: i64, name: &str) -> Result<Option<MeasurementAttribute>, Error> {
        sqlx::query_as::<_, MeasurementAttribute>(
            "SELECT * FROM measurement_attributes WHERE clinic_id = ? AND name = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(name.trim())
        .fetch_optional(&self.connection_pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn list(&self, clinic_id: i64) -> Result<Vec<MeasurementAttribute>, Error> {
        sqlx::query_as::<_, MeasurementAttribute>(
            "SELECT * FROM measurement_attributes WHERE clinic_id = ? AND deleted_at IS NULL ORDER BY name",
        )
        .bind(clinic_id)
        .fetch_all(&self.connection_pool)
        .await
    }

    /// The subset of `ids` that are live attributes of the clinic
    #[instrument(skip(self))]
    pub async fn existing_ids(&self, clinic_id: i64, ids: &[i64]) -> Result<Vec<i64>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT attribute_id FROM measurement_attributes WHERE deleted_at IS NULL AND clinic_id = ",
        );
        query_builder.push_bind(clinic_id).push(" AND attribute_id IN (");
        let mut separated = query_builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        query_builder
            .build_query_scalar::<i64>()
            .fetch_all(&self.connection_pool)
            .await
    }
}

impl Create<MeasurementAttribute, (i64, CreateMeasurementAttributeDTO)> for MeasurementAttributeRepository {
    #[instrument(skip(self, data))]
    async fn create(&self, data: &(i64, CreateMeasurementAttributeDTO)) -> Result<MeasurementAttribute, Error> {
        let (clinic_id, data) = data;
        sqlx::query_as::<_, MeasurementAttribute>(
            r#"
            INSERT INTO measurement_attributes (clinic_id, name, unit, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(clinic_id)
        .bind(data.name.trim())
        .bind(&data.unit)
        .bind(Utc::now())
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl ReadInClinic<MeasurementAttribute> for MeasurementAttributeRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<MeasurementAttribute>, Error> {
        sqlx::query_as::<_, MeasurementAttribute>(
            "SELECT * FROM measurement_attributes WHERE clinic_id = ? AND attribute_id = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Delete<i64> for MeasurementAttributeRepository {
    #[instrument(skip(self))]
    async fn delete(&self, id: &i64) -> Result<(), Error> {
        sqlx::query("UPDATE measurement_attributes SET deleted_at = ? WHERE attribute_id = ? AND deleted_at IS NULL")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(())
    }
}
