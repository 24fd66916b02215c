//! MedicalRecordRepository - records and their measurements

use super::{Delete, ReadInClinic};
use crate::dtos::{MeasurementInputDTO, NewMedicalRecordDTO, UpdateMedicalRecordDTO};
use crate::entities::{MedicalRecord, RecordMeasurement};
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, instrument};

pub struct MedicalRecordRepository {
    connection_pool: SqlitePool,
}

async fn insert_measurements(
    conn: &mut SqliteConnection,
    record_id: i64,
    measurements: &[MeasurementInputDTO],
) -> Result<(), Error> {
    for measurement in measurements {
        sqlx::query("INSERT INTO record_measurements (record_id, attribute_id, value) VALUES (?, ?, ?)")
            .bind(record_id)
            .bind(measurement.attribute_id)
            .bind(measurement.value.trim())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

impl MedicalRecordRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    #[instrument(skip(self, data), fields(patient_id = data.patient_id))]
    pub async fn create(&self, data: &NewMedicalRecordDTO) -> Result<MedicalRecord, Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        let record = sqlx::query_as::<_, MedicalRecord>(
            r#"
            INSERT INTO medical_records (clinic_id, patient_id, staff_id, appointment_id, diagnosis, treatment, notes, recorded_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(data.clinic_id)
        .bind(data.patient_id)
        .bind(data.staff_id)
        .bind(data.appointment_id)
        .bind(data.diagnosis.trim())
        .bind(&data.treatment)
        .bind(&data.notes)
        .bind(data.recorded_at)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        insert_measurements(&mut *tx, record.record_id, &data.measurements).await?;

        tx.commit().await?;
        info!("Medical record {} created", record.record_id);
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn measurements(&self, record_id: i64) -> Result<Vec<RecordMeasurement>, Error> {
        sqlx::query_as::<_, RecordMeasurement>(
            r#"
            SELECT m.record_id, m.attribute_id, a.name, a.unit, m.value
            FROM record_measurements m
            JOIN measurement_attributes a ON a.attribute_id = m.attribute_id
            WHERE m.record_id = ?
            ORDER BY a.name
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.connection_pool)
        .await
    }

    /// Records of a patient, newest first
    #[instrument(skip(self))]
    pub async fn list_for_patient(&self, clinic_id: i64, patient_id: i64) -> Result<Vec<MedicalRecord>, Error> {
        sqlx::query_as::<_, MedicalRecord>(
            r#"
            SELECT * FROM medical_records
            WHERE clinic_id = ? AND patient_id = ? AND deleted_at IS NULL
            ORDER BY recorded_at DESC, record_id DESC
            "#,
        )
        .bind(clinic_id)
        .bind(patient_id)
        .fetch_all(&self.connection_pool)
        .await
    }

    /// Partial update; measurements, when given, replace the existing ones
    #[instrument(skip(self, data))]
    pub async fn update(&self, record_id: i64, data: &UpdateMedicalRecordDTO) -> Result<MedicalRecord, Error> {
        let mut tx = self.connection_pool.begin().await?;

        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE medical_records SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(diagnosis) = &data.diagnosis {
            query_builder.push(", diagnosis = ").push_bind(diagnosis.trim().to_string());
        }
        if let Some(treatment) = &data.treatment {
            query_builder.push(", treatment = ").push_bind(treatment);
        }
        if let Some(notes) = &data.notes {
            query_builder.push(", notes = ").push_bind(notes);
        }
        query_builder
            .push(" WHERE record_id = ")
            .push_bind(record_id)
            .push(" AND deleted_at IS NULL RETURNING *");

        let record = query_builder
            .build_query_as::<MedicalRecord>()
            .fetch_one(&mut *tx)
            .await?;

        if let Some(measurements) = &data.measurements {
            sqlx::query("DELETE FROM record_measurements WHERE record_id = ?")
                .bind(record_id)
                .execute(&mut *tx)
                .await?;
            insert_measurements(&mut *tx, record_id, measurements).await?;
            debug!("Replaced measurements of record {}", record_id);
        }

        tx.commit().await?;
        Ok(record)
    }
}

impl ReadInClinic<MedicalRecord> for MedicalRecordRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<MedicalRecord>, Error> {
        sqlx::query_as::<_, MedicalRecord>(
            "SELECT * FROM medical_records WHERE clinic_id = ? AND record_id = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Delete<i64> for MedicalRecordRepository {
    #[instrument(skip(self))]
    async fn delete(&self, id: &i64) -> Result<(), Error> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE medical_records SET deleted_at = ?, updated_at = ? WHERE record_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.connection_pool)
        .await?;
        Ok(())
    }
}
