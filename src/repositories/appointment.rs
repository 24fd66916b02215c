//! AppointmentRepository

use super::{Create, Delete, ReadInClinic, Update};
use crate::dtos::{AppointmentChangesDTO, AppointmentQuery, CreateAppointmentDTO, Page};
use crate::entities::appointment::MAX_DURATION_MINUTES;
use crate::entities::{Appointment, AppointmentStatus};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, instrument};

pub struct AppointmentRepository {
    connection_pool: SqlitePool,
}

impl AppointmentRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// SCHEDULED appointments of `staff_id` overlapping `[start, end)`,
    /// optionally ignoring the appointment being edited
    #[instrument(skip(self))]
    pub async fn find_conflicts(
        &self,
        staff_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<i64>,
    ) -> Result<Vec<Appointment>, Error> {
        // no appointment lasts longer than MAX_DURATION_MINUTES, so anything
        // starting before this bound has ended before `start`
        let earliest_start = start - Duration::minutes(MAX_DURATION_MINUTES);

        let candidates = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE staff_id = ? AND status = 'SCHEDULED' AND deleted_at IS NULL
              AND scheduled_at < ? AND scheduled_at > ?
              AND appointment_id != ?
            "#,
        )
        .bind(staff_id)
        .bind(end)
        .bind(earliest_start)
        .bind(exclude.unwrap_or(-1))
        .fetch_all(&self.connection_pool)
        .await?;

        Ok(candidates
            .into_iter()
            .filter(|a| a.overlaps(start, end))
            .collect())
    }

    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        clinic_id: i64,
        query: &AppointmentQuery,
        page: Page,
    ) -> Result<(Vec<Appointment>, i64), Error> {
        fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, clinic_id: i64, query: &AppointmentQuery) {
            qb.push(" WHERE clinic_id = ")
                .push_bind(clinic_id)
                .push(" AND deleted_at IS NULL");
            if let Some(from) = query.from {
                qb.push(" AND scheduled_at >= ").push_bind(from);
            }
            if let Some(to) = query.to {
                qb.push(" AND scheduled_at < ").push_bind(to);
            }
            if let Some(staff_id) = query.staff_id {
                qb.push(" AND staff_id = ").push_bind(staff_id);
            }
            if let Some(patient_id) = query.patient_id {
                qb.push(" AND patient_id = ").push_bind(patient_id);
            }
            if let Some(status) = query.status {
                qb.push(" AND status = ").push_bind(status);
            }
        }

        let mut count_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM appointments");
        push_filters(&mut count_builder, clinic_id, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM appointments");
        push_filters(&mut query_builder, clinic_id, query);
        query_builder
            .push(" ORDER BY scheduled_at, appointment_id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let appointments = query_builder
            .build_query_as::<Appointment>()
            .fetch_all(&self.connection_pool)
            .await?;

        debug!("Found {} of {} appointments", appointments.len(), total);
        Ok((appointments, total))
    }
}

impl Create<Appointment, (i64, CreateAppointmentDTO)> for AppointmentRepository {
    #[instrument(skip(self, data))]
    async fn create(&self, data: &(i64, CreateAppointmentDTO)) -> Result<Appointment, Error> {
        let (clinic_id, data) = data;
        let now = Utc::now();

        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (clinic_id, patient_id, staff_id, scheduled_at, duration_minutes, status, reason, notes, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(clinic_id)
        .bind(data.patient_id)
        .bind(data.staff_id)
        .bind(data.scheduled_at)
        .bind(data.duration_minutes)
        .bind(AppointmentStatus::Scheduled)
        .bind(&data.reason)
        .bind(&data.notes)
        .bind(now)
        .bind(now)
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl ReadInClinic<Appointment> for AppointmentRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<Appointment>, Error> {
        sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE clinic_id = ? AND appointment_id = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Update<Appointment, AppointmentChangesDTO, i64> for AppointmentRepository {
    #[instrument(skip(self, data))]
    async fn update(&self, id: &i64, data: &AppointmentChangesDTO) -> Result<Appointment, Error> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE appointments SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(staff_id) = data.staff_id {
            query_builder.push(", staff_id = ").push_bind(staff_id);
        }
        if let Some(scheduled_at) = data.scheduled_at {
            query_builder.push(", scheduled_at = ").push_bind(scheduled_at);
        }
        if let Some(duration_minutes) = data.duration_minutes {
            query_builder.push(", duration_minutes = ").push_bind(duration_minutes);
        }
        if let Some(reason) = &data.reason {
            query_builder.push(", reason = ").push_bind(reason);
        }
        if let Some(notes) = &data.notes {
            query_builder.push(", notes = ").push_bind(notes);
        }
        if let Some(status) = data.status {
            query_builder.push(", status = ").push_bind(status);
        }

        query_builder
            .push(" WHERE appointment_id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING *");

        query_builder
            .build_query_as::<Appointment>()
            .fetch_one(&self.connection_pool)
            .await
    }
}

impl Delete<i64> for AppointmentRepository {
    #[instrument(skip(self))]
    async fn delete(&self, id: &i64) -> Result<(), Error> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE appointments SET deleted_at = ?, updated_at = ? WHERE appointment_id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.connection_pool)
        .await?;
        Ok(())
    }
}
