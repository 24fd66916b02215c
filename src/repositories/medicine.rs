//! MedicineRepository - inventory

use super::{Create, Delete, ReadInClinic, Update, like_prefix};
use crate::dtos::{CreateMedicineDTO, MedicineQuery, Page, UpdateMedicineDTO};
use crate::entities::Medicine;
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, instrument};

pub struct MedicineRepository {
    connection_pool: SqlitePool,
}

impl MedicineRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Case-insensitive name lookup among the clinic's live medicines
    #[instrument(skip(self))]
    pub async fn find_by_name(&self, clinic_id: i64, name: &str) -> Result<Option<Medicine>, Error> {
        sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE clinic_id = ? AND name = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(name.trim())
        .fetch_optional(&self.connection_pool)
        .await
    }

    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        clinic_id: i64,
        query: &MedicineQuery,
        page: Page,
    ) -> Result<(Vec<Medicine>, i64), Error> {
        let pattern = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_prefix);
        let low_stock = query.low_stock.unwrap_or(false);

        fn push_filters(
            qb: &mut QueryBuilder<'_, Sqlite>,
            clinic_id: i64,
            pattern: &Option<String>,
            low_stock: bool,
        ) {
            qb.push(" WHERE clinic_id = ")
                .push_bind(clinic_id)
                .push(" AND deleted_at IS NULL");
            if let Some(pattern) = pattern {
                qb.push(" AND name LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
            if low_stock {
                qb.push(" AND stock_quantity <= reorder_level");
            }
        }

        let mut count_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM medicines");
        push_filters(&mut count_builder, clinic_id, &pattern, low_stock);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM medicines");
        push_filters(&mut query_builder, clinic_id, &pattern, low_stock);
        query_builder
            .push(" ORDER BY name, medicine_id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let medicines = query_builder
            .build_query_as::<Medicine>()
            .fetch_all(&self.connection_pool)
            .await?;

        debug!("Found {} of {} medicines", medicines.len(), total);
        Ok((medicines, total))
    }

    /// Apply a stock delta atomically. `None` when the result would be negative.
    #[instrument(skip(self))]
    pub async fn adjust_stock(&self, medicine_id: i64, delta: i64) -> Result<Option<Medicine>, Error> {
        let medicine = sqlx::query_as::<_, Medicine>(
            r#"
            UPDATE medicines SET stock_quantity = stock_quantity + ?, updated_at = ?
            WHERE medicine_id = ? AND deleted_at IS NULL AND stock_quantity + ? >= 0
            RETURNING *
            "#,
        )
        .bind(delta)
        .bind(Utc::now())
        .bind(medicine_id)
        .bind(delta)
        .fetch_optional(&self.connection_pool)
        .await?;

        if let Some(m) = &medicine {
            info!("Stock of medicine {} is now {}", m.medicine_id, m.stock_quantity);
        }
        Ok(medicine)
    }
}

impl Create<Medicine, (i64, CreateMedicineDTO)> for MedicineRepository {
    #[instrument(skip(self, data))]
    async fn create(&self, data: &(i64, CreateMedicineDTO)) -> Result<Medicine, Error> {
        let (clinic_id, data) = data;
        let now = Utc::now();

        sqlx::query_as::<_, Medicine>(
            r#"
            INSERT INTO medicines (clinic_id, name, description, unit, unit_price_cents, stock_quantity, reorder_level, expiry_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(clinic_id)
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(data.unit.trim())
        .bind(data.unit_price_cents)
        .bind(data.stock_quantity)
        .bind(data.reorder_level)
        .bind(data.expiry_date)
        .bind(now)
        .bind(now)
        .fetch_one(&self.connection_pool)
        .await
    }
}

impl ReadInClinic<Medicine> for MedicineRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<Medicine>, Error> {
        sqlx::query_as::<_, Medicine>(
            "SELECT * FROM medicines WHERE clinic_id = ? AND medicine_id = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Update<Medicine, UpdateMedicineDTO, i64> for MedicineRepository {
    #[instrument(skip(self, data))]
    async fn update(&self, id: &i64, data: &UpdateMedicineDTO) -> Result<Medicine, Error> {
        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE medicines SET updated_at = ");
        query_builder.push_bind(Utc::now());

        if let Some(name) = &data.name {
            query_builder.push(", name = ").push_bind(name.trim().to_string());
        }
        if let Some(description) = &data.description {
            query_builder.push(", description = ").push_bind(description);
        }
        if let Some(unit) = &data.unit {
            query_builder.push(", unit = ").push_bind(unit.trim().to_string());
        }
        if let Some(unit_price_cents) = data.unit_price_cents {
            query_builder.push(", unit_price_cents = ").push_bind(unit_price_cents);
        }
        if let Some(reorder_level) = data.reorder_level {
            query_builder.push(", reorder_level = ").push_bind(reorder_level);
        }
        if let Some(expiry_date) = data.expiry_date {
            query_builder.push(", expiry_date = ").push_bind(expiry_date);
        }

        query_builder
            .push(" WHERE medicine_id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL RETURNING *");

        query_builder
            .build_query_as::<Medicine>()
            .fetch_one(&self.connection_pool)
            .await
    }
}

impl Delete<i64> for MedicineRepository {
    #[instrument(skip(self))]
    async fn delete(&self, id: &i64) -> Result<(), Error> {
        let now = Utc::now();
        sqlx::query("UPDATE medicines SET deleted_at = ?, updated_at = ? WHERE medicine_id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(())
    }
}
