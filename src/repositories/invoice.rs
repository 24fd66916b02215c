//! InvoiceRepository - billing, including the stock movements of issue / cancel

use super::{Delete, ReadInClinic};
use crate::dtos::{InvoiceQuery, NewInvoiceItemDTO, Page};
use crate::entities::invoice::format_invoice_number;
use crate::entities::{Invoice, InvoiceItem, InvoiceStatus};
use chrono::Utc;
use sqlx::{Error, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Result of issuing an invoice
#[derive(Debug)]
pub enum IssueOutcome {
    Issued(Invoice),
    /// nothing was written, the medicine does not have enough stock
    InsufficientStock { medicine_id: i64 },
    /// nothing was written, the medicine was deleted after the line was added
    MedicineRemoved { medicine_id: i64 },
}

pub struct InvoiceRepository {
    connection_pool: SqlitePool,
}

/// Quantity per medicine over all the lines of an invoice
fn medicine_quantities(items: &[InvoiceItem]) -> BTreeMap<i64, i64> {
    let mut quantities = BTreeMap::new();
    for item in items {
        if let Some(medicine_id) = item.medicine_id {
            *quantities.entry(medicine_id).or_insert(0) += item.quantity;
        }
    }
    quantities
}

async fn insert_items(
    conn: &mut SqliteConnection,
    invoice_id: i64,
    items: &[NewInvoiceItemDTO],
) -> Result<Vec<InvoiceItem>, Error> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let row = sqlx::query_as::<_, InvoiceItem>(
            r#"
            INSERT INTO invoice_items (invoice_id, description, quantity, unit_price_cents, medicine_id)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(invoice_id)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.medicine_id)
        .fetch_one(&mut *conn)
        .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

impl InvoiceRepository {
    pub fn new(connection_pool: SqlitePool) -> Self {
        Self { connection_pool }
    }

    /// Create a DRAFT invoice with its lines and the next clinic number.
    /// `total` is the overflow-checked sum of the line totals.
    #[instrument(skip(self, items))]
    pub async fn create(
        &self,
        clinic_id: i64,
        patient_id: i64,
        appointment_id: Option<i64>,
        items: &[NewInvoiceItemDTO],
        total: i64,
    ) -> Result<(Invoice, Vec<InvoiceItem>), Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        // invoices are never hard deleted, so the row count is the last sequence
        let issued_so_far: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE clinic_id = ?")
            .bind(clinic_id)
            .fetch_one(&mut *tx)
            .await?;
        let invoice_number = format_invoice_number(issued_so_far + 1);

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (clinic_id, patient_id, appointment_id, invoice_number, status, total_cents, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(clinic_id)
        .bind(patient_id)
        .bind(appointment_id)
        .bind(&invoice_number)
        .bind(InvoiceStatus::Draft)
        .bind(total)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        let lines = insert_items(&mut *tx, invoice.invoice_id, items).await?;

        tx.commit().await?;
        info!("Invoice {} created", invoice.invoice_number);
        Ok((invoice, lines))
    }

    #[instrument(skip(self))]
    pub async fn items(&self, invoice_id: i64) -> Result<Vec<InvoiceItem>, Error> {
        sqlx::query_as::<_, InvoiceItem>("SELECT * FROM invoice_items WHERE invoice_id = ? ORDER BY item_id")
            .bind(invoice_id)
            .fetch_all(&self.connection_pool)
            .await
    }

    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        clinic_id: i64,
        query: &InvoiceQuery,
        page: Page,
    ) -> Result<(Vec<Invoice>, i64), Error> {
        fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, clinic_id: i64, query: &InvoiceQuery) {
            qb.push(" WHERE clinic_id = ")
                .push_bind(clinic_id)
                .push(" AND deleted_at IS NULL");
            if let Some(status) = query.status {
                qb.push(" AND status = ").push_bind(status);
            }
            if let Some(patient_id) = query.patient_id {
                qb.push(" AND patient_id = ").push_bind(patient_id);
            }
        }

        let mut count_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM invoices");
        push_filters(&mut count_builder, clinic_id, query);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.connection_pool)
            .await?;

        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM invoices");
        push_filters(&mut query_builder, clinic_id, query);
        query_builder
            .push(" ORDER BY invoice_id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let invoices = query_builder
            .build_query_as::<Invoice>()
            .fetch_all(&self.connection_pool)
            .await?;

        Ok((invoices, total))
    }

    /// Replace the lines of a DRAFT invoice and recompute its total
    #[instrument(skip(self, items))]
    pub async fn replace_items(
        &self,
        invoice_id: i64,
        items: &[NewInvoiceItemDTO],
        total: i64,
    ) -> Result<(Invoice, Vec<InvoiceItem>), Error> {
        let mut tx = self.connection_pool.begin().await?;

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET total_cents = ?, updated_at = ?
            WHERE invoice_id = ? AND status = 'DRAFT' AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(total)
        .bind(Utc::now())
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await?;
        let lines = insert_items(&mut *tx, invoice_id, items).await?;

        tx.commit().await?;
        debug!("Invoice {} now has {} items", invoice_id, lines.len());
        Ok((invoice, lines))
    }

    /// DRAFT -> ISSUED, taking the medicine lines out of stock
    #[instrument(skip(self))]
    pub async fn issue(&self, invoice_id: i64) -> Result<IssueOutcome, Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        let items = sqlx::query_as::<_, InvoiceItem>("SELECT * FROM invoice_items WHERE invoice_id = ?")
            .bind(invoice_id)
            .fetch_all(&mut *tx)
            .await?;

        for (medicine_id, quantity) in medicine_quantities(&items) {
            let stock: Option<i64> = sqlx::query_scalar(
                "SELECT stock_quantity FROM medicines WHERE medicine_id = ? AND deleted_at IS NULL",
            )
            .bind(medicine_id)
            .fetch_optional(&mut *tx)
            .await?;
            if stock.is_none() {
                warn!("Medicine {} of invoice {} was removed", medicine_id, invoice_id);
                return Ok(IssueOutcome::MedicineRemoved { medicine_id });
            }

            let updated = sqlx::query(
                r#"
                UPDATE medicines SET stock_quantity = stock_quantity - ?, updated_at = ?
                WHERE medicine_id = ? AND deleted_at IS NULL AND stock_quantity >= ?
                "#,
            )
            .bind(quantity)
            .bind(now)
            .bind(medicine_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                warn!("Not enough stock of medicine {} to issue invoice {}", medicine_id, invoice_id);
                // dropping the transaction rolls back the previous decrements
                return Ok(IssueOutcome::InsufficientStock { medicine_id });
            }
        }

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = 'ISSUED', issued_at = ?, updated_at = ?
            WHERE invoice_id = ? AND status = 'DRAFT' AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Invoice {} issued", invoice.invoice_number);
        Ok(IssueOutcome::Issued(invoice))
    }

    /// ISSUED -> PAID
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, invoice_id: i64) -> Result<Invoice, Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = 'PAID', paid_at = ?, updated_at = ?
            WHERE invoice_id = ? AND status = 'ISSUED' AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(invoice_id)
        .fetch_one(&self.connection_pool)
        .await
    }

    /// DRAFT | ISSUED -> CANCELLED; an issued invoice gives its medicines back
    #[instrument(skip(self))]
    pub async fn cancel(&self, invoice_id: i64) -> Result<Invoice, Error> {
        let now = Utc::now();
        let mut tx = self.connection_pool.begin().await?;

        let previous: InvoiceStatus = sqlx::query_scalar(
            "SELECT status FROM invoices WHERE invoice_id = ? AND deleted_at IS NULL",
        )
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await?;

        if previous == InvoiceStatus::Issued {
            let items = sqlx::query_as::<_, InvoiceItem>("SELECT * FROM invoice_items WHERE invoice_id = ?")
                .bind(invoice_id)
                .fetch_all(&mut *tx)
                .await?;

            for (medicine_id, quantity) in medicine_quantities(&items) {
                sqlx::query(
                    "UPDATE medicines SET stock_quantity = stock_quantity + ?, updated_at = ? WHERE medicine_id = ?",
                )
                .bind(quantity)
                .bind(now)
                .bind(medicine_id)
                .execute(&mut *tx)
                .await?;
            }
            debug!("Restocked the medicines of invoice {}", invoice_id);
        }

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices SET status = 'CANCELLED', updated_at = ?
            WHERE invoice_id = ? AND status IN ('DRAFT', 'ISSUED')
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Invoice {} cancelled", invoice.invoice_number);
        Ok(invoice)
    }
}

impl ReadInClinic<Invoice> for InvoiceRepository {
    #[instrument(skip(self))]
    async fn read_in_clinic(&self, clinic_id: &i64, id: &i64) -> Result<Option<Invoice>, Error> {
        sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE clinic_id = ? AND invoice_id = ? AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(id)
        .fetch_optional(&self.connection_pool)
        .await
    }
}

impl Delete<i64> for InvoiceRepository {
    #[instrument(skip(self))]
    async fn delete(&self, id: &i64) -> Result<(), Error> {
        let now = Utc::now();
        sqlx::query("UPDATE invoices SET deleted_at = ?, updated_at = ? WHERE invoice_id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.connection_pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(medicine_id: Option<i64>, quantity: i64) -> InvoiceItem {
        InvoiceItem {
            item_id: 0,
            invoice_id: 1,
            description: "line".to_string(),
            quantity,
            unit_price_cents: 100,
            medicine_id,
        }
    }

    #[test]
    fn quantities_are_summed_per_medicine() {
        let items = vec![item(Some(1), 2), item(None, 5), item(Some(1), 3), item(Some(2), 1)];
        let quantities = medicine_quantities(&items);
        assert_eq!(quantities.get(&1), Some(&5));
        assert_eq!(quantities.get(&2), Some(&1));
        assert_eq!(quantities.len(), 2);
    }
}
