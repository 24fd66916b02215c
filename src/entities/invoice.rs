//! Invoice entity - billing document with its line items

use super::enums::InvoiceStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Invoice {
    pub invoice_id: i64,
    pub clinic_id: i64,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct InvoiceItem {
    pub item_id: i64,
    pub invoice_id: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub medicine_id: Option<i64>,
}

impl InvoiceItem {
    /// Saturates instead of wrapping
    pub fn line_total_cents(&self) -> i64 {
        self.quantity.saturating_mul(self.unit_price_cents)
    }
}

impl InvoiceStatus {
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        matches!(
            (self, next),
            (InvoiceStatus::Draft, InvoiceStatus::Issued)
                | (InvoiceStatus::Issued, InvoiceStatus::Paid)
                | (InvoiceStatus::Draft, InvoiceStatus::Cancelled)
                | (InvoiceStatus::Issued, InvoiceStatus::Cancelled)
        )
    }
}

/// Per-clinic sequential number, e.g. `INV-000042`
pub fn format_invoice_number(sequence: i64) -> String {
    format!("INV-{:06}", sequence)
}
