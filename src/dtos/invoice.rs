//! Invoice DTOs - billing

use super::validation::validate_not_blank;
use crate::entities::{Invoice, InvoiceItem, InvoiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Largest accepted unit price, 100 million currency units
pub const MAX_UNIT_PRICE_CENTS: i64 = 10_000_000_000;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvoiceItemDTO {
    pub id: i64,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub medicine_id: Option<i64>,
}

impl From<InvoiceItem> for InvoiceItemDTO {
    fn from(value: InvoiceItem) -> Self {
        Self {
            line_total_cents: value.line_total_cents(),
            id: value.item_id,
            description: value.description,
            quantity: value.quantity,
            unit_price_cents: value.unit_price_cents,
            medicine_id: value.medicine_id,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvoiceDTO {
    pub id: i64,
    pub invoice_number: String,
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    pub status: InvoiceStatus,
    pub total_cents: i64,
    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<InvoiceItemDTO>>,
}

impl From<Invoice> for InvoiceDTO {
    fn from(value: Invoice) -> Self {
        Self {
            id: value.invoice_id,
            invoice_number: value.invoice_number,
            patient_id: value.patient_id,
            appointment_id: value.appointment_id,
            status: value.status,
            total_cents: value.total_cents,
            issued_at: value.issued_at,
            paid_at: value.paid_at,
            created_at: value.created_at,
            items: None, // listings do not load the lines
        }
    }
}

impl From<(Invoice, Vec<InvoiceItem>)> for InvoiceDTO {
    fn from(value: (Invoice, Vec<InvoiceItem>)) -> Self {
        let (invoice, items) = value;
        let mut dto = InvoiceDTO::from(invoice);
        dto.items = Some(items.into_iter().map(InvoiceItemDTO::from).collect());
        dto
    }
}

/// Line of an invoice as sent by the client. A medicine line may omit the
/// description and the price, both default to the medicine's.
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct InvoiceItemInputDTO {
    #[validate(length(min = 1, max = 255), custom(function = "validate_not_blank"))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 100000, message = "Quantity must be at least 1"))]
    pub quantity: i64,
    #[validate(range(min = 0, max = MAX_UNIT_PRICE_CENTS, message = "Price must be between 0 and 10000000000 cents"))]
    pub unit_price_cents: Option<i64>,
    pub medicine_id: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct CreateInvoiceDTO {
    pub patient_id: i64,
    pub appointment_id: Option<i64>,
    #[validate(length(min = 1, max = 200, message = "An invoice needs between 1 and 200 items"), nested)]
    pub items: Vec<InvoiceItemInputDTO>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct ReplaceInvoiceItemsDTO {
    #[validate(length(min = 1, max = 200, message = "An invoice needs between 1 and 200 items"), nested)]
    pub items: Vec<InvoiceItemInputDTO>,
}

/// Fully resolved line, ready to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoiceItemDTO {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub medicine_id: Option<i64>,
}

impl NewInvoiceItemDTO {
    /// None when the product does not fit in an i64
    pub fn line_total_cents(&self) -> Option<i64> {
        self.quantity.checked_mul(self.unit_price_cents)
    }
}

/// Sum of the line totals, None on overflow
pub fn invoice_total_cents(items: &[NewInvoiceItemDTO]) -> Option<i64> {
    items
        .iter()
        .try_fold(0i64, |total, item| total.checked_add(item.line_total_cents()?))
}

/// Query parameters of `GET /invoices`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
    pub patient_id: Option<i64>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i64, unit_price_cents: i64) -> NewInvoiceItemDTO {
        NewInvoiceItemDTO {
            description: "line".to_string(),
            quantity,
            unit_price_cents,
            medicine_id: None,
        }
    }

    #[test]
    fn total_sums_the_lines() {
        assert_eq!(invoice_total_cents(&[line(2, 500), line(1, 250)]), Some(1250));
        assert_eq!(invoice_total_cents(&[]), Some(0));
    }

    #[test]
    fn total_overflow_is_reported() {
        assert_eq!(line(2, i64::MAX / 2 + 1).line_total_cents(), None);
        assert_eq!(invoice_total_cents(&[line(1, i64::MAX), line(1, 1)]), None);
    }

    #[test]
    fn price_above_the_cap_is_rejected() {
        let item = InvoiceItemInputDTO {
            description: Some("Visit".to_string()),
            quantity: 2,
            unit_price_cents: Some(4_611_686_018_427_387_904),
            medicine_id: None,
        };
        assert!(item.validate().is_err());
    }
}
