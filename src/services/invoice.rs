//! Billing services - invoices and their lifecycle
//!
//! DRAFT -> ISSUED -> PAID, DRAFT | ISSUED -> CANCELLED.
//! Issuing takes medicine lines out of stock, cancelling an issued invoice
//! puts them back.

use super::appointment::load_appointment;
use super::patient::load_patient;
use crate::core::{AppError, AppState, require_role};
use crate::dtos::invoice::invoice_total_cents;
use crate::dtos::{
    CreateInvoiceDTO, InvoiceDTO, InvoiceItemInputDTO, InvoiceQuery, NewInvoiceItemDTO, Page, Paged,
    ReplaceInvoiceItemsDTO,
};
use crate::entities::{Invoice, InvoiceStatus, Staff, StaffRole};
use crate::repositories::{Delete, IssueOutcome, ReadInClinic};
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

async fn load_invoice(state: &AppState, clinic_id: i64, invoice_id: i64) -> Result<Invoice, AppError> {
    state
        .invoice
        .read_in_clinic(&clinic_id, &invoice_id)
        .await?
        .ok_or_else(|| AppError::not_found("Invoice not found").with_code("INVOICE_NOT_FOUND"))
}

fn check_transition(invoice: &Invoice, next: InvoiceStatus) -> Result<(), AppError> {
    if !invoice.status.can_transition_to(next) {
        warn!("Invoice {} cannot go {:?} -> {:?}", invoice.invoice_id, invoice.status, next);
        return Err(AppError::conflict("Status transition not allowed")
            .with_code("INVALID_STATUS_TRANSITION")
            .with_details(format!("{:?} -> {:?}", invoice.status, next)));
    }
    Ok(())
}

/// Total of the resolved lines, refusing amounts that do not fit in an i64
fn checked_total(items: &[NewInvoiceItemDTO]) -> Result<i64, AppError> {
    invoice_total_cents(items).ok_or_else(|| {
        warn!("Invoice total overflows");
        AppError::bad_request("Invoice total is too large").with_code("INVALID_INVOICE_ITEM")
    })
}

fn not_editable() -> AppError {
    AppError::conflict("Only draft invoices can be modified").with_code("INVOICE_NOT_EDITABLE")
}

/// Turn client lines into insertable ones. Medicine lines must reference a
/// medicine of the clinic and default their description and price to it;
/// free lines must carry both.
async fn resolve_items(
    state: &AppState,
    clinic_id: i64,
    items: Vec<InvoiceItemInputDTO>,
) -> Result<Vec<NewInvoiceItemDTO>, AppError> {
    let mut resolved = Vec::with_capacity(items.len());

    for item in items {
        let line = match item.medicine_id {
            Some(medicine_id) => {
                let medicine = state
                    .medicine
                    .read_in_clinic(&clinic_id, &medicine_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::not_found("Medicine not found")
                            .with_code("MEDICINE_NOT_FOUND")
                            .with_details(format!("Medicine: {}", medicine_id))
                    })?;
                NewInvoiceItemDTO {
                    description: item.description.unwrap_or(medicine.name),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents.unwrap_or(medicine.unit_price_cents),
                    medicine_id: Some(medicine.medicine_id),
                }
            }
            None => match (item.description, item.unit_price_cents) {
                (Some(description), Some(unit_price_cents)) => NewInvoiceItemDTO {
                    description,
                    quantity: item.quantity,
                    unit_price_cents,
                    medicine_id: None,
                },
                _ => {
                    return Err(AppError::bad_request(
                        "Items without a medicine need a description and a price",
                    )
                    .with_code("INVALID_INVOICE_ITEM"));
                }
            },
        };
        resolved.push(line);
    }

    Ok(resolved)
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn create_invoice(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<CreateInvoiceDTO>,
) -> Result<(StatusCode, Json<InvoiceDTO>), AppError> {
    // 1. Role check and validation (at least one item)
    // 2. Patient, and the optional appointment, must belong to the clinic
    // 3. The appointment must be the patient's
    // 4. Resolve medicine lines and check the total fits
    // 5. Store as DRAFT with the next number

    require_role(&staff, StaffRole::BILLING)?;
    body.validate()?;

    let patient = load_patient(&state, staff.clinic_id, body.patient_id).await?;
    if let Some(appointment_id) = body.appointment_id {
        let appointment = load_appointment(&state, staff.clinic_id, appointment_id).await?;
        if appointment.patient_id != patient.patient_id {
            warn!("Appointment {} belongs to another patient", appointment_id);
            return Err(AppError::bad_request("The appointment belongs to another patient")
                .with_code("APPOINTMENT_PATIENT_MISMATCH"));
        }
    }

    let items = resolve_items(&state, staff.clinic_id, body.items).await?;
    let total = checked_total(&items)?;
    let created = state
        .invoice
        .create(staff.clinic_id, patient.patient_id, body.appointment_id, &items, total)
        .await?;

    info!("Invoice {} created for patient {}", created.0.invoice_number, patient.patient_id);
    Ok((StatusCode::CREATED, Json(InvoiceDTO::from(created))))
}

#[instrument(skip(state, staff, query), fields(clinic_id = %staff.clinic_id))]
pub async fn list_invoices(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Paged<InvoiceDTO>>, AppError> {
    let page = Page::new(query.page, query.page_size);
    let (invoices, total) = state.invoice.list(staff.clinic_id, &query, page).await?;

    debug!("Returning {} invoices", invoices.len());
    Ok(Json(Paged::new(invoices, page, total).map(InvoiceDTO::from)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<InvoiceDTO>, AppError> {
    let invoice = load_invoice(&state, staff.clinic_id, invoice_id).await?;
    let items = state.invoice.items(invoice.invoice_id).await?;
    Ok(Json(InvoiceDTO::from((invoice, items))))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn replace_invoice_items(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invoice_id): Path<i64>,
    Json(body): Json<ReplaceInvoiceItemsDTO>,
) -> Result<Json<InvoiceDTO>, AppError> {
    require_role(&staff, StaffRole::BILLING)?;
    let invoice = load_invoice(&state, staff.clinic_id, invoice_id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(not_editable());
    }
    body.validate()?;

    let items = resolve_items(&state, staff.clinic_id, body.items).await?;
    let total = checked_total(&items)?;
    let updated = state
        .invoice
        .replace_items(invoice.invoice_id, &items, total)
        .await
        .map_err(|e| match e {
            // issued in the meantime
            sqlx::Error::RowNotFound => not_editable(),
            other => AppError::from(other),
        })?;

    info!("Invoice {} now has {} items", invoice.invoice_number, updated.1.len());
    Ok(Json(InvoiceDTO::from(updated)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn issue_invoice(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<InvoiceDTO>, AppError> {
    require_role(&staff, StaffRole::BILLING)?;
    let invoice = load_invoice(&state, staff.clinic_id, invoice_id).await?;
    check_transition(&invoice, InvoiceStatus::Issued)?;

    match state.invoice.issue(invoice.invoice_id).await? {
        IssueOutcome::Issued(issued) => {
            info!("Invoice {} issued", issued.invoice_number);
            let items = state.invoice.items(issued.invoice_id).await?;
            Ok(Json(InvoiceDTO::from((issued, items))))
        }
        IssueOutcome::MedicineRemoved { medicine_id } => {
            warn!("Invoice {} not issued, medicine {} was removed", invoice.invoice_number, medicine_id);
            Err(AppError::not_found("Medicine not found")
                .with_code("MEDICINE_NOT_FOUND")
                .with_details(format!("Medicine: {}", medicine_id)))
        }
        IssueOutcome::InsufficientStock { medicine_id } => {
            warn!("Invoice {} not issued, medicine {} out of stock", invoice.invoice_number, medicine_id);
            Err(AppError::conflict("Insufficient stock to issue the invoice")
                .with_code("INSUFFICIENT_STOCK")
                .with_details(format!("Medicine: {}", medicine_id)))
        }
    }
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn pay_invoice(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<InvoiceDTO>, AppError> {
    require_role(&staff, StaffRole::BILLING)?;
    let invoice = load_invoice(&state, staff.clinic_id, invoice_id).await?;
    check_transition(&invoice, InvoiceStatus::Paid)?;

    let paid = state.invoice.mark_paid(invoice.invoice_id).await?;

    info!("Invoice {} paid", paid.invoice_number);
    Ok(Json(InvoiceDTO::from(paid)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn cancel_invoice(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invoice_id): Path<i64>,
) -> Result<Json<InvoiceDTO>, AppError> {
    require_role(&staff, StaffRole::BILLING)?;
    let invoice = load_invoice(&state, staff.clinic_id, invoice_id).await?;
    check_transition(&invoice, InvoiceStatus::Cancelled)?;

    let cancelled = state.invoice.cancel(invoice.invoice_id).await?;

    info!("Invoice {} cancelled", cancelled.invoice_number);
    Ok(Json(InvoiceDTO::from(cancelled)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn delete_invoice(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invoice_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&staff, StaffRole::BILLING)?;
    let invoice = load_invoice(&state, staff.clinic_id, invoice_id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(not_editable());
    }

    state.invoice.delete(&invoice.invoice_id).await?;

    info!("Invoice {} deleted", invoice.invoice_number);
    Ok(StatusCode::NO_CONTENT)
}
