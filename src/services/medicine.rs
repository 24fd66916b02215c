//! Inventory services - medicines and stock movements

use crate::core::{AppError, AppState, require_role};
use crate::dtos::{
    CreateMedicineDTO, MedicineDTO, MedicineQuery, Page, Paged, StockAdjustmentDTO, UpdateMedicineDTO,
};
use crate::entities::{Medicine, Staff, StaffRole};
use crate::repositories::{Create, Delete, ReadInClinic, Update};
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

async fn load_medicine(state: &AppState, clinic_id: i64, medicine_id: i64) -> Result<Medicine, AppError> {
    state
        .medicine
        .read_in_clinic(&clinic_id, &medicine_id)
        .await?
        .ok_or_else(|| AppError::not_found("Medicine not found").with_code("MEDICINE_NOT_FOUND"))
}

/// Names are unique per clinic, ignoring case
async fn check_name_available(
    state: &AppState,
    clinic_id: i64,
    name: &str,
    current: Option<i64>,
) -> Result<(), AppError> {
    match state.medicine.find_by_name(clinic_id, name).await? {
        Some(existing) if Some(existing.medicine_id) != current => {
            warn!("Medicine name '{}' already used by {}", name, existing.medicine_id);
            Err(AppError::conflict("A medicine with this name already exists")
                .with_code("DUPLICATE_MEDICINE"))
        }
        _ => Ok(()),
    }
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn create_medicine(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<CreateMedicineDTO>,
) -> Result<(StatusCode, Json<MedicineDTO>), AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;
    body.validate()?;
    check_name_available(&state, staff.clinic_id, &body.name, None).await?;

    let medicine = state.medicine.create(&(staff.clinic_id, body)).await?;

    info!("Medicine {} added to inventory", medicine.medicine_id);
    Ok((StatusCode::CREATED, Json(MedicineDTO::from(medicine))))
}

#[instrument(skip(state, staff, query), fields(clinic_id = %staff.clinic_id))]
pub async fn list_medicines(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Query(query): Query<MedicineQuery>,
) -> Result<Json<Paged<MedicineDTO>>, AppError> {
    let page = Page::new(query.page, query.page_size);
    let (medicines, total) = state.medicine.list(staff.clinic_id, &query, page).await?;

    debug!("Returning {} medicines", medicines.len());
    Ok(Json(Paged::new(medicines, page, total).map(MedicineDTO::from)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn get_medicine(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(medicine_id): Path<i64>,
) -> Result<Json<MedicineDTO>, AppError> {
    let medicine = load_medicine(&state, staff.clinic_id, medicine_id).await?;
    Ok(Json(MedicineDTO::from(medicine)))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn update_medicine(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(medicine_id): Path<i64>,
    Json(body): Json<UpdateMedicineDTO>,
) -> Result<Json<MedicineDTO>, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;
    let medicine = load_medicine(&state, staff.clinic_id, medicine_id).await?;
    body.validate()?;
    if let Some(name) = &body.name {
        check_name_available(&state, staff.clinic_id, name, Some(medicine.medicine_id)).await?;
    }

    let updated = state.medicine.update(&medicine.medicine_id, &body).await?;

    info!("Medicine {} updated", updated.medicine_id);
    Ok(Json(MedicineDTO::from(updated)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn delete_medicine(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(medicine_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;
    let medicine = load_medicine(&state, staff.clinic_id, medicine_id).await?;

    state.medicine.delete(&medicine.medicine_id).await?;

    info!("Medicine {} removed from inventory", medicine.medicine_id);
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(medicine_id): Path<i64>,
    Json(body): Json<StockAdjustmentDTO>,
) -> Result<Json<MedicineDTO>, AppError> {
    // 1. Clinicians and managers move stock
    // 2. The delta is applied atomically, refusing a negative result

    require_role(&staff, StaffRole::CLINICIANS)?;
    body.validate()?;
    let medicine = load_medicine(&state, staff.clinic_id, medicine_id).await?;

    let adjusted = state
        .medicine
        .adjust_stock(medicine.medicine_id, body.delta)
        .await?
        .ok_or_else(|| {
            warn!(
                "Stock of medicine {} is {}, cannot apply {}",
                medicine.medicine_id, medicine.stock_quantity, body.delta
            );
            AppError::conflict("Not enough stock")
                .with_code("INSUFFICIENT_STOCK")
                .with_details(format!("Available: {}", medicine.stock_quantity))
        })?;

    info!(
        "Stock of medicine {} adjusted by {} ({})",
        adjusted.medicine_id,
        body.delta,
        body.reason.as_deref().unwrap_or("no reason given")
    );
    Ok(Json(MedicineDTO::from(adjusted)))
}
