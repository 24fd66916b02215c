//! Clinic services - the caller's own clinic

use crate::core::{AppError, AppState, require_role};
use crate::dtos::{ClinicDTO, UpdateClinicDTO};
use crate::entities::{Staff, StaffRole};
use crate::repositories::{Read, Update};
use axum::{
    Extension,
    extract::{Json, State},
};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn get_my_clinic(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
) -> Result<Json<ClinicDTO>, AppError> {
    let clinic = state
        .clinic
        .read(&staff.clinic_id)
        .await?
        .ok_or_else(|| AppError::not_found("Clinic not found").with_code("CLINIC_NOT_FOUND"))?;

    Ok(Json(ClinicDTO::from(clinic)))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn update_my_clinic(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<UpdateClinicDTO>,
) -> Result<Json<ClinicDTO>, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;
    body.validate()?;

    let clinic = state.clinic.update(&staff.clinic_id, &body).await?;

    info!("Clinic updated");
    Ok(Json(ClinicDTO::from(clinic)))
}
