//! Staff services - members of the caller's clinic

use super::onboarding::check_specialization;
use crate::core::{AppError, AppState, require_role};
use crate::dtos::{Page, Paged, StaffDTO, StaffQuery, UpdateStaffDTO};
use crate::entities::{Staff, StaffRole};
use crate::repositories::{ReadInClinic, Update};
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

fn staff_not_found() -> AppError {
    AppError::not_found("Staff member not found").with_code("STAFF_NOT_FOUND")
}

#[instrument(skip(state, staff, query), fields(clinic_id = %staff.clinic_id))]
pub async fn list_staff(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Query(query): Query<StaffQuery>,
) -> Result<Json<Paged<StaffDTO>>, AppError> {
    let page = Page::new(query.page, query.page_size);
    let (members, total) = state.staff.list(staff.clinic_id, &query, page).await?;

    debug!("Returning {} staff members", members.len());
    Ok(Json(Paged::new(members, page, total).map(StaffDTO::from)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn get_staff(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(staff_id): Path<i64>,
) -> Result<Json<StaffDTO>, AppError> {
    let member = state
        .staff
        .read_with_user(staff.clinic_id, staff_id)
        .await?
        .ok_or_else(staff_not_found)?;

    Ok(Json(StaffDTO::from(member)))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn update_staff(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(staff_id): Path<i64>,
    Json(body): Json<UpdateStaffDTO>,
) -> Result<Json<StaffDTO>, AppError> {
    // 1. Load the target inside the caller's clinic
    // 2. Managers may edit anyone; others only their own phone / specialization
    // 3. The OWNER role can be neither given nor taken away
    // 4. Check the specialization and write the changes

    let target = state
        .staff
        .read_in_clinic(&staff.clinic_id, &staff_id)
        .await?
        .ok_or_else(staff_not_found)?;

    let is_self = target.staff_id == staff.staff_id;
    if !(is_self && body.is_self_service()) {
        require_role(&staff, StaffRole::MANAGERS)?;
    }

    body.validate()?;

    if let Some(role) = body.role {
        if role != target.role && (role == StaffRole::Owner || target.is_owner()) {
            warn!("Attempt to change the OWNER role of staff {}", target.staff_id);
            return Err(AppError::bad_request("The OWNER role cannot be assigned or removed")
                .with_code("OWNER_ROLE_IMMUTABLE"));
        }
    }

    check_specialization(&state, body.specialization_id).await?;

    state.staff.update(&target.staff_id, &body).await?;
    let updated = state
        .staff
        .read_with_user(staff.clinic_id, target.staff_id)
        .await?
        .ok_or_else(staff_not_found)?;

    info!("Staff {} updated", updated.staff_id);
    Ok(Json(StaffDTO::from(updated)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn deactivate_staff(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(staff_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;

    let target = state
        .staff
        .read_in_clinic(&staff.clinic_id, &staff_id)
        .await?
        .ok_or_else(staff_not_found)?;

    if target.is_owner() {
        return Err(AppError::bad_request("The clinic owner cannot be removed").with_code("CANNOT_REMOVE_OWNER"));
    }
    if target.staff_id == staff.staff_id {
        return Err(AppError::bad_request("You cannot deactivate yourself").with_code("CANNOT_REMOVE_SELF"));
    }

    state.staff.deactivate(target.staff_id, target.user_id).await?;

    info!("Staff {} deactivated", target.staff_id);
    Ok(StatusCode::NO_CONTENT)
}
