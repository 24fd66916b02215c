//! Appointment services - scheduling with per-staff conflict detection

use super::patient::load_patient;
use crate::core::{AppError, AppState, require_role};
use crate::dtos::{
    AppointmentChangesDTO, AppointmentDTO, AppointmentQuery, AppointmentStatusDTO,
    CreateAppointmentDTO, Page, Paged, UpdateAppointmentDTO,
};
use crate::entities::{Appointment, Staff, StaffRole};
use crate::repositories::{Create, Delete, ReadInClinic, Update};
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

fn appointment_not_found() -> AppError {
    AppError::not_found("Appointment not found").with_code("APPOINTMENT_NOT_FOUND")
}

pub(crate) async fn load_appointment(
    state: &AppState,
    clinic_id: i64,
    appointment_id: i64,
) -> Result<Appointment, AppError> {
    state
        .appointment
        .read_in_clinic(&clinic_id, &appointment_id)
        .await?
        .ok_or_else(appointment_not_found)
}

/// The practitioner must be an active staff member of the clinic
async fn check_practitioner(state: &AppState, clinic_id: i64, staff_id: i64) -> Result<(), AppError> {
    let practitioner = state
        .staff
        .read_in_clinic_with_inactive(clinic_id, staff_id)
        .await?
        .ok_or_else(|| AppError::not_found("Staff member not found").with_code("STAFF_NOT_FOUND"))?;

    if !practitioner.is_active {
        return Err(AppError::bad_request("Staff member is inactive").with_code("STAFF_INACTIVE"));
    }
    Ok(())
}

/// Refuse a slot overlapping another SCHEDULED appointment of the same staff member
async fn check_conflicts(
    state: &AppState,
    staff_id: i64,
    start: DateTime<Utc>,
    duration_minutes: i64,
    exclude: Option<i64>,
) -> Result<(), AppError> {
    let end = start + Duration::minutes(duration_minutes);
    let conflicts = state
        .appointment
        .find_conflicts(staff_id, start, end, exclude)
        .await?;

    if let Some(first) = conflicts.first() {
        warn!("Slot conflicts with appointment {}", first.appointment_id);
        return Err(AppError::conflict("The staff member already has an appointment in this slot")
            .with_code("APPOINTMENT_CONFLICT")
            .with_details(format!("Conflicting appointment: {}", first.appointment_id)));
    }
    Ok(())
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<CreateAppointmentDTO>,
) -> Result<(StatusCode, Json<AppointmentDTO>), AppError> {
    // 1. Validate the DTO (duration 5..=480)
    // 2. Patient and practitioner must belong to the clinic, practitioner active
    // 3. The slot must be free for the practitioner
    // 4. Store as SCHEDULED

    body.validate()?;
    load_patient(&state, staff.clinic_id, body.patient_id).await?;
    check_practitioner(&state, staff.clinic_id, body.staff_id).await?;
    check_conflicts(&state, body.staff_id, body.scheduled_at, body.duration_minutes, None).await?;

    let appointment = state.appointment.create(&(staff.clinic_id, body)).await?;

    info!("Appointment {} scheduled", appointment.appointment_id);
    Ok((StatusCode::CREATED, Json(AppointmentDTO::from(appointment))))
}

#[instrument(skip(state, staff, query), fields(clinic_id = %staff.clinic_id))]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Paged<AppointmentDTO>>, AppError> {
    let page = Page::new(query.page, query.page_size);
    let (appointments, total) = state.appointment.list(staff.clinic_id, &query, page).await?;

    debug!("Returning {} appointments", appointments.len());
    Ok(Json(Paged::new(appointments, page, total).map(AppointmentDTO::from)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<AppointmentDTO>, AppError> {
    let appointment = load_appointment(&state, staff.clinic_id, appointment_id).await?;
    Ok(Json(AppointmentDTO::from(appointment)))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(appointment_id): Path<i64>,
    Json(body): Json<UpdateAppointmentDTO>,
) -> Result<Json<AppointmentDTO>, AppError> {
    // 1. Only SCHEDULED appointments can be edited
    // 2. A new practitioner must be an active staff member of the clinic
    // 3. Re-check conflicts on the resulting slot, ignoring this appointment

    let appointment = load_appointment(&state, staff.clinic_id, appointment_id).await?;
    if !appointment.is_editable() {
        return Err(AppError::conflict("Only scheduled appointments can be edited")
            .with_code("APPOINTMENT_NOT_EDITABLE"));
    }
    body.validate()?;

    let staff_id = body.staff_id.unwrap_or(appointment.staff_id);
    if staff_id != appointment.staff_id {
        check_practitioner(&state, staff.clinic_id, staff_id).await?;
    }
    check_conflicts(
        &state,
        staff_id,
        body.scheduled_at.unwrap_or(appointment.scheduled_at),
        body.duration_minutes.unwrap_or(appointment.duration_minutes),
        Some(appointment.appointment_id),
    )
    .await?;

    let updated = state
        .appointment
        .update(&appointment.appointment_id, &AppointmentChangesDTO::from(body))
        .await?;

    info!("Appointment {} updated", updated.appointment_id);
    Ok(Json(AppointmentDTO::from(updated)))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn change_appointment_status(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(appointment_id): Path<i64>,
    Json(body): Json<AppointmentStatusDTO>,
) -> Result<Json<AppointmentDTO>, AppError> {
    let appointment = load_appointment(&state, staff.clinic_id, appointment_id).await?;

    if !appointment.status.can_transition_to(body.status) {
        warn!("Transition {:?} -> {:?} refused", appointment.status, body.status);
        return Err(AppError::conflict("Status transition not allowed")
            .with_code("INVALID_STATUS_TRANSITION")
            .with_details(format!("{:?} -> {:?}", appointment.status, body.status)));
    }

    let updated = state
        .appointment
        .update(
            &appointment.appointment_id,
            &AppointmentChangesDTO {
                status: Some(body.status),
                ..Default::default()
            },
        )
        .await?;

    info!("Appointment {} is now {:?}", updated.appointment_id, updated.status);
    Ok(Json(AppointmentDTO::from(updated)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(appointment_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&staff, StaffRole::FRONT_DESK)?;
    let appointment = load_appointment(&state, staff.clinic_id, appointment_id).await?;

    state.appointment.delete(&appointment.appointment_id).await?;

    info!("Appointment {} deleted", appointment.appointment_id);
    Ok(StatusCode::NO_CONTENT)
}
