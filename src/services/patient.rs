//! Patient services

use super::medical_record::with_measurements;
use crate::core::{AppError, AppState, require_role};
use crate::dtos::{
    CreatePatientDTO, MedicalRecordDTO, Page, Paged, PatientDTO, PatientQuery, UpdatePatientDTO,
};
use crate::entities::{Patient, Staff, StaffRole};
use crate::repositories::{Create, Delete, ReadInClinic, Update};
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

pub(crate) fn patient_not_found() -> AppError {
    AppError::not_found("Patient not found").with_code("PATIENT_NOT_FOUND")
}

/// Load a patient of the clinic or fail with 404 PATIENT_NOT_FOUND
pub(crate) async fn load_patient(state: &AppState, clinic_id: i64, patient_id: i64) -> Result<Patient, AppError> {
    state
        .patient
        .read_in_clinic(&clinic_id, &patient_id)
        .await?
        .ok_or_else(patient_not_found)
}

fn check_date_of_birth(date_of_birth: Option<NaiveDate>) -> Result<(), AppError> {
    match date_of_birth {
        Some(date) if date > Utc::now().date_naive() => {
            warn!("Date of birth {} is in the future", date);
            Err(AppError::bad_request("Date of birth cannot be in the future")
                .with_code("INVALID_DATE_OF_BIRTH"))
        }
        _ => Ok(()),
    }
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<CreatePatientDTO>,
) -> Result<(StatusCode, Json<PatientDTO>), AppError> {
    body.validate()?;
    check_date_of_birth(body.date_of_birth)?;

    let patient = state.patient.create(&(staff.clinic_id, body)).await?;

    info!("Patient {} created", patient.patient_id);
    Ok((StatusCode::CREATED, Json(PatientDTO::from(patient))))
}

#[instrument(skip(state, staff, query), fields(clinic_id = %staff.clinic_id))]
pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Query(query): Query<PatientQuery>,
) -> Result<Json<Paged<PatientDTO>>, AppError> {
    let page = Page::new(query.page, query.page_size);
    let (patients, total) = state
        .patient
        .list(staff.clinic_id, query.search.as_deref(), page)
        .await?;

    Ok(Json(Paged::new(patients, page, total).map(PatientDTO::from)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(patient_id): Path<i64>,
) -> Result<Json<PatientDTO>, AppError> {
    let patient = load_patient(&state, staff.clinic_id, patient_id).await?;
    Ok(Json(PatientDTO::from(patient)))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(patient_id): Path<i64>,
    Json(body): Json<UpdatePatientDTO>,
) -> Result<Json<PatientDTO>, AppError> {
    let patient = load_patient(&state, staff.clinic_id, patient_id).await?;
    body.validate()?;
    check_date_of_birth(body.date_of_birth)?;

    let updated = state.patient.update(&patient.patient_id, &body).await?;

    debug!("Patient {} updated", updated.patient_id);
    Ok(Json(PatientDTO::from(updated)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(patient_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&staff, StaffRole::FRONT_DESK)?;
    let patient = load_patient(&state, staff.clinic_id, patient_id).await?;

    state.patient.delete(&patient.patient_id).await?;

    info!("Patient {} deleted", patient.patient_id);
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn list_patient_records(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Vec<MedicalRecordDTO>>, AppError> {
    require_role(&staff, StaffRole::CLINICIANS)?;
    let patient = load_patient(&state, staff.clinic_id, patient_id).await?;

    let records = state
        .record
        .list_for_patient(staff.clinic_id, patient.patient_id)
        .await?;
    let records = futures::future::try_join_all(records.into_iter().map(|r| with_measurements(&state, r))).await?;

    Ok(Json(records))
}
