//! Medical record services - clinical notes with typed measurements

use super::appointment::load_appointment;
use super::patient::load_patient;
use crate::core::{AppError, AppState, require_role};
use crate::dtos::{
    CreateMeasurementAttributeDTO, CreateMedicalRecordDTO, MeasurementAttributeDTO, MeasurementInputDTO,
    MedicalRecordDTO, NewMedicalRecordDTO, UpdateMedicalRecordDTO,
};
use crate::entities::{MedicalRecord, Staff, StaffRole};
use crate::repositories::{Create, Delete, ReadInClinic};
use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

async fn load_record(state: &AppState, clinic_id: i64, record_id: i64) -> Result<MedicalRecord, AppError> {
    state
        .record
        .read_in_clinic(&clinic_id, &record_id)
        .await?
        .ok_or_else(|| AppError::not_found("Medical record not found").with_code("RECORD_NOT_FOUND"))
}

/// Attach the measurements to a record
pub(crate) async fn with_measurements(state: &AppState, record: MedicalRecord) -> Result<MedicalRecordDTO, AppError> {
    let measurements = state.record.measurements(record.record_id).await?;
    Ok(MedicalRecordDTO::from((record, measurements)))
}

fn invalid_attribute(details: String) -> AppError {
    AppError::bad_request("Invalid measurement attribute")
        .with_code("INVALID_ATTRIBUTE")
        .with_details(details)
}

/// Every attribute must be a live attribute of the clinic, used once
async fn check_measurements(
    state: &AppState,
    clinic_id: i64,
    measurements: &[MeasurementInputDTO],
) -> Result<(), AppError> {
    let mut ids = HashSet::with_capacity(measurements.len());
    for measurement in measurements {
        if !ids.insert(measurement.attribute_id) {
            return Err(invalid_attribute(format!(
                "Attribute {} is measured twice",
                measurement.attribute_id
            )));
        }
    }

    let requested: Vec<i64> = ids.into_iter().collect();
    let existing: HashSet<i64> = state
        .attribute
        .existing_ids(clinic_id, &requested)
        .await?
        .into_iter()
        .collect();

    if let Some(missing) = requested.iter().find(|id| !existing.contains(id)) {
        warn!("Attribute {} is not defined in clinic {}", missing, clinic_id);
        return Err(invalid_attribute(format!("Unknown attribute: {}", missing)));
    }
    Ok(())
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id, staff_id = %staff.staff_id))]
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<CreateMedicalRecordDTO>,
) -> Result<(StatusCode, Json<MedicalRecordDTO>), AppError> {
    // 1. Clinicians only; the caller is the author
    // 2. Patient and optional appointment must belong to the clinic
    // 3. Measurements must reference clinic attributes
    // 4. Record and measurements are stored together

    require_role(&staff, StaffRole::CLINICIANS)?;
    body.validate()?;

    let patient = load_patient(&state, staff.clinic_id, body.patient_id).await?;
    if let Some(appointment_id) = body.appointment_id {
        let appointment = load_appointment(&state, staff.clinic_id, appointment_id).await?;
        if appointment.patient_id != patient.patient_id {
            return Err(AppError::bad_request("The appointment belongs to another patient")
                .with_code("APPOINTMENT_PATIENT_MISMATCH"));
        }
    }
    check_measurements(&state, staff.clinic_id, &body.measurements).await?;

    let record = state
        .record
        .create(&NewMedicalRecordDTO {
            clinic_id: staff.clinic_id,
            staff_id: staff.staff_id,
            patient_id: patient.patient_id,
            appointment_id: body.appointment_id,
            diagnosis: body.diagnosis,
            treatment: body.treatment,
            notes: body.notes,
            recorded_at: body.recorded_at.unwrap_or_else(Utc::now),
            measurements: body.measurements,
        })
        .await?;

    info!("Medical record {} created for patient {}", record.record_id, patient.patient_id);
    Ok((StatusCode::CREATED, Json(with_measurements(&state, record).await?)))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(record_id): Path<i64>,
) -> Result<Json<MedicalRecordDTO>, AppError> {
    require_role(&staff, StaffRole::CLINICIANS)?;
    let record = load_record(&state, staff.clinic_id, record_id).await?;
    Ok(Json(with_measurements(&state, record).await?))
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id, staff_id = %staff.staff_id))]
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(record_id): Path<i64>,
    Json(body): Json<UpdateMedicalRecordDTO>,
) -> Result<Json<MedicalRecordDTO>, AppError> {
    let record = load_record(&state, staff.clinic_id, record_id).await?;

    // the author edits their own notes, managers edit any
    if record.staff_id != staff.staff_id {
        require_role(&staff, StaffRole::MANAGERS)?;
    }
    body.validate()?;
    if let Some(measurements) = &body.measurements {
        check_measurements(&state, staff.clinic_id, measurements).await?;
    }

    let updated = state.record.update(record.record_id, &body).await?;

    info!("Medical record {} updated", updated.record_id);
    Ok(Json(with_measurements(&state, updated).await?))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(record_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;
    let record = load_record(&state, staff.clinic_id, record_id).await?;

    state.record.delete(&record.record_id).await?;

    info!("Medical record {} deleted", record.record_id);
    Ok(StatusCode::NO_CONTENT)
}

// ************************* MEASUREMENT ATTRIBUTES ************************* //

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn create_attribute(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<CreateMeasurementAttributeDTO>,
) -> Result<(StatusCode, Json<MeasurementAttributeDTO>), AppError> {
    require_role(&staff, StaffRole::CLINICIANS)?;
    body.validate()?;

    if state.attribute.find_by_name(staff.clinic_id, &body.name).await?.is_some() {
        warn!("Attribute '{}' already defined", body.name);
        return Err(AppError::conflict("An attribute with this name already exists")
            .with_code("DUPLICATE_ATTRIBUTE"));
    }

    let attribute = state.attribute.create(&(staff.clinic_id, body)).await?;

    info!("Measurement attribute {} created", attribute.attribute_id);
    Ok((StatusCode::CREATED, Json(MeasurementAttributeDTO::from(attribute))))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn list_attributes(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
) -> Result<Json<Vec<MeasurementAttributeDTO>>, AppError> {
    let attributes = state.attribute.list(staff.clinic_id).await?;
    debug!("Returning {} attributes", attributes.len());
    Ok(Json(attributes.into_iter().map(MeasurementAttributeDTO::from).collect()))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn delete_attribute(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(attribute_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;
    let attribute = state
        .attribute
        .read_in_clinic(&staff.clinic_id, &attribute_id)
        .await?
        .ok_or_else(|| AppError::not_found("Attribute not found").with_code("ATTRIBUTE_NOT_FOUND"))?;

    state.attribute.delete(&attribute.attribute_id).await?;

    info!("Measurement attribute {} deleted", attribute.attribute_id);
    Ok(StatusCode::NO_CONTENT)
}
