//! Onboarding services - a confirmed account creates its clinic

use crate::core::{AppError, AppState};
use crate::dtos::{ClinicDTO, CompleteOnboardingDTO, OnboardingResultDTO, StaffDTO};
use crate::entities::{Specialization, User};
use crate::repositories::Read;
use axum::{
    Extension,
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Check that an optional specialization id exists
pub(crate) async fn check_specialization(state: &AppState, specialization_id: Option<i64>) -> Result<(), AppError> {
    if let Some(id) = specialization_id {
        if state.specialization.read(&id).await?.is_none() {
            warn!("Unknown specialization {}", id);
            return Err(AppError::bad_request("Unknown specialization").with_code("INVALID_SPECIALIZATION"));
        }
    }
    Ok(())
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn complete_onboarding(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<CompleteOnboardingDTO>,
) -> Result<(StatusCode, Json<OnboardingResultDTO>), AppError> {
    debug!("Completing onboarding");
    // 1. Validate the clinic data and the owner's staff details
    // 2. The account must have a confirmed email
    // 3. An account that is already staff somewhere cannot onboard again
    // 4. Check the specialization, if any
    // 5. Create the clinic and the OWNER staff row in one transaction

    body.validate()?;

    if !current_user.email_confirmed {
        warn!("Onboarding refused, email not confirmed");
        return Err(AppError::forbidden("Email address not confirmed").with_code("EMAIL_NOT_CONFIRMED"));
    }

    if state.staff.find_by_user_id(&current_user.user_id).await?.is_some() {
        warn!("User already belongs to a clinic");
        return Err(AppError::conflict("Account already belongs to a clinic").with_code("ALREADY_ONBOARDED"));
    }

    check_specialization(&state, body.specialization_id).await?;

    let (clinic, owner) = state
        .clinic
        .create_with_owner(
            &body.clinic,
            current_user.user_id,
            body.specialization_id,
            body.phone.as_deref(),
        )
        .await?;

    info!("Onboarding completed, clinic {}", clinic.clinic_id);
    Ok((
        StatusCode::CREATED,
        Json(OnboardingResultDTO {
            clinic: ClinicDTO::from(clinic),
            staff: StaffDTO::from(owner),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_specializations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Specialization>>, AppError> {
    let specializations = state.specialization.list_all().await?;
    Ok(Json(specializations))
}
