//! Services module - HTTP handlers grouped by feature
//!
//! Every handler receives the shared `AppState`; handlers behind the clinic
//! middleware also receive the caller's `Staff` row, whose `clinic_id`
//! scopes every query.

pub mod appointment;
pub mod auth;
pub mod clinic;
pub mod invitation;
pub mod invoice;
pub mod medical_record;
pub mod medicine;
pub mod onboarding;
pub mod patient;
pub mod staff;

// Re-exports to simplify imports
pub use appointment::{
    change_appointment_status, create_appointment, delete_appointment, get_appointment,
    list_appointments, update_appointment,
};
pub use auth::{
    change_password, confirm_email, forgot_password, get_me, login_user, logout_user,
    refresh_token, register_user, resend_confirmation, reset_password,
};
pub use clinic::{get_my_clinic, update_my_clinic};
pub use invitation::{
    accept_invitation, cancel_invitation, create_invitation, get_invitation_by_token,
    list_invitations, resend_invitation,
};
pub use invoice::{
    cancel_invoice, create_invoice, delete_invoice, get_invoice, issue_invoice, list_invoices,
    pay_invoice, replace_invoice_items,
};
pub use medical_record::{
    create_attribute, create_record, delete_attribute, delete_record, get_record, list_attributes,
    update_record,
};
pub use medicine::{
    adjust_stock, create_medicine, delete_medicine, get_medicine, list_medicines, update_medicine,
};
pub use onboarding::{complete_onboarding, list_specializations};
pub use patient::{
    create_patient, delete_patient, get_patient, list_patient_records, list_patients,
    update_patient,
};
pub use staff::{deactivate_staff, get_staff, list_staff, update_staff};

use crate::core::{AppError, AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, instrument};

/// Root endpoint - liveness
pub async fn root(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, "Clinic backend is running!")
}

/// Readiness - the database must answer
#[instrument(skip(state))]
pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|e| {
            error!("Health check failed: {}", e);
            AppError::service_unavailable("Database unavailable").with_code("DATABASE_UNAVAILABLE")
        })?;

    Ok((StatusCode::OK, Json(json!({ "status": "ok", "database": "up" }))))
}
