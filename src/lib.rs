//! Clinic backend library - exposes the main modules for the binary and the tests

pub mod core;
pub mod dtos;
pub mod entities;
pub mod repositories;
pub mod services;

// Re-export of the main types
pub use crate::core::{AppError, AppState, auth, config};
pub use services::{health, root};

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/specializations", get(services::list_specializations))
        .merge(configure_auth_routes(state.clone()))
        .merge(configure_public_invitation_routes())
        .merge(configure_onboarding_routes(state.clone()))
        .merge(configure_clinic_routes(state.clone()))
        .with_state(state)
}

/// Authentication routes; `/auth/me` and `/auth/change-password` need an access token
fn configure_auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::authentication_middleware;
    use services::*;

    let public_routes = Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout_user))
        .route("/auth/confirm-email", post(confirm_email))
        .route("/auth/resend-confirmation", post(resend_confirmation))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password));

    let account_routes = Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/change-password", post(change_password))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ));

    public_routes.merge(account_routes)
}

/// Invitation routes used by the invitee, before having an account
fn configure_public_invitation_routes() -> Router<Arc<AppState>> {
    use services::*;

    Router::new()
        .route("/invitations/token/{token}", get(get_invitation_by_token))
        .route("/invitations/accept", post(accept_invitation))
}

/// Onboarding only needs authentication: the caller has no clinic yet
fn configure_onboarding_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::authentication_middleware;
    use services::*;

    Router::new()
        .route("/onboarding/complete", post(complete_onboarding))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

/// Tenant routes (authentication + clinic membership middleware)
fn configure_clinic_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::{authentication_middleware, clinic_membership_middleware};
    use services::*;

    Router::new()
        .route("/clinic", get(get_my_clinic).patch(update_my_clinic))
        // staff
        .route("/staff", get(list_staff))
        .route(
            "/staff/{staff_id}",
            get(get_staff).patch(update_staff).delete(deactivate_staff),
        )
        // invitations
        .route("/invitations", get(list_invitations).post(create_invitation))
        .route("/invitations/{invitation_id}/cancel", post(cancel_invitation))
        .route("/invitations/{invitation_id}/resend", post(resend_invitation))
        // patients
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/{patient_id}",
            get(get_patient).patch(update_patient).delete(delete_patient),
        )
        .route("/patients/{patient_id}/records", get(list_patient_records))
        // appointments
        .route("/appointments", get(list_appointments).post(create_appointment))
        .route(
            "/appointments/{appointment_id}",
            get(get_appointment)
                .patch(update_appointment)
                .delete(delete_appointment),
        )
        .route(
            "/appointments/{appointment_id}/status",
            post(change_appointment_status),
        )
        // billing
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route("/invoices/{invoice_id}", get(get_invoice).delete(delete_invoice))
        .route("/invoices/{invoice_id}/items", put(replace_invoice_items))
        .route("/invoices/{invoice_id}/issue", post(issue_invoice))
        .route("/invoices/{invoice_id}/pay", post(pay_invoice))
        .route("/invoices/{invoice_id}/cancel", post(cancel_invoice))
        // inventory
        .route("/medicines", get(list_medicines).post(create_medicine))
        .route(
            "/medicines/{medicine_id}",
            get(get_medicine).patch(update_medicine).delete(delete_medicine),
        )
        .route("/medicines/{medicine_id}/stock", post(adjust_stock))
        // medical records
        .route("/records", post(create_record))
        .route(
            "/records/{record_id}",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .route(
            "/measurement-attributes",
            get(list_attributes).post(create_attribute),
        )
        .route("/measurement-attributes/{attribute_id}", delete(delete_attribute))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            clinic_membership_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}
