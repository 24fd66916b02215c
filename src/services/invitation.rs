//! Invitation services - the staff invitation workflow

use super::auth::{deliver, issue_token_pair, token_headers};
use crate::core::{AppError, AppState, generate_opaque_token, hash_token, require_role};
use crate::dtos::{
    AcceptInvitationDTO, AcceptedInvitationDTO, CreateInvitationDTO, CreateUserDTO, InvitationDTO,
    InvitationPreviewDTO, InvitationQuery, IssuedInvitationDTO, NewInvitationDTO, StaffDTO,
};
use crate::entities::user::normalize_email;
use crate::entities::{InvitationGuardError, InvitationStatus, Staff, StaffInvitation, StaffRole, User};
use crate::repositories::{Create, InvitationAccount, Read, ReadInClinic};
use axum::{
    Extension,
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_macros::debug_handler;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

fn invitation_not_found() -> AppError {
    AppError::not_found("Invitation not found").with_code("INVITATION_NOT_FOUND")
}

fn not_pending() -> AppError {
    AppError::conflict("Invitation is no longer pending").with_code("INVITATION_NOT_PENDING")
}

fn already_staff() -> AppError {
    AppError::conflict("This account is already a staff member").with_code("ALREADY_STAFF")
}

/// Persist the EXPIRED status of an invitation whose deadline has passed
async fn persist_expiry(state: &AppState, invitation: &StaffInvitation) -> Result<(), AppError> {
    if invitation.is_stale_pending(Utc::now()) {
        state.invitation.mark_expired(invitation.invitation_id).await?;
    }
    Ok(())
}

async fn clinic_name(state: &AppState, clinic_id: i64) -> Result<String, AppError> {
    let clinic = state
        .clinic
        .read(&clinic_id)
        .await?
        .ok_or_else(|| AppError::not_found("Clinic not found").with_code("CLINIC_NOT_FOUND"))?;
    Ok(clinic.name)
}

async fn send_invitation(state: &AppState, invitation: &StaffInvitation, token: &str) -> Result<(), AppError> {
    let clinic_name = clinic_name(state, invitation.clinic_id).await?;
    deliver(
        state,
        state.templates.invitation_email(
            &invitation.email,
            &clinic_name,
            invitation.role,
            token,
            &state.config.frontend_url,
        )?,
    )
    .await;
    Ok(())
}

#[instrument(skip(state, staff, body), fields(clinic_id = %staff.clinic_id))]
pub async fn create_invitation(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Json(body): Json<CreateInvitationDTO>,
) -> Result<(StatusCode, Json<IssuedInvitationDTO>), AppError> {
    debug!("Creating staff invitation");
    // 1. Only OWNER / ADMIN can invite
    // 2. Validate the DTO; nobody can be invited as OWNER
    // 3. Refuse emails that are already staff or already have a live invitation
    // 4. Store the hashed token with its deadline
    // 5. Email the accept link and return the invitation with the raw token

    require_role(&staff, StaffRole::MANAGERS)?;
    body.validate()?;

    if body.role == StaffRole::Owner {
        return Err(AppError::bad_request("Cannot invite a new owner").with_code("INVALID_ROLE"));
    }

    let email = normalize_email(&body.email);
    let now = Utc::now();

    if state.staff.is_email_in_clinic(staff.clinic_id, &email).await? {
        warn!("Invited email is already staff of the clinic");
        return Err(already_staff());
    }

    if state
        .invitation
        .has_pending_invitation(staff.clinic_id, &email, now)
        .await?
    {
        warn!("A pending invitation already exists for this email");
        return Err(AppError::conflict("A pending invitation already exists for this email")
            .with_code("DUPLICATE_INVITATION"));
    }

    let token = generate_opaque_token();
    let invitation = state
        .invitation
        .create(&NewInvitationDTO {
            clinic_id: staff.clinic_id,
            email,
            role: body.role,
            token_hash: hash_token(&token),
            invited_by: staff.staff_id,
            expires_at: now + Duration::days(state.config.invitation_days),
        })
        .await?;

    send_invitation(&state, &invitation, &token).await?;

    info!("Invitation {} created", invitation.invitation_id);
    Ok((
        StatusCode::CREATED,
        Json(IssuedInvitationDTO {
            invitation: InvitationDTO::from_entity(invitation, now),
            token,
        }),
    ))
}

#[instrument(skip(state, staff, query), fields(clinic_id = %staff.clinic_id))]
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Query(query): Query<InvitationQuery>,
) -> Result<Json<Vec<InvitationDTO>>, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;

    let now = Utc::now();
    let invitations = state.invitation.list(staff.clinic_id, query.status, now).await?;

    // persist the expiry of the stale rows we just observed
    let stale = invitations
        .iter()
        .filter(|i| i.is_stale_pending(now))
        .map(|i| state.invitation.mark_expired(i.invitation_id));
    futures::future::try_join_all(stale).await?;

    debug!("Found {} invitations", invitations.len());
    Ok(Json(
        invitations
            .into_iter()
            .map(|i| InvitationDTO::from_entity(i, now))
            .collect(),
    ))
}

#[instrument(skip(state, token))]
pub async fn get_invitation_by_token(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<InvitationPreviewDTO>, AppError> {
    let invitation = state
        .invitation
        .find_by_token_hash(&hash_token(&token))
        .await?
        .ok_or_else(invitation_not_found)?;

    persist_expiry(&state, &invitation).await?;
    let clinic_name = clinic_name(&state, invitation.clinic_id).await?;

    Ok(Json(InvitationPreviewDTO {
        clinic_name,
        status: invitation.effective_status(Utc::now()),
        email: invitation.email,
        role: invitation.role,
        expires_at: invitation.expires_at,
    }))
}

#[debug_handler]
#[instrument(skip(state, body))]
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AcceptInvitationDTO>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Validate the DTO and find the invitation by token hash
    // 2. Guard: must be PENDING and before its deadline (expired ones are persisted EXPIRED)
    // 3. Existing account: the password must match and it must not be staff already
    //    New account: created confirmed, the invitation proves the address
    // 4. Create the staff row and mark the invitation ACCEPTED in one transaction
    // 5. Sign the new staff member in

    body.validate()?;

    let invitation = state
        .invitation
        .find_by_token_hash(&hash_token(body.token.trim()))
        .await?
        .ok_or_else(invitation_not_found)?;

    match invitation.ensure_acceptable(Utc::now()) {
        Ok(()) => {}
        Err(InvitationGuardError::Expired) => {
            persist_expiry(&state, &invitation).await?;
            warn!("Invitation {} expired", invitation.invitation_id);
            return Err(AppError::gone("Invitation expired").with_code("INVITATION_EXPIRED"));
        }
        Err(InvitationGuardError::NotPending(status)) => {
            warn!("Invitation {} is {:?}", invitation.invitation_id, status);
            return Err(not_pending());
        }
    }

    let account = match state.user.find_by_email(&invitation.email).await? {
        Some(user) => {
            if !user.verify_password(&body.password) {
                warn!("Wrong password for the invited account");
                return Err(AppError::unauthorized("Invalid email or password").with_code("INVALID_CREDENTIALS"));
            }
            if state.staff.find_by_user_id(&user.user_id).await?.is_some() {
                return Err(already_staff());
            }
            InvitationAccount::Existing(user)
        }
        None => InvitationAccount::New(CreateUserDTO {
            email: invitation.email.clone(),
            password_hash: User::hash_password(&body.password)?,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email_confirmed: true,
        }),
    };

    let (user, staff) = state
        .invitation
        .accept(&invitation, account)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_pending(),
            other => AppError::from(other),
        })?;

    let tokens = issue_token_pair(&state, &user).await?;
    let headers = token_headers(&state, &tokens)?;

    info!("User {} joined clinic {} as {}", user.user_id, staff.clinic_id, staff.role);
    Ok((
        StatusCode::CREATED,
        headers,
        Json(AcceptedInvitationDTO {
            staff: StaffDTO::from(staff),
            tokens,
        }),
    ))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn cancel_invitation(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invitation_id): Path<i64>,
) -> Result<Json<InvitationDTO>, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;

    let invitation = state
        .invitation
        .read_in_clinic(&staff.clinic_id, &invitation_id)
        .await?
        .ok_or_else(invitation_not_found)?;

    if let Err(reason) = invitation.ensure_cancellable(Utc::now()) {
        warn!("Cannot cancel invitation {}: {:?}", invitation_id, reason);
        persist_expiry(&state, &invitation).await?;
        return Err(not_pending());
    }

    let cancelled = state.invitation.cancel(invitation_id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => not_pending(),
        other => AppError::from(other),
    })?;

    info!("Invitation {} cancelled", invitation_id);
    Ok(Json(InvitationDTO::from_entity(cancelled, Utc::now())))
}

#[instrument(skip(state, staff), fields(clinic_id = %staff.clinic_id))]
pub async fn resend_invitation(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<Staff>,
    Path(invitation_id): Path<i64>,
) -> Result<Json<IssuedInvitationDTO>, AppError> {
    require_role(&staff, StaffRole::MANAGERS)?;

    let invitation = state
        .invitation
        .read_in_clinic(&staff.clinic_id, &invitation_id)
        .await?
        .ok_or_else(invitation_not_found)?;

    if let Err(reason) = invitation.ensure_resendable() {
        warn!("Cannot resend invitation {}: {:?}", invitation_id, reason);
        return Err(not_pending());
    }

    if state.staff.is_email_in_clinic(staff.clinic_id, &invitation.email).await? {
        return Err(already_staff());
    }

    let now = Utc::now();
    // re-opening an expired invitation must not duplicate a newer live one
    if invitation.effective_status(now) == InvitationStatus::Expired {
        if state
            .invitation
            .has_pending_invitation(staff.clinic_id, &invitation.email, now)
            .await?
        {
            return Err(AppError::conflict("A pending invitation already exists for this email")
                .with_code("DUPLICATE_INVITATION"));
        }
    }

    let token = generate_opaque_token();
    let reissued = state
        .invitation
        .reissue(
            invitation_id,
            &hash_token(&token),
            now + Duration::days(state.config.invitation_days),
        )
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => not_pending(),
            other => AppError::from(other),
        })?;

    send_invitation(&state, &reissued, &token).await?;

    info!("Invitation {} resent", invitation_id);
    Ok(Json(IssuedInvitationDTO {
        invitation: InvitationDTO::from_entity(reissued, now),
        token,
    }))
}
