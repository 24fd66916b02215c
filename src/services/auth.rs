//! Auth services - registration, login, token rotation and account recovery

use crate::core::{AppError, AppState, EmailMessage, encode_jwt, generate_opaque_token, hash_token};
use crate::dtos::{
    ChangePasswordDTO, ConfirmEmailDTO, CreateUserDTO, EmailOnlyDTO, LoginDTO, MeDTO,
    MessageResponseDTO, RefreshRequestDTO, RegisterDTO, ResetPasswordDTO, StaffDTO,
    TokenResponseDTO, UpdateUserDTO, UserDTO,
};
use crate::entities::user::normalize_email;
use crate::entities::{RefreshTokenState, TokenPurpose, User};
use crate::repositories::{Create, Read, Update};
use axum::{
    Extension,
    extract::{Json, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Name of the cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";

// ************************* HELPERS ************************* //

/// Send an email, logging instead of failing the request when delivery fails
pub(crate) async fn deliver(state: &AppState, message: EmailMessage) {
    let to = message.to.clone();
    if let Err(e) = state.email.send(message).await {
        warn!("Could not send email to {} via {}: {}", to, state.email.name(), e);
    }
}

/// Create an access token plus a freshly stored refresh token
pub(crate) async fn issue_token_pair(state: &AppState, user: &User) -> Result<TokenResponseDTO, AppError> {
    let access_token = encode_jwt(
        user.user_id,
        user.email.clone(),
        state.config.access_token_minutes,
        &state.config.jwt_secret,
    )?;

    let refresh_token = generate_opaque_token();
    let expires_at = Utc::now() + Duration::days(state.config.refresh_token_days);
    state
        .refresh_token
        .create(user.user_id, &hash_token(&refresh_token), expires_at)
        .await?;

    Ok(TokenResponseDTO {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.access_token_minutes * 60,
        refresh_token,
    })
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value).map_err(|_| AppError::internal_server_error("Invalid header value"))
}

/// Set-Cookie with the refresh token and Authorization with the access token
pub(crate) fn token_headers(state: &AppState, tokens: &TokenResponseDTO) -> Result<HeaderMap, AppError> {
    let cookie_value = format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/auth; Max-Age={}",
        REFRESH_COOKIE,
        tokens.refresh_token,
        state.config.refresh_token_days * 24 * 60 * 60
    );

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, header_value(&cookie_value)?);
    headers.insert(
        header::AUTHORIZATION,
        header_value(&format!("Bearer {}", tokens.access_token))?,
    );
    Ok(headers)
}

/// Value of a cookie in the request headers
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Refresh token from the JSON body, falling back to the cookie
fn presented_refresh_token(headers: &HeaderMap, body: Option<RefreshRequestDTO>) -> Option<String> {
    body.and_then(|b| b.refresh_token)
        .filter(|t| !t.trim().is_empty())
        .or_else(|| cookie_value(headers, REFRESH_COOKIE))
}

/// Store a new single-use token for `user` and return the raw value
async fn issue_user_token(state: &AppState, user: &User, purpose: TokenPurpose) -> Result<String, AppError> {
    let token = generate_opaque_token();
    let expires_at = Utc::now() + Duration::hours(state.config.email_token_hours);
    state
        .user_token
        .issue(user.user_id, purpose, &hash_token(&token), expires_at)
        .await?;
    Ok(token)
}

/// Check and consume an email token, returning its account
async fn redeem_user_token(
    state: &AppState,
    email: &str,
    purpose: TokenPurpose,
    raw_token: &str,
) -> Result<User, AppError> {
    let invalid = || AppError::bad_request("Invalid or already used token").with_code("INVALID_TOKEN");

    let user = state
        .user
        .find_by_email(&normalize_email(email))
        .await?
        .ok_or_else(invalid)?;

    let token = state
        .user_token
        .find(user.user_id, purpose, &hash_token(raw_token.trim()))
        .await?
        .ok_or_else(invalid)?;

    if token.is_consumed() {
        warn!("Token {} already consumed", token.token_id);
        return Err(invalid());
    }
    if token.is_expired(Utc::now()) {
        warn!("Token {} expired", token.token_id);
        return Err(AppError::bad_request("Token expired").with_code("TOKEN_EXPIRED"));
    }
    if !state.user_token.consume(token.token_id).await? {
        return Err(invalid());
    }

    Ok(user)
}

/// A revoked token was presented again: sign the user out everywhere
async fn reuse_detected(state: &AppState, user_id: i64) -> AppError {
    warn!("Revoked refresh token presented for user {}, revoking all sessions", user_id);
    if let Err(e) = state.refresh_token.revoke_all_for_user(user_id).await {
        return e.into();
    }
    AppError::unauthorized("Refresh token revoked").with_code("REFRESH_TOKEN_REVOKED")
}

// ************************* HANDLERS ************************* //

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterDTO>,
) -> Result<impl IntoResponse, AppError> {
    debug!("Registering new account");
    // 1. Validate the DTO (email format, names, password policy)
    // 2. Reject an email that already has an account with 409 DUPLICATE_EMAIL
    // 3. Hash the password and store the unconfirmed account
    // 4. Issue an EMAIL_CONFIRMATION token and email it
    // 5. Return 201 with the created account

    body.validate()?;
    let email = normalize_email(&body.email);

    if state.user.find_by_email(&email).await?.is_some() {
        warn!("Email already registered");
        return Err(AppError::conflict("Email already registered").with_code("DUPLICATE_EMAIL"));
    }

    let password_hash = User::hash_password(&body.password)?;

    let user = state
        .user
        .create(&CreateUserDTO {
            email,
            password_hash,
            first_name: body.first_name.trim().to_string(),
            last_name: body.last_name.trim().to_string(),
            email_confirmed: false,
        })
        .await?;

    let token = issue_user_token(&state, &user, TokenPurpose::EmailConfirmation).await?;
    let message = state
        .templates
        .confirmation_email(&user.email, &user.first_name, &token, &state.config.frontend_url)?;
    deliver(&state, message).await;

    info!("Account {} registered", user.user_id);
    Ok((StatusCode::CREATED, Json(UserDTO::from(user))))
}

#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginDTO>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Look the account up by email, unknown -> 401 INVALID_CREDENTIALS
    // 2. Verify the password against the stored hash, wrong -> 401 INVALID_CREDENTIALS
    // 3. Refuse unconfirmed accounts when confirmation is required
    // 4. Issue the access / refresh token pair
    // 5. Return the pair with the refresh cookie and the Authorization header

    let invalid = || AppError::unauthorized("Invalid email or password").with_code("INVALID_CREDENTIALS");

    let user = state
        .user
        .find_by_email(&normalize_email(&body.email))
        .await?
        .ok_or_else(invalid)?;

    if !user.verify_password(&body.password) {
        warn!("Wrong password for user {}", user.user_id);
        return Err(invalid());
    }

    if state.config.require_confirmed_email && !user.email_confirmed {
        warn!("Login refused, email of user {} not confirmed", user.user_id);
        return Err(AppError::forbidden("Email address not confirmed").with_code("EMAIL_NOT_CONFIRMED"));
    }

    let tokens = issue_token_pair(&state, &user).await?;
    let headers = token_headers(&state, &tokens)?;

    info!("User {} logged in", user.user_id);
    Ok((StatusCode::OK, headers, Json(tokens)))
}

#[instrument(skip(state, headers, body))]
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequestDTO>>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Take the refresh token from the body or the cookie
    // 2. Look it up by hash, unknown -> 401 INVALID_REFRESH_TOKEN
    // 3. Revoked -> reuse detected, revoke every token of the user
    // 4. Expired -> 401 REFRESH_TOKEN_EXPIRED
    // 5. Rotate: revoke the old token pointing to the new one, issue a new pair

    let raw = presented_refresh_token(&headers, body.map(|Json(b)| b)).ok_or_else(|| {
        AppError::unauthorized("Refresh token required").with_code("MISSING_REFRESH_TOKEN")
    })?;
    let invalid = || AppError::unauthorized("Invalid refresh token").with_code("INVALID_REFRESH_TOKEN");

    let old_hash = hash_token(&raw);
    let stored = state
        .refresh_token
        .find_by_hash(&old_hash)
        .await?
        .ok_or_else(invalid)?;

    match stored.state(Utc::now()) {
        RefreshTokenState::Revoked => return Err(reuse_detected(&state, stored.user_id).await),
        RefreshTokenState::Expired => {
            return Err(AppError::unauthorized("Refresh token expired").with_code("REFRESH_TOKEN_EXPIRED"));
        }
        RefreshTokenState::Active => {}
    }

    let user = state
        .user
        .read(&stored.user_id)
        .await?
        .ok_or_else(invalid)?;

    let new_refresh = generate_opaque_token();
    let expires_at = Utc::now() + Duration::days(state.config.refresh_token_days);
    match state
        .refresh_token
        .rotate(user.user_id, &old_hash, &hash_token(&new_refresh), expires_at)
        .await
    {
        Ok(_) => {}
        // lost a race against another rotation of the same token
        Err(sqlx::Error::RowNotFound) => return Err(reuse_detected(&state, user.user_id).await),
        Err(e) => return Err(e.into()),
    }

    let tokens = TokenResponseDTO {
        access_token: encode_jwt(
            user.user_id,
            user.email.clone(),
            state.config.access_token_minutes,
            &state.config.jwt_secret,
        )?,
        token_type: "Bearer".to_string(),
        expires_in: state.config.access_token_minutes * 60,
        refresh_token: new_refresh,
    };
    let headers = token_headers(&state, &tokens)?;

    debug!("Refresh token rotated for user {}", user.user_id);
    Ok((StatusCode::OK, headers, Json(tokens)))
}

#[instrument(skip(state, headers, body))]
pub async fn logout_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequestDTO>>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(raw) = presented_refresh_token(&headers, body.map(|Json(b)| b)) {
        let revoked = state.refresh_token.revoke(&hash_token(&raw)).await?;
        debug!("Logout, token revoked: {}", revoked);
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        header_value(&format!(
            "{}=; HttpOnly; Secure; SameSite=Lax; Path=/auth; Max-Age=0",
            REFRESH_COOKIE
        ))?,
    );

    Ok((
        StatusCode::OK,
        response_headers,
        Json(MessageResponseDTO::new("Logged out")),
    ))
}

#[instrument(skip(state, current_user), fields(user_id = %current_user.user_id))]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<Json<MeDTO>, AppError> {
    let staff = state.staff.find_by_user_id(&current_user.user_id).await?;

    Ok(Json(MeDTO {
        user: UserDTO::from(current_user),
        staff: staff.map(StaffDTO::from),
    }))
}

#[instrument(skip(state, body))]
pub async fn confirm_email(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConfirmEmailDTO>,
) -> Result<Json<MessageResponseDTO>, AppError> {
    body.validate()?;

    let user = redeem_user_token(&state, &body.email, TokenPurpose::EmailConfirmation, &body.token).await?;
    state
        .user
        .update(
            &user.user_id,
            &UpdateUserDTO {
                email_confirmed: Some(true),
                ..Default::default()
            },
        )
        .await?;

    info!("Email of user {} confirmed", user.user_id);
    Ok(Json(MessageResponseDTO::new("Email confirmed")))
}

#[instrument(skip(state, body))]
pub async fn resend_confirmation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailOnlyDTO>,
) -> Result<impl IntoResponse, AppError> {
    // The answer is the same whether or not the account exists
    body.validate()?;

    match state.user.find_by_email(&normalize_email(&body.email)).await? {
        Some(user) if !user.email_confirmed => {
            let token = issue_user_token(&state, &user, TokenPurpose::EmailConfirmation).await?;
            let message = state
                .templates
                .confirmation_email(&user.email, &user.first_name, &token, &state.config.frontend_url)?;
            deliver(&state, message).await;
        }
        _ => debug!("No unconfirmed account for this address, nothing sent"),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponseDTO::new(
            "If the account exists and is not confirmed, a new email has been sent",
        )),
    ))
}

#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<EmailOnlyDTO>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    if let Some(user) = state.user.find_by_email(&normalize_email(&body.email)).await? {
        let token = issue_user_token(&state, &user, TokenPurpose::PasswordReset).await?;
        let message = state
            .templates
            .password_reset_email(&user.email, &user.first_name, &token, &state.config.frontend_url)?;
        deliver(&state, message).await;
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponseDTO::new(
            "If the account exists, a password reset email has been sent",
        )),
    ))
}

#[instrument(skip(state, body))]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResetPasswordDTO>,
) -> Result<Json<MessageResponseDTO>, AppError> {
    // 1. Validate the new password against the policy
    // 2. Redeem the PASSWORD_RESET token
    // 3. Store the new hash and sign out every session
    body.validate()?;

    let user = redeem_user_token(&state, &body.email, TokenPurpose::PasswordReset, &body.token).await?;
    let password_hash = User::hash_password(&body.new_password)?;
    state
        .user
        .update(
            &user.user_id,
            &UpdateUserDTO {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;
    state.refresh_token.revoke_all_for_user(user.user_id).await?;

    info!("Password of user {} reset", user.user_id);
    Ok(Json(MessageResponseDTO::new("Password updated")))
}

#[instrument(skip(state, current_user, body), fields(user_id = %current_user.user_id))]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    Json(body): Json<ChangePasswordDTO>,
) -> Result<Json<MessageResponseDTO>, AppError> {
    body.validate()?;

    if !current_user.verify_password(&body.current_password) {
        warn!("Wrong current password");
        return Err(AppError::bad_request("Current password is not correct").with_code("INVALID_PASSWORD"));
    }

    let password_hash = User::hash_password(&body.new_password)?;
    state
        .user
        .update(
            &current_user.user_id,
            &UpdateUserDTO {
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;
    state.refresh_token.revoke_all_for_user(current_user.user_id).await?;

    info!("Password changed");
    Ok(Json(MessageResponseDTO::new("Password updated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_lookup_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; refresh_token=abc123; lang=it"),
        );
        assert_eq!(cookie_value(&headers, REFRESH_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn body_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refresh_token=from-cookie"));

        let body = RefreshRequestDTO {
            refresh_token: Some("from-body".to_string()),
        };
        assert_eq!(
            presented_refresh_token(&headers, Some(body)).as_deref(),
            Some("from-body")
        );
        assert_eq!(
            presented_refresh_token(&headers, None).as_deref(),
            Some("from-cookie")
        );
        assert_eq!(presented_refresh_token(&HeaderMap::new(), None), None);
    }
}
