use crate::core::{AppError, AppState};
use crate::entities::{Staff, StaffRole, User};
use crate::repositories::Read;
use axum::extract::State;
use axum::{Error, body::Body, extract::Request, http, http::Response, middleware::Next};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Length of the opaque tokens handed to clients (refresh, invitation, email)
pub const OPAQUE_TOKEN_LEN: usize = 48;

// struct encoding the content of the access token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,    // user id
    pub email: String,
    pub iat: usize, // Issued at time of the token
    pub exp: usize, // Expiry time of the token
}

#[instrument(skip(secret), fields(user_id = %user_id))]
pub fn encode_jwt(user_id: i64, email: String, lifetime_minutes: i64, secret: &str) -> Result<String, Error> {
    debug!("Encoding access token");
    let now = Utc::now();
    let exp: usize = (now + Duration::minutes(lifetime_minutes)).timestamp() as usize;
    let iat: usize = now.timestamp() as usize;
    let claim = Claims {
        sub: user_id,
        email,
        iat,
        exp,
    };

    encode(
        &Header::default(),
        &claim,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| {
        error!("Failed to encode JWT token: {:?}", e);
        Error::new("Error in encoding jwt token")
    })
}

#[instrument(skip(jwt_token, secret))]
pub fn decode_jwt(jwt_token: &str, secret: &str) -> Result<TokenData<Claims>, Error> {
    decode(
        jwt_token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("Failed to decode JWT token: {:?}", e);
        Error::new("Error in decoding jwt token")
    })
}

/// Random alphanumeric token; only its hash is ever stored
pub fn generate_opaque_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Hex encoded SHA-256 of an opaque token
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Extract the token of an `Authorization: Bearer <token>` header value
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Some(token),
        _ => None,
    }
}

#[instrument(skip(state, req, next))]
pub async fn authentication_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running authentication middleware");
    let auth_header = match req.headers().get(http::header::AUTHORIZATION) {
        Some(header) => header.to_str().map_err(|_| {
            warn!("Invalid authorization header format");
            AppError::unauthorized("Invalid authorization header").with_code("MISSING_TOKEN")
        })?,
        None => {
            warn!("Missing authorization header");
            return Err(
                AppError::unauthorized("Please add the access token to the header")
                    .with_code("MISSING_TOKEN"),
            );
        }
    };

    let token = bearer_token(auth_header).ok_or_else(|| {
        warn!("Authorization header is not a bearer token");
        AppError::unauthorized("Expected a bearer token").with_code("MISSING_TOKEN")
    })?;

    let token_data = decode_jwt(token, &state.config.jwt_secret).map_err(|_| {
        AppError::unauthorized("Unable to decode token").with_code("INVALID_TOKEN")
    })?;

    // Fetch the user details from the database
    let current_user: User = match state.user.read(&token_data.claims.sub).await? {
        Some(user) => user,
        None => {
            warn!("User not found in database: {}", token_data.claims.sub);
            return Err(AppError::unauthorized("You are not an authorized user")
                .with_code("INVALID_TOKEN"));
        }
    };
    debug!("User authenticated: {}", current_user.user_id);
    req.extensions_mut().insert(current_user);
    Ok(next.run(req).await)
}

/// Middleware resolving the clinic (tenant) of the authenticated user.
/// Must run after `authentication_middleware`; inserts the caller's `Staff`
/// row in the request extensions.
#[instrument(skip(state, req, next))]
pub async fn clinic_membership_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response<Body>, AppError> {
    debug!("Running clinic membership middleware");
    let user_id = req
        .extensions()
        .get::<User>()
        .map(|u| u.user_id)
        .ok_or_else(|| {
            warn!("User not found in request extensions");
            AppError::unauthorized("User not authenticated")
        })?;

    let staff = state
        .staff
        .find_membership(&user_id)
        .await?
        .ok_or_else(|| {
            warn!("User {} is not a member of any clinic", user_id);
            AppError::forbidden("You are not a staff member of any clinic")
                .with_code("NOT_A_STAFF_MEMBER")
        })?;

    if !staff.is_active {
        warn!("Staff {} is inactive", staff.staff_id);
        return Err(AppError::forbidden("Your staff account is inactive").with_code("STAFF_INACTIVE"));
    }

    debug!("User {} verified as staff of clinic {}", user_id, staff.clinic_id);
    req.extensions_mut().insert(staff);

    Ok(next.run(req).await)
}

/// Helper checking that a staff member has one of the required roles
///
/// # Returns
/// * `Ok(())` if the role is allowed
/// * `Err(AppError)` with code `INSUFFICIENT_ROLE` otherwise
pub fn require_role(staff: &Staff, allowed_roles: &[StaffRole]) -> Result<(), AppError> {
    if !staff.has_any_role(allowed_roles) {
        warn!(
            "Staff {} has insufficient role {:?}, required one of: {:?}",
            staff.staff_id, staff.role, allowed_roles
        );
        return Err(AppError::forbidden("Insufficient role")
            .with_code("INSUFFICIENT_ROLE")
            .with_details(format!(
                "This action requires one of the following roles: {:?}",
                allowed_roles
            )));
    }

    info!("Role check passed for staff {} with role {:?}", staff.staff_id, staff.role);
    Ok(())
}
