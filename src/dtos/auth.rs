//! Auth DTOs - requests and responses of the authentication endpoints

use super::validation::{validate_not_blank, validate_password};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// DTO for registering a new account
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct RegisterDTO {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    #[validate(
        length(min = 1, max = 100, message = "First name must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub first_name: String,

    #[validate(
        length(min = 1, max = 100, message = "Last name must be between 1 and 100 characters"),
        custom(function = "validate_not_blank")
    )]
    pub last_name: String,
}

/// DTO for login (only email and password)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginDTO {
    pub email: String,
    pub password: String,
}

/// Refresh token supplied in the body; the cookie is used when absent
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RefreshRequestDTO {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Pair of tokens returned by login and refresh
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponseDTO {
    pub access_token: String,
    pub token_type: String,
    /// access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct ConfirmEmailDTO {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct EmailOnlyDTO {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct ResetPasswordDTO {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,
    #[validate(custom(function = "validate_password"))]
    pub new_password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct ChangePasswordDTO {
    pub current_password: String,
    #[validate(custom(function = "validate_password"))]
    pub new_password: String,
}

/// Generic acknowledgement body
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageResponseDTO {
    pub message: String,
}

impl MessageResponseDTO {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
