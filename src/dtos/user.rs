//! User DTOs - Data Transfer Objects for accounts

use crate::dtos::StaffDTO;
use crate::entities::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// struct for io with the client, the password hash is never exposed
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserDTO {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDTO {
    fn from(value: User) -> Self {
        Self {
            id: value.user_id,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            email_confirmed: value.email_confirmed,
            created_at: value.created_at,
        }
    }
}

/// DTO to create a new account (password already hashed)
#[derive(Debug, Clone)]
pub struct CreateUserDTO {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email_confirmed: bool,
}

/// DTO to update an account (only Some fields are written)
#[derive(Debug, Clone, Default)]
pub struct UpdateUserDTO {
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_confirmed: Option<bool>,
}

/// Response of `GET /auth/me`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeDTO {
    pub user: UserDTO,
    pub staff: Option<StaffDTO>,
}
