//! User entity - account with bcrypt password handling

use bcrypt::{DEFAULT_COST, non_truncating_hash, verify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Verify if target_password matches the stored hashed password
    pub fn verify_password(&self, target_password: &str) -> bool {
        verify(target_password, &self.password_hash).unwrap_or(false)
    }

    /// Hash a password using bcrypt with default cost.
    /// Passwords longer than 72 bytes are refused instead of truncated.
    pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
        let hash = non_truncating_hash(password, DEFAULT_COST)?;
        Ok(hash)
    }
}

/// Emails are compared and stored lower-cased and trimmed
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_password(password: &str) -> User {
        let now = Utc::now();
        User {
            user_id: 1,
            email: "alice@example.com".to_string(),
            password_hash: bcrypt::hash(password, 4).unwrap(),
            first_name: "Alice".to_string(),
            last_name: "Rossi".to_string(),
            email_confirmed: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn verify_password_matches_only_the_original() {
        let user = user_with_password("Secret123");
        assert!(user.verify_password("Secret123"));
        assert!(!user.verify_password("secret123"));
    }

    #[test]
    fn long_passwords_are_refused_not_truncated() {
        assert!(User::hash_password(&"Aa1".repeat(25)).is_err());
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = user_with_password("Secret123");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Bob@Clinic.IO "), "bob@clinic.io");
    }
}
