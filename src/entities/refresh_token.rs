//! RefreshToken entity - long lived credential rotated on every use

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub token_id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    // hash of the token that replaced this one during rotation
    pub replaced_by_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Revoked,
    Expired,
}

impl RefreshToken {
    /// Revocation wins over expiry so that reuse of a rotated token is detected
    pub fn state(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.revoked_at.is_some() {
            RefreshTokenState::Revoked
        } else if now >= self.expires_at {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(expires_in: Duration, revoked: bool) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            token_id: 1,
            user_id: 1,
            token_hash: "abc".to_string(),
            expires_at: now + expires_in,
            created_at: now,
            revoked_at: revoked.then_some(now),
            replaced_by_hash: None,
        }
    }

    #[test]
    fn states() {
        let now = Utc::now();
        assert_eq!(token(Duration::days(1), false).state(now), RefreshTokenState::Active);
        assert_eq!(token(Duration::days(-1), false).state(now), RefreshTokenState::Expired);
        assert_eq!(token(Duration::days(1), true).state(now), RefreshTokenState::Revoked);
        assert_eq!(token(Duration::days(-1), true).state(now), RefreshTokenState::Revoked);
    }
}
