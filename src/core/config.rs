use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use tracing::{info, warn};

const DEFAULT_JWT_SECRET: &str = "change-me-clinic-backend-secret";

/// SMTP settings; absent when `SMTP_HOST` is not set
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub max_connections: u32,
    pub app_env: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub invitation_days: i64,
    pub email_token_hours: i64,
    pub require_confirmed_email: bool,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub smtp: Option<SmtpSettings>,
}

impl Config {
    /// Load the configuration from environment variables.
    /// Calls dotenv() automatically
    pub fn from_env() -> Result<Self, String> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://clinic.db?mode=rwc".to_string());

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let jwt_secret = resolve_jwt_secret(env::var("JWT_SECRET").ok(), app_env == "production")?;

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = parse_var("SERVER_PORT", 3000u16)?;
        let max_connections = parse_var("MAX_DB_CONNECTIONS", 10u32)?;

        let access_token_minutes = parse_positive("ACCESS_TOKEN_MINUTES", 15)?;
        let refresh_token_days = parse_positive("REFRESH_TOKEN_DAYS", 7)?;
        let invitation_days = parse_positive("INVITATION_DAYS", 7)?;
        let email_token_hours = parse_positive("EMAIL_TOKEN_HOURS", 24)?;
        let require_confirmed_email = parse_bool("REQUIRE_CONFIRMED_EMAIL", true);

        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .trim_end_matches('/')
            .to_string();

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![frontend_url.clone()]);

        let smtp = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpSettings {
                host,
                port: parse_var("SMTP_PORT", 587u16)?,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                from: env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "Clinic <noreply@localhost>".to_string()),
                use_tls: parse_bool("SMTP_USE_TLS", true),
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            server_host,
            server_port,
            max_connections,
            app_env,
            access_token_minutes,
            refresh_token_days,
            invitation_days,
            email_token_hours,
            require_confirmed_email,
            frontend_url,
            cors_origins,
            smtp,
        })
    }

    /// Configuration used by tests: in-memory database, short lived tokens
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            max_connections: 1,
            app_env: "test".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
            invitation_days: 7,
            email_token_hours: 24,
            require_confirmed_email: true,
            frontend_url: "http://localhost:5173".to_string(),
            cors_origins: vec!["http://localhost:5173".to_string()],
            smtp: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// Log the configuration (hiding secrets)
    pub fn print_info(&self) {
        info!("Server configuration:");
        info!("  Environment: {}", self.app_env);
        info!("  Server address: {}:{}", self.server_host, self.server_port);
        info!("  Database: {}", Self::mask_url(&self.database_url));
        info!("  Max DB connections: {}", self.max_connections);
        info!(
            "  Token lifetimes: access {}m, refresh {}d, invitation {}d, email {}h",
            self.access_token_minutes,
            self.refresh_token_days,
            self.invitation_days,
            self.email_token_hours
        );
        info!("  Require confirmed email: {}", self.require_confirmed_email);
        match &self.smtp {
            Some(smtp) => info!("  SMTP: {}:{} (tls: {})", smtp.host, smtp.port, smtp.use_tls),
            None => info!("  SMTP: not configured, emails are logged"),
        }
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("  JWT secret: USING DEFAULT (INSECURE!)");
        } else {
            info!("  JWT secret: custom secret configured");
        }
    }

    /// Mask the credentials part of a database URL for logging
    fn mask_url(url: &str) -> String {
        if let Some(at_pos) = url.find('@') {
            if let Some(scheme_end) = url.find("://") {
                let scheme = &url[..scheme_end + 3];
                let after_at = &url[at_pos..];
                return format!("{}***{}", scheme, after_at);
            }
        }
        url.to_string()
    }
}

/// The default secret is only accepted outside production
fn resolve_jwt_secret(value: Option<String>, production: bool) -> Result<String, String> {
    match value.filter(|v| !v.trim().is_empty()) {
        Some(secret) => Ok(secret),
        None if production => Err("JWT_SECRET must be set in production".to_string()),
        None => {
            warn!("JWT_SECRET not set, using default (not secure for production!)");
            Ok(DEFAULT_JWT_SECRET.to_string())
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("Invalid {}: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_positive(name: &str, default: i64) -> Result<i64, String> {
    let value = parse_var(name, default)?;
    if value <= 0 {
        return Err(format!("Invalid {}: must be a positive number", name));
    }
    Ok(value)
}

fn parse_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_url_hides_credentials() {
        assert_eq!(
            Config::mask_url("mysql://root:secret@db:3306/clinic"),
            "mysql://***@db:3306/clinic"
        );
        assert_eq!(Config::mask_url("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn jwt_secret_is_required_in_production() {
        assert!(resolve_jwt_secret(None, true).is_err());
        assert!(resolve_jwt_secret(Some("  ".to_string()), true).is_err());
        assert_eq!(resolve_jwt_secret(Some("s3cret".to_string()), true).unwrap(), "s3cret");
        assert_eq!(resolve_jwt_secret(None, false).unwrap(), DEFAULT_JWT_SECRET);
    }

    #[test]
    fn test_config_is_not_production() {
        let config = Config::for_tests();
        assert!(!config.is_production());
        assert!(config.smtp.is_none());
    }
}
