//! Core Module - infrastructure components of the application
//!
//! - Authentication, JWT and opaque tokens
//! - Configuration
//! - Email delivery and templates
//! - Error handling
//! - Application state

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod state;
pub mod templates;

// Re-exports to simplify imports
pub use auth::{
    Claims, authentication_middleware, clinic_membership_middleware, decode_jwt, encode_jwt,
    generate_opaque_token, hash_token, require_role,
};
pub use config::Config;
pub use email::{EmailMessage, EmailSender, LogEmailSender, RecordingEmailSender, SmtpEmailSender};
pub use error::AppError;
pub use state::AppState;
pub use templates::TemplateEngine;
