//! Custom validators used by the request DTOs

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    static ref PHONE_REGEX: Regex =
        Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").expect("phone regex is valid");
    static ref UPPERCASE_REGEX: Regex = Regex::new(r"[A-Z]").expect("regex is valid");
    static ref LOWERCASE_REGEX: Regex = Regex::new(r"[a-z]").expect("regex is valid");
    static ref DIGIT_REGEX: Regex = Regex::new(r"[0-9]").expect("regex is valid");
}

pub const PASSWORD_MIN_LEN: usize = 8;
/// bcrypt only reads the first 72 bytes of its input
pub const PASSWORD_MAX_BYTES: usize = 72;

/// Password policy: at least 8 chars and at most 72 bytes, with at least
/// one upper case letter, one lower case letter and one digit
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ValidationError::new("password_length")
            .with_message("Password must be at least 8 characters".into()));
    }
    if password.len() > PASSWORD_MAX_BYTES {
        return Err(ValidationError::new("password_length")
            .with_message("Password must be at most 72 bytes".into()));
    }
    if !UPPERCASE_REGEX.is_match(password) {
        return Err(ValidationError::new("password_uppercase")
            .with_message("Password must contain an upper case letter".into()));
    }
    if !LOWERCASE_REGEX.is_match(password) {
        return Err(ValidationError::new("password_lowercase")
            .with_message("Password must contain a lower case letter".into()));
    }
    if !DIGIT_REGEX.is_match(password) {
        return Err(ValidationError::new("password_digit")
            .with_message("Password must contain a digit".into()));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_REGEX.is_match(phone.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Invalid phone number".into()))
    }
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message("Value must not be blank".into()))
    } else {
        Ok(())
    }
}
