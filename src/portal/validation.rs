//! Client-side checks run before a request is sent.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Mexican RFC: 3 letters (legal entity) or 4 (individual), YYMMDD, 3-char homoclave
    static ref RFC_REGEX: Regex = Regex::new(r"^[A-ZÑ&]{3,4}[0-9]{6}[A-Z0-9]{3}$").unwrap();

    /// Loose email shape check; the backend owns the real validation
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(format!("Invalid email address: {}", email));
    }
    Ok(())
}

/// Expects an already upper-cased RFC.
pub fn validate_rfc(rfc: &str) -> Result<(), String> {
    if rfc.is_empty() {
        return Err("RFC is required".to_string());
    }
    if !RFC_REGEX.is_match(rfc) {
        return Err(format!(
            "Invalid RFC '{}': expected 3-4 letters, 6 digits and a 3-character homoclave",
            rfc
        ));
    }
    Ok(())
}

/// Dates sent to the backend use `YYYY-MM-DD`.
pub fn validate_date(field: &str, value: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| format!("{} must be a date in YYYY-MM-DD form, got '{}'", field, value))
}

pub fn validate_required(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(())
}
