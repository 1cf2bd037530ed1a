use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::NodeError;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
static E164_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email regex is valid")
    })
}

fn e164_regex() -> &'static Regex {
    E164_REGEX.get_or_init(|| Regex::new(r"^\+[1-9]\d{1,14}$").expect("E.164 regex is valid"))
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.trim().is_empty() {
        return Err(NodeError::validation("Email cannot be empty").into());
    }
    if email.len() > 255 {
        return Err(NodeError::validation("Email is too long (max 255 characters)").into());
    }
    if !email_regex().is_match(email) {
        return Err(NodeError::validation(format!("Invalid email format: {}", email)).into());
    }
    Ok(())
}

/// Chatwoot only accepts phone numbers in E.164 form: `+` followed by up to
/// 15 digits, no leading zero.
pub fn validate_phone_number(phone: &str) -> Result<()> {
    if phone.trim().is_empty() {
        return Err(NodeError::validation("Phone number cannot be empty").into());
    }
    if !e164_regex().is_match(phone) {
        return Err(NodeError::validation(format!(
            "Invalid phone number '{}': expected E.164 format such as +5511999999999",
            phone
        ))
        .into());
    }
    Ok(())
}
