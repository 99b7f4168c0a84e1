//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Minimum password length accepted at registration and password change
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

/// Validate password length
pub fn validate_password(password: &str) -> Result<(), String> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }

    if length > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Validate a catalogue name (equipment, group), returning it trimmed
pub fn validate_name<'a>(kind: &str, name: &'a str) -> Result<&'a str, String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(format!("{kind} name is required"));
    }

    if name.chars().count() > 100 {
        return Err(format!("{kind} name must be at most 100 characters long"));
    }

    Ok(name)
}
