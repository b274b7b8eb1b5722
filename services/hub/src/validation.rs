//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Lowest and highest accepted rating score
pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 5;

/// Longest accepted title, subject or tag, in characters
const MAX_SHORT_TEXT: usize = 200;
/// Longest accepted description or feedback, in characters
const MAX_LONG_TEXT: usize = 5_000;

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

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Validate a rating score
pub fn validate_score(score: i64) -> Result<(), String> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(format!(
            "Rating must be an integer between {} and {}, got {}",
            MIN_SCORE, MAX_SCORE, score
        ));
    }

    Ok(())
}

/// Validate a required single-line field such as a title or subject
pub fn validate_required(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }

    if value.chars().count() > MAX_SHORT_TEXT {
        return Err(format!(
            "{} must be at most {} characters long",
            field, MAX_SHORT_TEXT
        ));
    }

    Ok(())
}

/// Validate free text such as a description or rating feedback
pub fn validate_text(field: &str, value: &str) -> Result<(), String> {
    if value.chars().count() > MAX_LONG_TEXT {
        return Err(format!(
            "{} must be at most {} characters long",
            field, MAX_LONG_TEXT
        ));
    }

    Ok(())
}

/// Validate a single tag
pub fn validate_tag(tag: &str) -> Result<(), String> {
    if tag.chars().count() > MAX_SHORT_TEXT {
        return Err(format!(
            "Tag '{}' must be at most {} characters long",
            tag, MAX_SHORT_TEXT
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_email_rules() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("correct horse").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_score_bounds() {
        for score in 1..=5 {
            assert!(validate_score(score).is_ok());
        }
        assert!(validate_score(0).is_err());
        assert!(validate_score(6).is_err());
        assert!(validate_score(-3).is_err());
    }

    #[test]
    fn test_required_fields() {
        assert!(validate_required("Title", "Linear Algebra notes").is_ok());
        assert!(validate_required("Title", "   ").is_err());
        assert!(validate_required("Title", &"t".repeat(201)).is_err());
        assert!(validate_text("Description", "").is_ok());
    }
}
