//! Input validation shared by auth and word routes.

use std::collections::HashSet;

use crate::constants::MIN_PASSWORD_LENGTH;
use crate::store::keys::normalize_term;

const MAX_TERM_CHARS: usize = 64;

/// 验证密码强度：至少 8 字符、最多 256 字符，需同时包含字母和数字
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err("Password must be at least 8 characters");
    }
    if password.len() > 256 {
        return Err("Password must be at most 256 characters");
    }
    let has_alpha = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_alpha || !has_digit {
        return Err("Password must contain a letter and a digit");
    }
    Ok(())
}

/// 验证邮箱格式：user@domain.tld
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if !local
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'+' || b == b'-')
    {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    if domain.is_empty() || !domain.contains('.') {
        return false;
    }
    if !domain
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
    {
        return false;
    }
    domain
        .split('.')
        .all(|part| !part.is_empty() && !part.starts_with('-') && !part.ends_with('-'))
}

pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let char_count = name.trim().chars().count();
    if char_count == 0 || char_count > 50 {
        return Err("Name must be between 1 and 50 characters");
    }
    Ok(())
}

/// Normalized, non-empty term of bounded length.
pub fn validate_term(raw: &str) -> Result<String, &'static str> {
    let term = normalize_term(raw);
    if term.is_empty() {
        return Err("Word is required");
    }
    if term.chars().count() > MAX_TERM_CHARS {
        return Err("Word is too long");
    }
    if term.chars().any(char::is_control) {
        return Err("Word contains control characters");
    }
    Ok(term)
}

/// Trim, lower-case, drop empties and repeats; first occurrence keeps its position.
pub fn clean_terms<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|t| normalize_term(t.as_ref()))
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn password_rules() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("lettersonly").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("letters123").is_ok());
    }

    #[test]
    fn email_rules() {
        assert!(is_valid_email("a.b+c@example.com"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email(".a@example.com"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a@-bad.com"));
    }

    #[test]
    fn term_rules() {
        assert_eq!(validate_term("  Serendipity ").unwrap(), "serendipity");
        assert!(validate_term("   ").is_err());
        assert!(validate_term(&"x".repeat(65)).is_err());
    }

    #[test]
    fn clean_terms_dedupes_in_order() {
        let cleaned = clean_terms(["Cell", " gene ", "", "CELL", "enzyme"]);
        assert_eq!(cleaned, vec!["cell", "gene", "enzyme"]);
    }

    proptest! {
        #[test]
        fn clean_terms_is_idempotent(raw in proptest::collection::vec("[ a-zA-Z]{0,8}", 0..20)) {
            let once = clean_terms(&raw);
            let twice = clean_terms(&once);
            prop_assert_eq!(&once, &twice);
            for term in &once {
                prop_assert_eq!(term.clone(), term.trim().to_lowercase());
                prop_assert!(!term.is_empty());
            }
        }
    }
}
