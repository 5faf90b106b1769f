/// Lookup key for a dictionary term. Terms are stored lower-cased and trimmed.
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

pub fn word_key(term: &str) -> String {
    normalize_term(term)
}

/// Subject labels are matched case-insensitively.
pub fn subject_key(subject: &str) -> String {
    subject.trim().to_lowercase()
}

pub fn word_of_day_key(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn user_key(user_id: &str) -> String {
    user_id.to_string()
}

pub fn user_email_index_key(email: &str) -> String {
    format!("email:{}", email.trim().to_lowercase())
}
