//! Email address validation

use regex::Regex;
use std::sync::OnceLock;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid")
    })
}

/// Format check only; the server has the final say
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email_pattern().is_match(&email.to_lowercase())
}
