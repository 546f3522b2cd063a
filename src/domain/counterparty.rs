use std::fmt;

/// Normalize a counterparty contact number into the canonical key used to
/// group ledger entries. Strips formatting characters, keeps a leading "+".
/// Two entries net against each other only when their normalized keys match.
pub fn normalize_contact(raw: &str) -> Result<String, ContactError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ContactError::Empty);
    }

    let mut normalized = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '+' if i == 0 => normalized.push('+'),
            '0'..='9' => normalized.push(c),
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return Err(ContactError::Invalid(raw.to_string())),
        }
    }

    let digits = normalized.chars().filter(char::is_ascii_digit).count();
    // E.164 allows at most 15 digits; anything under 7 is not a phone number
    if !(7..=15).contains(&digits) {
        return Err(ContactError::Invalid(raw.to_string()));
    }

    Ok(normalized)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    Empty,
    Invalid(String),
}

impl fmt::Display for ContactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactError::Empty => write!(f, "contact number is required"),
            ContactError::Invalid(raw) => write!(f, "invalid contact number: {}", raw),
        }
    }
}

impl std::error::Error for ContactError {}
