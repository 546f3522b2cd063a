use std::fmt;

/// Money is represented as integer paise to avoid floating-point precision
/// issues. 1 rupee = 100 paise, so ₹50.00 = 5000 paise. Exact-amount matching
/// in the netting engine relies on this being an integer type.
pub type Paise = i64;

/// Format paise as a rupee string with Indian digit grouping.
/// Example: 12345678 -> "₹1,23,456.78", -5000 -> "-₹50.00"
pub fn format_rupees(paise: Paise) -> String {
    let sign = if paise < 0 { "-" } else { "" };
    let abs = paise.abs();
    format!("{}₹{}.{:02}", sign, group_indian(abs / 100), abs % 100)
}

/// Indian grouping: the last three digits form one group, everything above
/// is grouped in pairs (lakhs and crores). 1234567 -> "12,34,567".
fn group_indian(units: i64) -> String {
    let digits = units.to_string();
    if digits.len() <= 3 {
        return digits;
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (left, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = left;
    }
    groups.push(rest);
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Parse a user-supplied amount into paise.
/// Accepts an optional leading "₹", comma grouping, and up to two decimal
/// places: "1,23,456.78" -> 12345678, "500" -> 50000.
pub fn parse_rupees(input: &str) -> Result<Paise, ParseAmountError> {
    let cleaned: String = input
        .trim()
        .trim_start_matches('₹')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Err(ParseAmountError::InvalidFormat);
    }

    let (units_str, fraction_str) = match cleaned.split_once('.') {
        None => (cleaned.as_str(), ""),
        Some((units, fraction)) => {
            if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
                return Err(ParseAmountError::InvalidFormat);
            }
            (units, fraction)
        }
    };

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?
    };

    let paise_fraction: i64 = match fraction_str.len() {
        0 => 0,
        1 => {
            fraction_str
                .parse::<i64>()
                .map_err(|_| ParseAmountError::InvalidFormat)?
                * 10
        }
        // Truncate anything beyond two decimal places
        _ => fraction_str[..2]
            .parse()
            .map_err(|_| ParseAmountError::InvalidFormat)?,
    };

    Ok(units * 100 + paise_fraction)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
