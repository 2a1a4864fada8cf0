use mongodb::bson::DateTime;
use regex::Regex;
use std::sync::OnceLock;
use validator::ValidationErrors;

pub fn validate_email(email: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    })
    .is_match(email)
}

/// Flattens validator output into one readable line, fields sorted.
pub fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            errs.iter()
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| format!("{} is invalid", field))
        })
        .collect();
    parts.sort();

    if parts.is_empty() {
        "Invalid request".to_string()
    } else {
        parts.join("; ")
    }
}

/// Parses an RFC 3339 timestamp into a BSON datetime.
pub fn parse_timestamp(raw: &str) -> Option<DateTime> {
    chrono::DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| DateTime::from_millis(dt.timestamp_millis()))
}

pub fn to_rfc3339(dt: DateTime) -> String {
    chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Treats empty and whitespace-only strings as missing.
pub fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_format() {
        assert!(validate_email("ada@skillmint.io"));
        assert!(validate_email("first.last+tag@mail.example.org"));
        assert!(!validate_email("ada@skillmint"));
        assert!(!validate_email("not an email"));
    }

    #[test]
    fn timestamps_round_trip_through_rfc3339() {
        let parsed = parse_timestamp("2030-05-01T10:30:00Z").unwrap();
        assert_eq!(to_rfc3339(parsed), "2030-05-01T10:30:00.000Z");

        let offset = parse_timestamp("2030-05-01T12:30:00+02:00").unwrap();
        assert_eq!(offset, parsed);

        assert!(parse_timestamp("tomorrow at noon").is_none());
    }

    #[test]
    fn blank_strings_are_missing() {
        assert_eq!(non_blank(&Some("  design ".to_string())), Some("design"));
        assert_eq!(non_blank(&Some("   ".to_string())), None);
        assert_eq!(non_blank(&None), None);
    }
}
