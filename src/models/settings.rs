use serde_json::{Map, Value, json};

pub const SECTIONS: [&str; 5] = [
    "notifications",
    "privacy",
    "preferences",
    "availability",
    "marketplace",
];

pub fn default_settings() -> Value {
    let weekday = json!({ "available": true, "startTime": "09:00", "endTime": "17:00" });
    let weekend = json!({ "available": false, "startTime": "09:00", "endTime": "17:00" });

    json!({
        "notifications": {
            "email": {
                "sessionReminders": true,
                "exchangeUpdates": true,
                "newMessages": true,
                "reviewReceived": true,
                "marketingEmails": false
            },
            "push": {
                "sessionReminders": true,
                "exchangeUpdates": true,
                "newMessages": true,
                "reviewReceived": true
            },
            "inApp": {
                "sessionReminders": true,
                "exchangeUpdates": true,
                "newMessages": true,
                "reviewReceived": true,
                "systemAnnouncements": true
            }
        },
        "privacy": {
            // public | members | private
            "profileVisibility": "public",
            "showEmail": false,
            "showLocation": true,
            "showOnlineStatus": true,
            "allowDirectMessages": true
        },
        "preferences": {
            "language": "en",
            "timezone": "UTC",
            "theme": "system",
            "currency": "USD",
            "timeFormat": "12h",
            "dateFormat": "MM/DD/YYYY"
        },
        "availability": {
            "monday": weekday.clone(),
            "tuesday": weekday.clone(),
            "wednesday": weekday.clone(),
            "thursday": weekday.clone(),
            "friday": weekday,
            "saturday": weekend.clone(),
            "sunday": weekend
        },
        "marketplace": {
            "autoAcceptExchanges": false,
            "showUnavailableSlots": false,
            "requireApprovalForBookings": true,
            "defaultSessionDuration": 60,
            "maxAdvanceBooking": 30,
            "minNoticeRequired": 24
        }
    })
}

pub fn default_section(section: &str) -> Option<Value> {
    if !SECTIONS.contains(&section) {
        return None;
    }
    default_settings().get(section).cloned()
}

/// Keeps only the known top-level sections of an update payload.
pub fn known_sections(updates: &Map<String, Value>) -> Map<String, Value> {
    updates
        .iter()
        .filter(|(key, _)| SECTIONS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Shallow merge: a stored section replaces the default section wholesale.
pub fn merge_with_defaults(stored: Option<&Map<String, Value>>) -> Value {
    let mut settings = default_settings();
    if let (Some(stored), Some(target)) = (stored, settings.as_object_mut()) {
        for (key, value) in known_sections(stored) {
            target.insert(key, value);
        }
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let defaults = default_settings();
        for section in SECTIONS {
            assert!(defaults.get(section).is_some(), "{section}");
        }
        assert_eq!(defaults["availability"]["sunday"]["available"], false);
        assert_eq!(defaults["marketplace"]["defaultSessionDuration"], 60);
    }

    #[test]
    fn unknown_sections_are_dropped() {
        let updates = json!({
            "privacy": { "showEmail": true },
            "billing": { "plan": "pro" },
            "userId": "abc"
        });
        let kept = known_sections(updates.as_object().unwrap());

        assert_eq!(kept.len(), 1);
        assert_eq!(kept["privacy"]["showEmail"], true);
    }

    #[test]
    fn stored_sections_replace_defaults_shallowly() {
        let stored = json!({ "preferences": { "theme": "dark" }, "updatedAt": "x" });
        let merged = merge_with_defaults(stored.as_object());

        assert_eq!(merged["preferences"], json!({ "theme": "dark" }));
        assert_eq!(merged["privacy"]["profileVisibility"], "public");
        assert!(merged.get("updatedAt").is_none());
    }

    #[test]
    fn no_stored_settings_yields_defaults() {
        assert_eq!(merge_with_defaults(None), default_settings());
    }

    #[test]
    fn section_defaults() {
        assert_eq!(default_section("privacy").unwrap()["showEmail"], false);
        assert!(default_section("billing").is_none());
    }
}
