use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Inbox view a client opens by default; also the `view` filter on listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InboxView {
    #[default]
    All,
    Work,
    Personal,
    Critical,
}

/// Per-user preferences singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub default_view: InboxView,
    /// IANA zone name
    pub timezone: String,
    /// Local `HH:MM`; set together with `quiet_hours_end` or not at all
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
    /// Master mute for everything below critical
    pub push_muted: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_view: InboxView::All,
            timezone: "UTC".to_string(),
            quiet_hours_start: None,
            quiet_hours_end: None,
            push_muted: false,
        }
    }
}

/// Parse a 24-hour `HH:MM` time of day.
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesPatch {
    pub default_view: Option<InboxView>,
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub quiet_hours_start: Option<Option<String>>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub quiet_hours_end: Option<Option<String>>,
    pub push_muted: Option<bool>,
}

impl PreferencesPatch {
    /// Merge onto `current` and validate the result as a whole.
    pub fn merge(&self, current: &UserPreferences) -> Result<UserPreferences, AppError> {
        let mut merged = current.clone();

        if let Some(view) = self.default_view {
            merged.default_view = view;
        }
        if let Some(tz) = &self.timezone {
            if tz.parse::<Tz>().is_err() {
                return Err(AppError::Validation(format!("Unknown timezone: {}", tz)));
            }
            merged.timezone = tz.clone();
        }
        if let Some(start) = &self.quiet_hours_start {
            merged.quiet_hours_start = start.clone();
        }
        if let Some(end) = &self.quiet_hours_end {
            merged.quiet_hours_end = end.clone();
        }
        if let Some(muted) = self.push_muted {
            merged.push_muted = muted;
        }

        for bound in [&merged.quiet_hours_start, &merged.quiet_hours_end]
            .into_iter()
            .flatten()
        {
            if parse_time_of_day(bound).is_none() {
                return Err(AppError::Validation(format!(
                    "Quiet hours must be HH:MM, got {:?}",
                    bound
                )));
            }
        }
        if merged.quiet_hours_start.is_some() != merged.quiet_hours_end.is_some() {
            return Err(AppError::Validation(
                "Quiet hours start and end must both be set or both be null".to_string(),
            ));
        }

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: serde_json::Value) -> PreferencesPatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let prefs = UserPreferences::default();
        assert_eq!(prefs.default_view, InboxView::All);
        assert_eq!(prefs.timezone, "UTC");
        assert!(prefs.quiet_hours_start.is_none());
        assert!(!prefs.push_muted);
    }

    #[test]
    fn test_partial_merge_keeps_other_fields() {
        let current = UserPreferences {
            timezone: "Europe/Berlin".to_string(),
            ..Default::default()
        };
        let merged = patch(json!({"pushMuted": true})).merge(&current).unwrap();
        assert!(merged.push_muted);
        assert_eq!(merged.timezone, "Europe/Berlin");
    }

    #[test]
    fn test_sets_and_clears_quiet_hours() {
        let set = patch(json!({"quietHoursStart": "22:00", "quietHoursEnd": "07:00"}))
            .merge(&UserPreferences::default())
            .unwrap();
        assert_eq!(set.quiet_hours_start.as_deref(), Some("22:00"));

        let cleared = patch(json!({"quietHoursStart": null, "quietHoursEnd": null}))
            .merge(&set)
            .unwrap();
        assert!(cleared.quiet_hours_start.is_none());
        assert!(cleared.quiet_hours_end.is_none());
    }

    #[test]
    fn test_rejects_half_window() {
        let err = patch(json!({"quietHoursStart": "22:00"}))
            .merge(&UserPreferences::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_rejects_bad_time_and_zone() {
        let defaults = UserPreferences::default();
        assert!(patch(json!({"quietHoursStart": "25:00", "quietHoursEnd": "07:00"}))
            .merge(&defaults)
            .is_err());
        assert!(patch(json!({"quietHoursStart": "10pm", "quietHoursEnd": "07:00"}))
            .merge(&defaults)
            .is_err());
        assert!(patch(json!({"timezone": "Mars/Olympus"})).merge(&defaults).is_err());
        assert!(patch(json!({"timezone": "America/New_York"})).merge(&defaults).is_ok());
    }

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(parse_time_of_day("07:30"), NaiveTime::from_hms_opt(7, 30, 0));
        assert!(parse_time_of_day("24:00").is_none());
        assert!(parse_time_of_day("").is_none());
    }
}
