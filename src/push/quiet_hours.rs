//! Quiet-hours evaluation in the user's own timezone.

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::preferences::{parse_time_of_day, UserPreferences};

/// Whether quiet hours are active for `prefs` right now.
pub fn is_quiet(prefs: &UserPreferences) -> bool {
    is_quiet_at(prefs, Utc::now())
}

/// Whether quiet hours are active for `prefs` at instant `now`.
///
/// Compares local time of day at minute resolution against the half-open
/// window `[start, end)`. A window with `start > end` wraps past midnight.
/// Unset or unparseable bounds mean never quiet.
pub fn is_quiet_at(prefs: &UserPreferences, now: DateTime<Utc>) -> bool {
    let (start, end) = match (
        prefs.quiet_hours_start.as_deref().and_then(parse_time_of_day),
        prefs.quiet_hours_end.as_deref().and_then(parse_time_of_day),
    ) {
        (Some(start), Some(end)) => (start, end),
        _ => return false,
    };

    let local = local_minute(&prefs.timezone, now);
    in_window(local, start, end)
}

fn local_minute(timezone: &str, now: DateTime<Utc>) -> NaiveTime {
    let tz: Tz = timezone.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone = %timezone, "Unknown timezone in preferences, using UTC");
        Tz::UTC
    });
    let local = now.with_timezone(&tz);
    NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or(NaiveTime::MIN)
}

fn in_window(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= now && now < end
    } else {
        now >= start || now < end
    }
}
