//! Per-user preferences: default inbox view, timezone, quiet hours and the
//! master push mute.

mod service;
mod types;

pub use service::PreferencesService;
pub use types::{parse_time_of_day, InboxView, PreferencesPatch, UserPreferences};
