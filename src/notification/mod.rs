//! Canonical notification model shared by ingestion, storage and push.

mod provider;
mod types;

pub use provider::{Provider, UnknownProvider};
pub use types::{
    Context, FlagUpdate, NewNotification, NormalizedNotification, Notification, Priority,
};
