use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// External system whose webhook events are ingested.
///
/// The set is closed: adding a provider means adding a normalizer for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// updown.io uptime checks
    Updown,
    /// Azure DevOps service hooks
    AzureDevops,
    /// Google Cloud Monitoring incidents and Pub/Sub pushes
    Gcp,
    /// Vercel deployment webhooks
    Vercel,
    /// Caller-defined payloads
    Custom,
    /// Jira issue and comment events
    Jira,
    /// Confluence page, blog and comment events
    Confluence,
    /// Inbound email relayed as JSON
    Email,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

impl Provider {
    /// Every provider, in the order they are listed to clients.
    pub const ALL: [Provider; 8] = [
        Provider::Updown,
        Provider::AzureDevops,
        Provider::Gcp,
        Provider::Vercel,
        Provider::Custom,
        Provider::Jira,
        Provider::Confluence,
        Provider::Email,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Updown => "updown",
            Provider::AzureDevops => "azure_devops",
            Provider::Gcp => "gcp",
            Provider::Vercel => "vercel",
            Provider::Custom => "custom",
            Provider::Jira => "jira",
            Provider::Confluence => "confluence",
            Provider::Email => "email",
        }
    }

    /// Position of this provider in [`Provider::ALL`].
    pub(crate) fn index(&self) -> usize {
        match self {
            Provider::Updown => 0,
            Provider::AzureDevops => 1,
            Provider::Gcp => 2,
            Provider::Vercel => 3,
            Provider::Custom => 4,
            Provider::Jira => 5,
            Provider::Confluence => 6,
            Provider::Email => 7,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_provider() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>(), Ok(provider));
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "pagerduty".parse::<Provider>().unwrap_err();
        assert_eq!(err, UnknownProvider("pagerduty".to_string()));
        // Case matters on the wire
        assert!("Updown".parse::<Provider>().is_err());
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, provider) in Provider::ALL.iter().enumerate() {
            assert_eq!(provider.index(), i);
        }
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&Provider::AzureDevops).unwrap();
        assert_eq!(json, "\"azure_devops\"");
    }
}
