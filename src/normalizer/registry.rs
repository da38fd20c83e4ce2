use crate::notification::{NormalizedNotification, Provider};

use super::{
    AzureDevopsNormalizer, ConfluenceNormalizer, CustomNormalizer, EmailNormalizer,
    GcpNormalizer, JiraNormalizer, NormalizeError, Normalizer, UpdownNormalizer,
    VercelNormalizer,
};

/// Lookup from provider to its normalizer, built once at startup.
pub struct NormalizerRegistry {
    /// Indexed by `Provider::index`
    normalizers: Vec<Box<dyn Normalizer>>,
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalizer_for(provider: Provider) -> Box<dyn Normalizer> {
    match provider {
        Provider::Updown => Box::new(UpdownNormalizer),
        Provider::AzureDevops => Box::new(AzureDevopsNormalizer),
        Provider::Gcp => Box::new(GcpNormalizer),
        Provider::Vercel => Box::new(VercelNormalizer),
        Provider::Custom => Box::new(CustomNormalizer),
        Provider::Jira => Box::new(JiraNormalizer),
        Provider::Confluence => Box::new(ConfluenceNormalizer),
        Provider::Email => Box::new(EmailNormalizer),
    }
}

impl NormalizerRegistry {
    pub fn new() -> Self {
        Self {
            normalizers: Provider::ALL.iter().copied().map(normalizer_for).collect(),
        }
    }

    /// Normalizer for a provider. Total over [`Provider`].
    pub fn resolve(&self, provider: Provider) -> &dyn Normalizer {
        self.normalizers[provider.index()].as_ref()
    }

    /// Supported providers, in listing order.
    pub fn providers(&self) -> &'static [Provider] {
        &Provider::ALL
    }

    pub fn normalize(
        &self,
        provider: Provider,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        self.resolve(provider).normalize(payload)
    }
}
