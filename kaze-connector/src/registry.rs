//! Provider name to connector lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use kaze_catalog::{Provider, UnknownProvider};

use crate::client::HttpConfig;
use crate::comick::ComickConnector;
use crate::connector::Connector;
use crate::error::ProviderError;
use crate::mangadex::MangaDexConnector;

/// Maps each supported provider to its connector.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: BTreeMap<Provider, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// An empty registry. Mostly useful for tests that register fakes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a live connector for every supported provider.
    pub fn with_defaults(config: &HttpConfig) -> Result<Self, ProviderError> {
        let mut registry = Self::new();
        registry.register(Arc::new(MangaDexConnector::new(config)?));
        registry.register(Arc::new(ComickConnector::new(config)?));
        Ok(registry)
    }

    /// Register a connector under the provider it reports, replacing any
    /// previous one.
    pub fn register(&mut self, connector: Arc<dyn Connector>) {
        self.connectors.insert(connector.provider(), connector);
    }

    /// Look up the connector for a provider.
    pub fn get(&self, provider: Provider) -> Result<Arc<dyn Connector>, UnknownProvider> {
        self.connectors
            .get(&provider)
            .cloned()
            .ok_or_else(|| UnknownProvider(provider.as_str().to_string()))
    }

    /// Look up a connector by provider name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Connector>, UnknownProvider> {
        let provider: Provider = name.parse()?;
        self.get(provider)
    }

    /// Providers with a registered connector.
    pub fn providers(&self) -> Vec<Provider> {
        self.connectors.keys().copied().collect()
    }
}
