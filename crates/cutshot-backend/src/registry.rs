//! Backend registry: explicit (provider, backend) → adapter factory.

use std::collections::HashMap;
use std::sync::Arc;

use cutshot_core::{BackendId, Error, Result};
use parking_lot::RwLock;
use tracing::debug;

use crate::adapter::BackendAdapter;

/// Builds a fresh adapter for one execution unit.
pub type AdapterFactory = Arc<dyn Fn(&BackendId) -> Result<Box<dyn BackendAdapter>> + Send + Sync>;

/// Registered adapter factories.
///
/// Exact (provider, backend) registrations take precedence over
/// provider-wide ones. Provider-wide factories receive the full id and may
/// still reject a backend name with [`Error::UnsupportedBackend`].
#[derive(Default)]
pub struct BackendRegistry {
    exact: RwLock<HashMap<BackendId, AdapterFactory>>,
    providers: RwLock<HashMap<String, AdapterFactory>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for one (provider, backend) pair.
    pub fn register<F>(&self, id: BackendId, factory: F)
    where
        F: Fn(&BackendId) -> Result<Box<dyn BackendAdapter>> + Send + Sync + 'static,
    {
        debug!("Registered backend {}", id);
        self.exact.write().insert(id, Arc::new(factory));
    }

    /// Register a factory for every backend of `provider`.
    pub fn register_provider<F>(&self, provider: &str, factory: F)
    where
        F: Fn(&BackendId) -> Result<Box<dyn BackendAdapter>> + Send + Sync + 'static,
    {
        debug!("Registered provider {}", provider);
        self.providers
            .write()
            .insert(provider.to_string(), Arc::new(factory));
    }

    /// Look up the factory for `id` without building an adapter.
    pub fn resolve(&self, id: &BackendId) -> Result<AdapterFactory> {
        if let Some(factory) = self.exact.read().get(id) {
            return Ok(factory.clone());
        }
        if let Some(factory) = self.providers.read().get(&id.provider) {
            return Ok(factory.clone());
        }
        Err(Error::UnsupportedBackend {
            provider: id.provider.clone(),
            backend: id.backend.clone(),
        })
    }

    /// Resolve every id up front; the first unsupported pair fails the lot.
    pub fn resolve_all<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a BackendId>,
    ) -> Result<Vec<(BackendId, AdapterFactory)>> {
        ids.into_iter()
            .map(|id| self.resolve(id).map(|f| (id.clone(), f)))
            .collect()
    }

    /// Build a new adapter for `id`.
    pub fn create(&self, id: &BackendId) -> Result<Box<dyn BackendAdapter>> {
        let factory = self.resolve(id)?;
        factory(id)
    }

    pub fn supports(&self, id: &BackendId) -> bool {
        self.resolve(id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FixedCountsBackend;
    use crate::adapter::BitOrder;

    fn fixed(_: &BackendId) -> Result<Box<dyn BackendAdapter>> {
        Ok(Box::new(FixedCountsBackend::new(BitOrder::BigEndian)))
    }

    #[test]
    fn test_unsupported_backend() {
        let registry = BackendRegistry::new();
        registry.register(BackendId::new("aer", "perfect"), fixed);

        assert!(registry.supports(&BackendId::new("aer", "perfect")));
        let err = registry.create(&BackendId::new("aer", "noisy")).err().unwrap();
        match err {
            Error::UnsupportedBackend { provider, backend } => {
                assert_eq!(provider, "aer");
                assert_eq!(backend, "noisy");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_provider_wide_factory() {
        let registry = BackendRegistry::new();
        registry.register_provider("aer", |id: &BackendId| {
            if id.backend.starts_with("fake") {
                Ok(Box::new(FixedCountsBackend::new(BitOrder::LittleEndian)) as Box<dyn BackendAdapter>)
            } else {
                Err(Error::UnsupportedBackend {
                    provider: id.provider.clone(),
                    backend: id.backend.clone(),
                })
            }
        });

        let adapter = registry.create(&BackendId::new("aer", "fake_lima")).unwrap();
        assert_eq!(adapter.bit_order(), BitOrder::LittleEndian);
        assert!(registry.create(&BackendId::new("aer", "real")).is_err());
        assert!(!registry.supports(&BackendId::new("ibm", "x")));
    }

    #[test]
    fn test_resolve_all_fails_on_first_unsupported() {
        let registry = BackendRegistry::new();
        registry.register(BackendId::new("p", "a"), fixed);
        let ids = vec![BackendId::new("p", "a"), BackendId::new("p", "b")];
        assert!(registry.resolve_all(&ids).is_err());
        assert_eq!(registry.resolve_all(&ids[..1]).unwrap().len(), 1);
    }
}
