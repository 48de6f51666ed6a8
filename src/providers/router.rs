//! Model-to-provider routing.
//!
//! A [`RoutingTable`] is built once from provider declarations: every
//! declared model string maps to exactly one provider handle, and a
//! model declared by two providers is a configuration error caught at
//! build time, not per request. Tables are immutable after build;
//! [`ProviderRouter`] publishes them as atomically swappable snapshots
//! so a reload never disturbs in-flight requests, which keep resolving
//! against the snapshot captured when their pipeline started.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::traits::ChatProvider;
use crate::{GrimnirError, Result};

/// One provider and the models it serves.
pub struct ProviderRegistration {
    pub provider: Arc<dyn ChatProvider>,
    pub models: Vec<String>,
}

impl ProviderRegistration {
    pub fn new(provider: Arc<dyn ChatProvider>, models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            provider,
            models: models.into_iter().map(Into::into).collect(),
        }
    }
}

/// Immutable model → provider mapping.
pub struct RoutingTable {
    routes: HashMap<String, Arc<dyn ChatProvider>>,
}

impl RoutingTable {
    /// Build a table, rejecting duplicate model declarations.
    pub fn build(registrations: Vec<ProviderRegistration>) -> Result<Self> {
        let mut routes: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        for registration in registrations {
            for model in registration.models {
                if let Some(existing) = routes.get(&model) {
                    return Err(GrimnirError::Configuration(format!(
                        "model '{model}' declared by both '{}' and '{}'",
                        existing.name(),
                        registration.provider.name(),
                    )));
                }
                routes.insert(model, Arc::clone(&registration.provider));
            }
        }
        Ok(Self { routes })
    }

    /// Pure lookup: no I/O, no retry.
    pub fn resolve(&self, model: &str) -> Result<Arc<dyn ChatProvider>> {
        self.routes
            .get(model)
            .cloned()
            .ok_or_else(|| GrimnirError::ModelNotFound(model.to_string()))
    }

    /// Number of routable models.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Atomically swappable routing snapshots.
pub struct ProviderRouter {
    table: ArcSwap<RoutingTable>,
}

impl ProviderRouter {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: ArcSwap::from_pointee(table),
        }
    }

    /// Capture the current snapshot. Callers resolve against the
    /// captured snapshot for the lifetime of one request.
    pub fn snapshot(&self) -> Arc<RoutingTable> {
        self.table.load_full()
    }

    /// Publish a new snapshot. In-flight requests are unaffected.
    pub fn reload(&self, table: RoutingTable) {
        self.table.store(Arc::new(table));
    }
}
