//! Callback registry

use crate::callbacks::BatchCallback;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type CallbackFactory = Arc<dyn Fn() -> Arc<dyn BatchCallback> + Send + Sync>;

/// Thread-safe mapping from callback name to factory
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct CallbackRegistry {
    factories: Arc<RwLock<HashMap<String, CallbackFactory>>>,
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `C`, instantiated through `Default` on every resolve
    pub fn register<C>(&self, name: impl Into<String>)
    where
        C: BatchCallback + Default + 'static,
    {
        self.register_factory(name, || Arc::new(C::default()) as Arc<dyn BatchCallback>);
    }

    /// Register a custom factory
    pub fn register_factory<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn BatchCallback> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(callback = %name, "Registering batch callback");
        self.factories.write().insert(name, Arc::new(factory));
    }

    /// Register a shared instance returned by every resolve
    pub fn register_instance(&self, name: impl Into<String>, callback: Arc<dyn BatchCallback>) {
        self.register_factory(name, move || callback.clone());
    }

    /// Instantiate the callback registered under `name`
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn BatchCallback>> {
        let factory = self.factories.read().get(name).cloned()?;
        Some(factory())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.factories.write().remove(name).is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}
