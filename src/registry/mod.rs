//! Registry module - Abstraction over the stores that hold gated operations
//!
//! The automaton never executes anything itself. It asks each registry
//! whether an identifier exists (validation, discovery) and the gate asks it
//! to execute the operation inside a transition scope.

use crate::state_machine::Kind;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub mod memory;
pub mod template;

pub use memory::MemoryRegistry;
pub use template::UriTemplate;

/// Store of one kind of operation
///
/// Implementations provide different backends:
/// - `MemoryRegistry`: in-process names, handlers, and item URI templates
#[async_trait]
pub trait Registry: Send + Sync {
    /// Kind of operation this registry holds
    fn kind(&self) -> Kind;

    /// Whether `ident` names an operation; item registries also match URI templates
    fn exists(&self, ident: &str) -> bool;

    /// Concrete identifiers currently registered
    fn list_all(&self) -> Vec<String>;

    /// Execute the operation
    async fn execute(&self, ident: &str, args: Value) -> anyhow::Result<Value>;
}

/// One registry per kind
#[derive(Clone)]
pub struct Registries {
    pub actions: Arc<dyn Registry>,
    pub items: Arc<dyn Registry>,
    pub templates: Arc<dyn Registry>,
}

impl Registries {
    pub fn new(
        actions: Arc<dyn Registry>,
        items: Arc<dyn Registry>,
        templates: Arc<dyn Registry>,
    ) -> Self {
        Self {
            actions,
            items,
            templates,
        }
    }

    /// Registries that know nothing; every reference fails validation
    pub fn empty() -> Self {
        Self::new(
            Arc::new(MemoryRegistry::new(Kind::Action)),
            Arc::new(MemoryRegistry::new(Kind::Item)),
            Arc::new(MemoryRegistry::new(Kind::Template)),
        )
    }

    pub fn get(&self, kind: Kind) -> &dyn Registry {
        match kind {
            Kind::Action => self.actions.as_ref(),
            Kind::Item => self.items.as_ref(),
            Kind::Template => self.templates.as_ref(),
        }
    }

    pub fn exists(&self, kind: Kind, ident: &str) -> bool {
        self.get(kind).exists(ident)
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries")
            .field("actions", &self.actions.list_all())
            .field("items", &self.items.list_all())
            .field("templates", &self.templates.list_all())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_by_kind() {
        let registries = Registries::new(
            Arc::new(MemoryRegistry::with_names(Kind::Action, ["login"])),
            Arc::new(MemoryRegistry::with_names(Kind::Item, ["file:///readme"])),
            Arc::new(MemoryRegistry::with_names(Kind::Template, ["greeting"])),
        );

        assert!(registries.exists(Kind::Action, "login"));
        assert!(!registries.exists(Kind::Item, "login"));
        assert!(registries.exists(Kind::Item, "file:///readme"));
        assert!(registries.exists(Kind::Template, "greeting"));
        for kind in Kind::ALL {
            assert_eq!(registries.get(kind).kind(), kind);
        }
    }

    #[test]
    fn test_empty_knows_nothing() {
        let registries = Registries::empty();
        for kind in Kind::ALL {
            assert!(registries.get(kind).list_all().is_empty());
        }
    }
}
