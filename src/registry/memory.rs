//! In-memory registry
//!
//! Holds named operations, optionally backed by async handlers, and for items
//! a list of URI templates. A name registered without a handler executes to
//! `Value::Null`.

use super::{Registry, UriTemplate};
use crate::state_machine::Kind;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;
type NoHandler = fn(Value) -> futures::future::Ready<anyhow::Result<Value>>;

struct TemplateEntry {
    template: UriTemplate,
    handler: Option<Handler>,
}

/// In-process registry for one kind of operation
pub struct MemoryRegistry {
    kind: Kind,
    entries: IndexMap<String, Option<Handler>>,
    templates: Vec<TemplateEntry>,
}

impl MemoryRegistry {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
            templates: Vec::new(),
        }
    }

    /// Registry of handler-less names; duplicates collapse
    pub fn with_names<I, S>(kind: Kind, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::new(kind);
        for name in names {
            registry.entries.entry(name.into()).or_insert(None);
        }
        registry
    }

    /// Register a name without a handler
    pub fn add_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.insert(name.into(), None)
    }

    /// Register a name backed by an async handler
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.insert(name.into(), Some(Arc::new(move |args: Value| handler(args).boxed())))
    }

    /// Register an item URI template; captured parameters are merged into the
    /// handler's arguments
    pub fn add_template<F, Fut>(&mut self, pattern: &str, handler: Option<F>) -> Result<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        if self.kind != Kind::Item {
            crate::bail!("URI templates are only supported for items, not {}", self.kind);
        }
        if self.templates().any(|t| t.pattern() == pattern) {
            crate::bail!("URI template '{pattern}' already registered");
        }
        let template = UriTemplate::parse(pattern)?;
        tracing::debug!(
            "Registered {} template '{}' with parameters {:?}",
            self.kind,
            pattern,
            template.params()
        );
        let handler: Option<Handler> =
            handler.map(|h| Arc::new(move |args: Value| h(args).boxed()) as Handler);
        self.templates.push(TemplateEntry { template, handler });
        Ok(())
    }

    /// Register an item URI template without a handler
    pub fn add_pattern(&mut self, pattern: &str) -> Result<()> {
        self.add_template(pattern, None::<NoHandler>)
    }

    pub fn templates(&self) -> impl Iterator<Item = &UriTemplate> {
        self.templates.iter().map(|t| &t.template)
    }

    fn insert(&mut self, name: String, handler: Option<Handler>) -> Result<()> {
        if self.entries.contains_key(&name) {
            return Err(Error::custom(format!("{} '{}' already registered", self.kind, name)));
        }
        tracing::debug!("Registered {} '{}'", self.kind, name);
        self.entries.insert(name, handler);
        Ok(())
    }

    fn match_template(&self, ident: &str) -> Option<(&TemplateEntry, Map<String, Value>)> {
        self.templates.iter().find_map(|entry| {
            entry.template.matches(ident).map(|params| {
                let params = params
                    .into_iter()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                (entry, params)
            })
        })
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn exists(&self, ident: &str) -> bool {
        self.entries.contains_key(ident) || self.match_template(ident).is_some()
    }

    fn list_all(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    async fn execute(&self, ident: &str, args: Value) -> anyhow::Result<Value> {
        if let Some(entry) = self.entries.get(ident) {
            return match entry {
                Some(handler) => handler(args).await,
                None => Ok(Value::Null),
            };
        }

        let (entry, params) = self
            .match_template(ident)
            .ok_or_else(|| anyhow::anyhow!("{} '{}' not found", self.kind, ident))?;
        let Some(handler) = &entry.handler else {
            return Ok(Value::Null);
        };

        let args = match args {
            Value::Object(mut map) => {
                for (k, v) in params {
                    map.entry(k).or_insert(v);
                }
                Value::Object(map)
            }
            Value::Null => Value::Object(params),
            other => anyhow::bail!(
                "arguments for templated {} '{}' must be an object, got {}",
                self.kind,
                ident,
                other
            ),
        };
        handler(args).await
    }
}
