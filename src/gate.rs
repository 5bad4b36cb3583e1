//! Gate - State-aware front for the registries
//!
//! Callers only ever see operations the automaton currently allows, and every
//! invocation runs inside a transition scope bound to the caller's session.

use crate::registry::Registries;
use crate::state_machine::{Automaton, Kind, StateName, session};
use crate::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Gate {
    machine: Arc<Automaton>,
    registries: Registries,
}

impl Gate {
    pub fn new(machine: Arc<Automaton>, registries: Registries) -> Self {
        Self {
            machine,
            registries,
        }
    }

    pub fn machine(&self) -> &Automaton {
        &self.machine
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Identifiers of `kind` that are both allowed now and registered
    pub fn list(&self, kind: Kind, session: Option<&str>) -> Result<Vec<String>> {
        session::sync_scope(session.map(str::to_string), || -> Result<Vec<String>> {
            let allowed = self.machine.available_symbols(kind)?;
            let registry = self.registries.get(kind);
            Ok(allowed
                .into_iter()
                .filter(|ident| {
                    let registered = registry.exists(ident);
                    if !registered {
                        tracing::warn!(
                            "{} '{}' is allowed in state '{}' but not registered",
                            kind,
                            ident,
                            self.machine.current_state()
                        );
                    }
                    registered
                })
                .collect())
        })
    }

    pub fn current_state(&self, session: Option<&str>) -> StateName {
        session::sync_scope(session.map(str::to_string), || self.machine.current_state())
    }

    pub fn reset(&self, session: Option<&str>) {
        session::sync_scope(session.map(str::to_string), || self.machine.reset());
    }

    /// Execute `ident` through its registry, recording the outcome
    pub async fn invoke(
        &self,
        kind: Kind,
        ident: &str,
        args: Value,
        session: Option<String>,
    ) -> Result<Value> {
        let registry = self.registries.get(kind);
        self.invoke_with(kind, ident, session, registry.execute(ident, args))
            .await
    }

    /// Gate an operation the caller supplies. The same checks as
    /// [`Gate::invoke`] apply before `op` is polled.
    pub async fn invoke_with<T, E, F>(
        &self,
        kind: Kind,
        ident: &str,
        session: Option<String>,
        op: F,
    ) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        session::scope(session, async {
            let allowed = self.machine.available_symbols(kind)?;
            if !allowed.contains(ident) {
                return Err(Error::NotAllowed {
                    kind,
                    ident: ident.to_string(),
                    state: self.machine.current_state(),
                });
            }
            if !self.registries.exists(kind, ident) {
                return Err(Error::NotRegistered {
                    kind,
                    ident: ident.to_string(),
                });
            }

            tracing::debug!(
                "Invoking {} '{}' in state '{}'",
                kind,
                ident,
                self.machine.current_state()
            );
            self.machine.step(kind, ident).run(op).await
        })
        .await
    }
}
