//! Declarative automaton definitions
//!
//! A TOML file that declares states, their bindings, and the names each
//! registry knows. Used by the CLI to check, draw, and simulate automata
//! without writing Rust.
//!
//! ```toml
//! [registry]
//! actions = ["login", "logout"]
//! item_templates = ["docs://{page}"]
//!
//! [[states]]
//! name = "start"
//! initial = true
//!
//! [[states.bindings]]
//! kind = "action"
//! name = "login"
//! on_success = { to = "home" }
//! on_error = { to = "start", note = "login failed" }
//! ```

use crate::registry::{MemoryRegistry, Registries};
use crate::state_machine::{Definition, Effect, Kind, Outcome, Target};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomatonDefinition {
    #[serde(default)]
    pub registry: RegistryDef,

    #[serde(default)]
    pub states: Vec<StateDef>,
}

/// Names known to each registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDef {
    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default)]
    pub items: Vec<String>,

    /// URI templates such as `users://{id}/profile`
    #[serde(default)]
    pub item_templates: Vec<String>,

    #[serde(default)]
    pub templates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDef {
    pub name: String,

    #[serde(default)]
    pub initial: bool,

    #[serde(default)]
    pub bindings: Vec<BindingDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDef {
    pub kind: Kind,
    pub name: String,
    pub on_success: Option<TargetDef>,
    pub on_error: Option<TargetDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDef {
    pub to: String,

    #[serde(default)]
    pub terminal: bool,

    /// Logged whenever the edge is taken
    pub note: Option<String>,
}

impl AutomatonDefinition {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Definition {
            file: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// In-memory registries holding the declared names, without handlers
    pub fn registries(&self) -> Result<Registries> {
        let registry = &self.registry;
        let actions = MemoryRegistry::with_names(Kind::Action, registry.actions.iter().cloned());
        let mut items = MemoryRegistry::with_names(Kind::Item, registry.items.iter().cloned());
        for pattern in &registry.item_templates {
            items.add_pattern(pattern)?;
        }
        let templates =
            MemoryRegistry::with_names(Kind::Template, registry.templates.iter().cloned());

        Ok(Registries::new(
            Arc::new(actions),
            Arc::new(items),
            Arc::new(templates),
        ))
    }

    /// Replay the declarations onto a fluent definition
    pub fn definition(&self, registries: Registries) -> Definition {
        let mut def = Definition::new(registries);
        for state in &self.states {
            let mut scope = if state.initial {
                def.initial_state(&state.name)
            } else {
                def.state(&state.name)
            };

            for binding in &state.bindings {
                let mut bound = scope.on(binding.kind, &binding.name);
                for (outcome, target) in [
                    (Outcome::Success, &binding.on_success),
                    (Outcome::Error, &binding.on_error),
                ] {
                    if let Some(target) = target {
                        bound = bound.outcome(outcome, target.to_target());
                    }
                }
                scope = bound.done();
            }
        }
        def
    }
}

impl TargetDef {
    fn to_target(&self) -> Target {
        let mut target = Target::to(self.to.as_str());
        if self.terminal {
            target = target.terminal();
        }
        if let Some(note) = &self.note {
            target = target.with_effect(Effect::note(note.clone()));
        }
        target
    }
}

/// Resolve a definition path relative to `base` when it is not absolute
pub fn resolve_path(base: Option<&Path>, path: &Path) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}
