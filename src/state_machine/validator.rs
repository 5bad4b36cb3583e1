//! Validation and pruning of a completed draft
//!
//! Phases run in order: structural checks, registry availability, reachable
//! terminal proof, then two pruning passes. Every problem is collected; the
//! builder decides whether the errors are fatal.

use crate::registry::Registries;
use crate::state_machine::builder::Draft;
use crate::state_machine::{AutomatonGraph, Kind, StateName};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub level: IssueLevel,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(level: IssueLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(IssueLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(IssueLevel::Warning, message)
    }

    pub fn is_error(&self) -> bool {
        self.level == IssueLevel::Error
    }
}

pub(crate) struct Validator<'a> {
    draft: &'a mut Draft,
    initial: Option<&'a str>,
    registries: &'a Registries,
    issues: Vec<ValidationIssue>,
    available: HashMap<Kind, HashSet<String>>,
}

impl<'a> Validator<'a> {
    pub(crate) fn new(
        draft: &'a mut Draft,
        initial: Option<&'a str>,
        registries: &'a Registries,
    ) -> Self {
        Self {
            draft,
            initial,
            registries,
            issues: Vec::new(),
            available: HashMap::new(),
        }
    }

    pub(crate) fn validate(mut self) -> Vec<ValidationIssue> {
        if !self.check_structure() {
            return self.issues;
        }
        self.check_availability();
        let reachable = self.check_terminal_reachability();
        if !self.issues.iter().any(ValidationIssue::is_error) {
            self.prune_unreachable(&reachable);
            self.prune_after_terminal();
        }
        self.issues
    }

    fn error(&mut self, message: String) {
        self.issues.push(ValidationIssue::error(message));
    }

    fn warning(&mut self, message: String) {
        self.issues.push(ValidationIssue::warning(message));
    }

    /// False when the initial state is unusable and validation cannot go on
    fn check_structure(&mut self) -> bool {
        match self.initial {
            None => {
                self.error("No initial state defined.".to_string());
                return false;
            }
            Some(initial) if !self.draft.states.contains_key(initial) => {
                self.error(format!("Initial state '{initial}' not found."));
                return false;
            }
            Some(_) => {}
        }

        let unknown: BTreeSet<String> = self
            .draft
            .edges
            .iter()
            .filter(|e| !self.draft.symbols.contains_key(&e.symbol_id))
            .map(|e| e.symbol_id.to_string())
            .collect();
        for sid in unknown {
            self.error(format!("Edge references unknown symbol-id '{sid}'."));
        }
        true
    }

    fn check_availability(&mut self) {
        let mut referenced: BTreeSet<(Kind, String)> = BTreeSet::new();
        for edge in &self.draft.edges {
            if let Some(sym) = self.draft.symbols.get(&edge.symbol_id) {
                referenced.insert((sym.kind(), sym.ident().to_string()));
            }
        }

        for (kind, ident) in referenced {
            if self.registries.exists(kind, &ident) {
                self.available.entry(kind).or_default().insert(ident);
            } else {
                self.error(format!("Referenced {kind} '{ident}' is not registered."));
            }
        }
    }

    fn is_available(&self, edge: &crate::state_machine::Edge) -> bool {
        self.draft.symbols.get(&edge.symbol_id).is_some_and(|sym| {
            self.available
                .get(&sym.kind())
                .is_some_and(|idents| idents.contains(sym.ident()))
        })
    }

    /// BFS over available edges; returns the reachable set (empty when the
    /// initial state is missing)
    fn check_terminal_reachability(&mut self) -> HashSet<StateName> {
        let Some(initial) = self.initial.filter(|i| self.draft.states.contains_key(*i)) else {
            return HashSet::new();
        };

        let graph = AutomatonGraph::build(
            self.draft.states.values(),
            &self.draft.edges,
            &self.draft.symbols,
            |e| self.is_available(e),
        );
        let reachable = graph.reachable_from(initial);
        if !graph.has_terminal_edge_from(&reachable) {
            self.error("No reachable terminal state from initial.".to_string());
        }
        reachable
    }

    fn prune_unreachable(&mut self, reachable: &HashSet<StateName>) {
        let removed: Vec<StateName> = self
            .draft
            .states
            .keys()
            .filter(|name| !reachable.contains(*name))
            .cloned()
            .collect();
        if removed.is_empty() {
            return;
        }

        for name in &removed {
            self.draft.states.shift_remove(name);
            tracing::warn!("State '{}' is unreachable from initial and was removed", name);
            self.warning(format!(
                "State '{name}' is unreachable from initial and was removed."
            ));
        }

        let before = self.draft.edges.len();
        self.draft
            .edges
            .retain(|e| !removed.iter().any(|name| e.touches(name)));
        let pruned = before - self.draft.edges.len();
        if pruned > 0 {
            tracing::warn!("Pruned {} edges referencing removed states", pruned);
            self.warning(format!("Pruned {pruned} edges referencing removed states."));
        }
    }

    /// A state entered only through terminal edges is never observed with
    /// its cursor at rest, so its outgoing edges can never fire.
    fn prune_after_terminal(&mut self) {
        let Some(initial) = self.initial else {
            return;
        };

        let mut condemned = Vec::new();
        for (name, state) in &self.draft.states {
            if name == initial {
                continue;
            }
            let has_outgoing = self.draft.edges.iter().any(|e| &e.from_state == name);
            if !has_outgoing {
                continue;
            }

            let mut incoming = self
                .draft
                .edges
                .iter()
                .filter(|e| &e.to_state == name && !e.is_self_loop() && self.is_available(e))
                .peekable();
            if incoming.peek().is_none() {
                continue;
            }
            if incoming.all(|e| state.is_terminal_for(&e.symbol_id)) {
                condemned.push(name.clone());
            }
        }

        for name in condemned {
            self.draft.edges.retain(|e| e.from_state != name);
            tracing::warn!(
                "Outgoing edges from state '{}' pruned: only terminal incoming edges present",
                name
            );
            self.warning(format!(
                "Outgoing edges from state '{name}' pruned: only terminal incoming edges present."
            ));
        }
    }
}
