//! Builder and fluent declaration surface
//!
//! The builder accumulates states, edges, and symbols, completes partial
//! outcome declarations with self-loops, and hands the result to the
//! validator. Nothing here is shared with the runtime: `build` works on a
//! clone of the declarations, so building twice yields the same automaton.

use crate::registry::Registries;
use crate::state_machine::validator::{IssueLevel, ValidationIssue, Validator};
use crate::state_machine::{
    Automaton, Edge, Effect, Kind, Outcome, State, StateName, Symbol, SymbolId, SymbolTable,
};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Declarations under construction
#[derive(Debug, Clone, Default)]
pub(crate) struct Draft {
    pub(crate) initial: Option<StateName>,
    pub(crate) states: IndexMap<StateName, State>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) symbols: SymbolTable,
}

impl Draft {
    pub(crate) fn add_state(&mut self, name: &str, is_initial: bool) {
        if self.states.contains_key(name) {
            tracing::debug!("State '{}' already exists; keeping configuration", name);
        } else {
            self.states.insert(name.to_string(), State::new(name));
        }

        if !is_initial {
            return;
        }
        match &self.initial {
            None => self.initial = Some(name.to_string()),
            Some(current) if current == name => {}
            Some(current) => tracing::warn!(
                "Initial state already set to '{}'. Ignoring attempt to set '{}' as initial",
                current,
                name
            ),
        }
    }

    /// Ensure the symbol is in Σ and return its id
    pub(crate) fn record_symbol(&mut self, symbol: &Symbol) -> SymbolId {
        let id = symbol.id().clone();
        match self.symbols.get(&id) {
            None => {
                self.symbols.insert(id.clone(), symbol.clone());
            }
            Some(existing) if !existing.same_triple(symbol) => {
                tracing::debug!("Symbol id collision for {}. Keeping first definition", id);
            }
            Some(_) => {}
        }
        id
    }

    pub(crate) fn add_terminal(&mut self, state: &str, symbol: &Symbol) -> Result<()> {
        if !self.states.contains_key(state) {
            return Err(Error::UndeclaredState(state.to_string()));
        }
        let id = self.record_symbol(symbol);
        if let Some(st) = self.states.get_mut(state)
            && !st.add_terminal(id)
        {
            tracing::debug!(
                "Terminal symbol {} already present on state '{}'. Ignored",
                symbol,
                state
            );
        }
        Ok(())
    }

    pub(crate) fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        symbol: &Symbol,
        effect: Option<Effect>,
    ) -> Result<()> {
        if !self.states.contains_key(from) {
            return Err(Error::UndeclaredState(from.to_string()));
        }
        if !self.states.contains_key(to) {
            self.add_state(to, false);
            tracing::debug!("Created placeholder state '{}' for edge target", to);
        }

        let id = self.record_symbol(symbol);
        if let Some(existing) = self
            .edges
            .iter()
            .find(|e| e.from_state == from && e.symbol_id == id)
        {
            if existing.to_state == to {
                tracing::warn!(
                    "Edge {} --{}--> {} already exists. New definition ignored",
                    from,
                    symbol,
                    to
                );
            } else {
                tracing::warn!(
                    "Ambiguous edge on {} from '{}': existing target '{}' differs from '{}'. New definition ignored",
                    symbol,
                    from,
                    existing.to_state,
                    to
                );
            }
            return Ok(());
        }

        self.edges.push(Edge::new(from, to, id).with_effect(effect));
        Ok(())
    }

    /// Give every `(from, kind, ident)` binding both outcomes, adding a
    /// self-loop without effect for each missing one.
    pub(crate) fn complete_reflexive_edges(&mut self) -> usize {
        let mut present: IndexMap<(StateName, Kind, String), BTreeSet<Outcome>> = IndexMap::new();
        for edge in &self.edges {
            let Some(sym) = self.symbols.get(&edge.symbol_id) else {
                continue;
            };
            present
                .entry((edge.from_state.clone(), sym.kind(), sym.ident().to_string()))
                .or_default()
                .insert(sym.outcome());
        }

        let mut added = 0;
        for ((from, kind, ident), outcomes) in present {
            for outcome in Outcome::ALL {
                if outcomes.contains(&outcome) {
                    continue;
                }
                let symbol = Symbol::new(kind, ident.as_str(), outcome);
                // `from` is declared: it already carries an edge
                if self.add_edge(&from, &from, &symbol, None).is_ok() {
                    added += 1;
                    tracing::warn!(
                        "Reflexive completion: added self-loop for {} '{}' in state '{}' on {}",
                        kind,
                        ident,
                        from,
                        outcome
                    );
                }
            }
        }
        added
    }

    /// Explicit initial state, else the first declared one
    pub(crate) fn effective_initial(&self) -> Option<StateName> {
        self.initial
            .clone()
            .or_else(|| self.states.keys().next().cloned())
    }
}

/// Accumulates declarations and produces a validated [`Automaton`]
#[derive(Debug, Clone)]
pub struct Builder {
    registries: Registries,
    draft: Draft,
    issues: Vec<ValidationIssue>,
}

impl Builder {
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            draft: Draft::default(),
            issues: Vec::new(),
        }
    }

    /// Declare a state; the first `is_initial = true` wins
    pub fn add_state(&mut self, name: &str, is_initial: bool) {
        self.draft.add_state(name, is_initial);
    }

    /// Add `δ(from, symbol) = to`. Duplicate and ambiguous edges are ignored
    /// with a warning; the first definition stays.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        symbol: &Symbol,
        effect: Option<Effect>,
    ) -> Result<()> {
        self.draft.add_edge(from, to, symbol, effect)
    }

    /// Mark `state` terminal for `symbol`
    pub fn add_terminal(&mut self, state: &str, symbol: &Symbol) -> Result<()> {
        self.draft.add_terminal(state, symbol)
    }

    pub fn initial_state(&self) -> Option<&str> {
        self.draft.initial.as_deref()
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.draft.states.contains_key(name)
    }

    /// Number of declared edges, before completion
    pub fn edge_count(&self) -> usize {
        self.draft.edges.len()
    }

    /// Issues reported by the last `build` call
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Complete, validate, and freeze the declarations.
    ///
    /// Without an explicit initial state the first declared state becomes
    /// the initial one and a warning is recorded. A stricter reading treats
    /// that case as the "No initial state defined." error; here the error
    /// only fires when no state was declared at all.
    pub fn build(&mut self) -> Result<Automaton> {
        let mut draft = self.draft.clone();
        draft.complete_reflexive_edges();

        let initial = draft.effective_initial();
        let mut issues = Vec::new();
        if draft.initial.is_none()
            && let Some(first) = &initial
        {
            tracing::warn!("No initial state declared; using first declared state '{}'", first);
            issues.push(ValidationIssue::new(
                IssueLevel::Warning,
                format!("No initial state declared; using first declared state '{first}'."),
            ));
        }

        issues.extend(Validator::new(&mut draft, initial.as_deref(), &self.registries).validate());
        for issue in issues.iter().filter(|i| !i.is_error()) {
            tracing::warn!("State machine validation warning: {}", issue.message);
        }
        self.issues = issues.clone();

        if issues.iter().any(ValidationIssue::is_error) {
            return Err(Error::build(issues));
        }

        let initial = initial.ok_or_else(|| Error::inconsistent("validated graph has no states"))?;
        let automaton = Automaton::new(initial, draft.states, draft.symbols, draft.edges)?;
        Ok(automaton.with_issues(issues))
    }
}

/// Where an outcome leads, and what happens on the way
#[derive(Debug, Clone)]
pub struct Target {
    to: StateName,
    terminal: bool,
    effect: Option<Effect>,
}

impl Target {
    pub fn to(state: impl Into<StateName>) -> Self {
        Self {
            to: state.into(),
            terminal: false,
            effect: None,
        }
    }

    /// Entering the target through this outcome ends the interaction
    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }
}

impl From<&str> for Target {
    fn from(state: &str) -> Self {
        Target::to(state)
    }
}

impl From<String> for Target {
    fn from(state: String) -> Self {
        Target::to(state)
    }
}

/// Fluent facade over a [`Builder`]
///
/// ```
/// use state_gate::registry::{MemoryRegistry, Registries};
/// use state_gate::state_machine::{Definition, Kind, Target};
/// use std::sync::Arc;
///
/// let registries = Registries::new(
///     Arc::new(MemoryRegistry::with_names(Kind::Action, ["login"])),
///     Arc::new(MemoryRegistry::new(Kind::Item)),
///     Arc::new(MemoryRegistry::new(Kind::Template)),
/// );
/// let mut def = Definition::new(registries);
/// def.initial_state("start")
///     .on_action("login")
///     .on_success(Target::to("home").terminal())
///     .on_error("start")
///     .done();
/// let machine = def.build().unwrap();
/// assert_eq!(machine.current_state(), "start");
/// ```
#[derive(Debug)]
pub struct Definition {
    builder: Builder,
    errors: Vec<Error>,
}

impl Definition {
    pub fn new(registries: Registries) -> Self {
        Self {
            builder: Builder::new(registries),
            errors: Vec::new(),
        }
    }

    /// Declare (or reopen) a state
    pub fn state(&mut self, name: &str) -> StateScope<'_> {
        self.builder.add_state(name, false);
        StateScope {
            def: self,
            state: name.to_string(),
        }
    }

    /// Declare (or reopen) the initial state
    pub fn initial_state(&mut self, name: &str) -> StateScope<'_> {
        self.builder.add_state(name, true);
        StateScope {
            def: self,
            state: name.to_string(),
        }
    }

    pub fn builder(&self) -> &Builder {
        &self.builder
    }

    /// Build, or fail with every declaration error recorded since the last
    /// call. The recorded errors are cleared either way.
    pub fn build(&mut self) -> Result<Automaton> {
        let mut errors = std::mem::take(&mut self.errors);
        match errors.len() {
            0 => self.builder.build(),
            1 => Err(errors.remove(0)),
            _ => Err(Error::build(
                errors
                    .iter()
                    .map(|e| ValidationIssue::error(e.to_string()))
                    .collect(),
            )),
        }
    }

    fn record(&mut self, result: Result<()>) {
        if let Err(e) = result {
            tracing::error!("Declaration failed: {}", e);
            self.errors.push(e);
        }
    }
}

/// Declarations attached to one state
#[derive(Debug)]
pub struct StateScope<'a> {
    def: &'a mut Definition,
    state: StateName,
}

impl<'a> StateScope<'a> {
    pub fn on(self, kind: Kind, ident: &str) -> BindingScope<'a> {
        BindingScope {
            scope: self,
            kind,
            ident: ident.to_string(),
        }
    }

    pub fn on_action(self, name: &str) -> BindingScope<'a> {
        self.on(Kind::Action, name)
    }

    pub fn on_item(self, uri: &str) -> BindingScope<'a> {
        self.on(Kind::Item, uri)
    }

    pub fn on_template(self, name: &str) -> BindingScope<'a> {
        self.on(Kind::Template, name)
    }

    pub fn name(&self) -> &str {
        &self.state
    }

    /// Return to the definition to declare another state
    pub fn done(self) -> &'a mut Definition {
        self.def
    }
}

/// Outcome edges of one `(state, kind, ident)` binding
#[derive(Debug)]
pub struct BindingScope<'a> {
    scope: StateScope<'a>,
    kind: Kind,
    ident: String,
}

impl<'a> BindingScope<'a> {
    pub fn on_success(self, target: impl Into<Target>) -> Self {
        self.outcome(Outcome::Success, target.into())
    }

    pub fn on_error(self, target: impl Into<Target>) -> Self {
        self.outcome(Outcome::Error, target.into())
    }

    /// Success edge that ends the interaction when taken
    pub fn terminal_success(self, to: &str) -> Self {
        self.outcome(Outcome::Success, Target::to(to).terminal())
    }

    /// Error edge that ends the interaction when taken
    pub fn terminal_error(self, to: &str) -> Self {
        self.outcome(Outcome::Error, Target::to(to).terminal())
    }

    pub fn on_success_with(self, to: &str, effect: Effect) -> Self {
        self.outcome(Outcome::Success, Target::to(to).with_effect(effect))
    }

    pub fn on_error_with(self, to: &str, effect: Effect) -> Self {
        self.outcome(Outcome::Error, Target::to(to).with_effect(effect))
    }

    pub fn outcome(self, outcome: Outcome, target: Target) -> Self {
        let symbol = Symbol::new(self.kind, self.ident.as_str(), outcome);
        let from = self.scope.state.clone();
        let def = &mut *self.scope.def;

        let result = def
            .builder
            .add_edge(&from, &target.to, &symbol, target.effect)
            .and_then(|()| {
                if target.terminal {
                    def.builder.add_terminal(&target.to, &symbol)
                } else {
                    Ok(())
                }
            });
        def.record(result);
        self
    }

    /// Return to the state scope to bind another operation
    pub fn done(self) -> StateScope<'a> {
        self.scope
    }
}
