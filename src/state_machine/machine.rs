//! Runtime automaton
//!
//! Frozen states, edges, and symbols, plus one cursor per session. Cursor
//! reads and moves happen under a single coarse mutex; the graph itself is
//! immutable and read without locking.

use crate::state_machine::validator::ValidationIssue;
use crate::state_machine::{
    AutomatonGraph, Edge, Kind, Outcome, State, StateName, Symbol, SymbolId, SymbolTable,
    TransitionScope, session,
};
use crate::{Error, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug)]
struct Cursors {
    global: StateName,
    by_session: HashMap<String, StateName>,
}

#[derive(Debug)]
pub struct Automaton {
    initial: StateName,
    states: IndexMap<StateName, State>,
    symbols: SymbolTable,
    edges: Vec<Edge>,
    index: HashMap<(StateName, SymbolId), usize>,
    cursors: Mutex<Cursors>,
    issues: Vec<ValidationIssue>,
}

impl Automaton {
    /// Freeze a validated graph. Fails when `initial` or an edge endpoint is
    /// not among `states`.
    pub fn new(
        initial: impl Into<StateName>,
        states: IndexMap<StateName, State>,
        symbols: SymbolTable,
        edges: Vec<Edge>,
    ) -> Result<Self> {
        let initial = initial.into();
        if !states.contains_key(&initial) {
            return Err(Error::UnknownState(initial));
        }

        let mut index = HashMap::with_capacity(edges.len());
        for (i, edge) in edges.iter().enumerate() {
            for endpoint in [&edge.from_state, &edge.to_state] {
                if !states.contains_key(endpoint) {
                    return Err(Error::UnknownState(endpoint.clone()));
                }
            }
            let key = (edge.from_state.clone(), edge.symbol_id.clone());
            if index.contains_key(&key) {
                tracing::warn!(
                    "Duplicate edge on {} from '{}'. Keeping first definition",
                    edge.symbol_id,
                    edge.from_state
                );
                continue;
            }
            index.insert(key, i);
        }

        Ok(Self {
            cursors: Mutex::new(Cursors {
                global: initial.clone(),
                by_session: HashMap::new(),
            }),
            initial,
            states,
            symbols,
            edges,
            index,
            issues: Vec::new(),
        })
    }

    pub(crate) fn with_issues(mut self, issues: Vec<ValidationIssue>) -> Self {
        self.issues = issues;
        self
    }

    /// Run `f` on the cursor of the ambient session, creating it at q0
    fn with_cursor<R>(&self, f: impl FnOnce(&mut StateName) -> R) -> R {
        let session = session::current();
        let mut cursors = self.cursors.lock();
        match session {
            Some(id) => {
                let cursor = cursors
                    .by_session
                    .entry(id)
                    .or_insert_with(|| self.initial.clone());
                f(cursor)
            }
            None => f(&mut cursors.global),
        }
    }

    /// Current state of the ambient session
    pub fn current_state(&self) -> StateName {
        self.with_cursor(|cursor| cursor.clone())
    }

    /// Move the ambient session back to q0
    pub fn reset(&self) {
        self.with_cursor(|cursor| *cursor = self.initial.clone());
    }

    /// Force the ambient session onto `state`
    pub fn set_current_state(&self, state: &str) -> Result<()> {
        if !self.states.contains_key(state) {
            return Err(Error::UnknownState(state.to_string()));
        }
        self.with_cursor(|cursor| *cursor = state.to_string());
        Ok(())
    }

    /// Edge leaving the current state on `symbol_id`
    pub fn get_edge(&self, symbol_id: &SymbolId) -> Option<&Edge> {
        let current = self.current_state();
        self.edge_from(&current, symbol_id)
    }

    fn edge_from(&self, state: &str, symbol_id: &SymbolId) -> Option<&Edge> {
        self.index
            .get(&(state.to_string(), symbol_id.clone()))
            .and_then(|&i| self.edges.get(i))
    }

    /// Whether the current state is terminal for `symbol_id`
    pub fn is_terminal(&self, symbol_id: &SymbolId) -> bool {
        let current = self.current_state();
        self.states
            .get(&current)
            .is_some_and(|s| s.is_terminal_for(symbol_id))
    }

    /// Identifiers of `kind` the current state offers with both outcomes.
    ///
    /// A binding with only one outcome edge means the graph was not completed
    /// and is reported as an inconsistency.
    pub fn available_symbols(&self, kind: Kind) -> Result<BTreeSet<String>> {
        let current = self.current_state();

        let mut outcomes: BTreeMap<&str, BTreeSet<Outcome>> = BTreeMap::new();
        for edge in self.edges.iter().filter(|e| e.from_state == current) {
            if let Some(sym) = self.symbols.get(&edge.symbol_id)
                && sym.kind() == kind
            {
                outcomes.entry(sym.ident()).or_default().insert(sym.outcome());
            }
        }

        let mut available = BTreeSet::new();
        for (ident, seen) in outcomes {
            if seen.len() != Outcome::ALL.len() {
                tracing::error!(
                    "State '{}' offers {} '{}' without both outcome edges",
                    current,
                    kind,
                    ident
                );
                return Err(Error::inconsistent(format!(
                    "state '{current}' offers {kind} '{ident}' without both outcome edges"
                )));
            }
            available.insert(ident.to_string());
        }
        Ok(available)
    }

    /// Scope that records the outcome of one `kind`/`ident` invocation
    pub fn step(&self, kind: Kind, ident: &str) -> TransitionScope<'_> {
        TransitionScope::new(self, kind, ident)
    }

    /// Follow `symbol_id` from the current state. Returns the state left and
    /// the edge taken; the cursor is untouched when no edge exists.
    pub(crate) fn advance(&self, symbol_id: &SymbolId) -> Option<(StateName, &Edge)> {
        self.with_cursor(|cursor| {
            let edge = self.edge_from(cursor, symbol_id)?;
            let from = std::mem::replace(cursor, edge.to_state.clone());
            Some((from, edge))
        })
    }

    /// Reset the ambient session when its current state is terminal for
    /// `symbol_id`
    pub(crate) fn reset_if_terminal(&self, symbol_id: &SymbolId) -> bool {
        self.with_cursor(|cursor| {
            let terminal = self
                .states
                .get(cursor.as_str())
                .is_some_and(|s| s.is_terminal_for(symbol_id));
            if terminal {
                *cursor = self.initial.clone();
            }
            terminal
        })
    }

    pub fn initial_state(&self) -> &str {
        &self.initial
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn symbol(&self, id: &SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values()
    }

    /// Warnings (and nothing else) left over from the build
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Number of sessions that have touched the automaton
    pub fn session_count(&self) -> usize {
        self.cursors.lock().by_session.len()
    }

    pub fn graph(&self) -> AutomatonGraph {
        AutomatonGraph::build(self.states.values(), &self.edges, &self.symbols, |_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, Registries};
    use crate::state_machine::{Definition, Target};
    use std::sync::Arc;

    fn registries() -> Registries {
        Registries::new(
            Arc::new(MemoryRegistry::with_names(
                Kind::Action,
                ["login", "logout", "search"],
            )),
            Arc::new(MemoryRegistry::with_names(Kind::Item, ["docs://faq"])),
            Arc::new(MemoryRegistry::new(Kind::Template)),
        )
    }

    /// start --login--> home (terminal on logout), home --search--> home
    fn login_machine() -> Automaton {
        let mut def = Definition::new(registries());
        def.initial_state("start")
            .on_action("login")
            .on_success("home")
            .on_error("start")
            .done()
            .on_item("docs://faq")
            .on_success("start")
            .done()
            .done()
            .state("home")
            .on_action("search")
            .on_success("home")
            .done()
            .on_action("logout")
            .on_success(Target::to("start").terminal())
            .done();
        def.build().unwrap()
    }

    fn sym(name: &str, outcome: Outcome) -> SymbolId {
        Symbol::action(name, outcome).id().clone()
    }

    #[test]
    fn test_new_rejects_unknown_states() {
        assert!(matches!(
            Automaton::new("q0", IndexMap::new(), SymbolTable::new(), Vec::new()),
            Err(Error::UnknownState(_))
        ));

        let mut states = IndexMap::new();
        states.insert("q0".to_string(), State::new("q0"));
        let edges = vec![Edge::new("q0", "q9", sym("t", Outcome::Success))];
        assert!(matches!(
            Automaton::new("q0", states, SymbolTable::new(), edges),
            Err(Error::UnknownState(s)) if s == "q9"
        ));
    }

    #[test]
    fn test_available_symbols_follow_current_state() {
        let m = login_machine();
        assert_eq!(m.current_state(), "start");
        assert_eq!(
            m.available_symbols(Kind::Action).unwrap(),
            BTreeSet::from(["login".to_string()])
        );
        assert_eq!(
            m.available_symbols(Kind::Item).unwrap(),
            BTreeSet::from(["docs://faq".to_string()])
        );
        assert!(m.available_symbols(Kind::Template).unwrap().is_empty());

        m.set_current_state("home").unwrap();
        assert_eq!(
            m.available_symbols(Kind::Action).unwrap(),
            BTreeSet::from(["logout".to_string(), "search".to_string()])
        );
    }

    #[test]
    fn test_every_available_symbol_has_both_edges() {
        let m = login_machine();
        for state in m.states().map(|s| s.name.clone()).collect::<Vec<_>>() {
            m.set_current_state(&state).unwrap();
            for kind in Kind::ALL {
                for ident in m.available_symbols(kind).unwrap() {
                    let (ok, err) = Symbol::pair(kind, &ident);
                    assert!(m.get_edge(ok.id()).is_some());
                    assert!(m.get_edge(err.id()).is_some());
                    assert_eq!(m.symbol(err.id()).map(Symbol::ident), Some(ident.as_str()));
                }
            }
        }
        // four bindings, two outcomes each
        assert_eq!(m.symbols().count(), 8);
    }

    #[test]
    fn test_half_bound_symbol_is_inconsistent() {
        let mut states = IndexMap::new();
        states.insert("q0".to_string(), State::new("q0"));
        let login = Symbol::action("login", Outcome::Success);
        let mut symbols = SymbolTable::new();
        symbols.insert(login.id().clone(), login.clone());
        let edges = vec![Edge::new("q0", "q0", login.id().clone())];

        let m = Automaton::new("q0", states, symbols, edges).unwrap();
        assert!(matches!(
            m.available_symbols(Kind::Action),
            Err(Error::Inconsistent(_))
        ));
    }

    #[test]
    fn test_advance_and_terminal_reset() {
        let m = login_machine();
        let (from, edge) = m.advance(&sym("login", Outcome::Success)).unwrap();
        assert_eq!(from, "start");
        assert_eq!(edge.to_state, "home");
        assert_eq!(m.current_state(), "home");

        // no edge: cursor stays
        assert!(m.advance(&sym("login", Outcome::Success)).is_none());
        assert_eq!(m.current_state(), "home");

        m.advance(&sym("logout", Outcome::Success)).unwrap();
        assert_eq!(m.current_state(), "start");
        assert!(m.is_terminal(&sym("logout", Outcome::Success)));
        assert!(m.reset_if_terminal(&sym("logout", Outcome::Success)));
        assert_eq!(m.current_state(), "start");
    }

    #[test]
    fn test_set_current_state_and_reset() {
        let m = login_machine();
        assert!(matches!(
            m.set_current_state("nowhere"),
            Err(Error::UnknownState(_))
        ));
        m.set_current_state("home").unwrap();
        assert_eq!(m.current_state(), "home");
        m.reset();
        assert_eq!(m.current_state(), "start");
    }

    #[tokio::test]
    async fn test_sessions_have_independent_cursors() {
        let m = login_machine();

        session::scope(Some("alice".to_string()), async {
            m.advance(&sym("login", Outcome::Success));
            assert_eq!(m.current_state(), "home");
        })
        .await;

        session::scope(Some("bob".to_string()), async {
            assert_eq!(m.current_state(), "start");
        })
        .await;

        assert_eq!(m.current_state(), "start");
        let alice = session::scope(Some("alice".to_string()), async { m.current_state() }).await;
        assert_eq!(alice, "home");
        assert_eq!(m.session_count(), 2);

        session::sync_scope(Some("alice".to_string()), || m.reset());
        assert_eq!(
            session::sync_scope(Some("alice".to_string()), || m.current_state()),
            "start"
        );
    }

    #[test]
    fn test_graph_view() {
        let m = login_machine();
        let stats = m.graph().stats();
        assert_eq!(stats.total_states, 2);
        assert_eq!(stats.total_edges, m.edges().len());
    }
}
