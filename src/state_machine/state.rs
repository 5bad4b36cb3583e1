//! State representation

use crate::state_machine::SymbolId;
use serde::{Deserialize, Serialize};

pub type StateName = String;

/// A named state (element of Q).
///
/// A state is terminal *for a given symbol*: entering it through a symbol in
/// `terminals` ends the interaction and the cursor resets to the start state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub name: StateName,
    terminals: Vec<SymbolId>,
}

impl State {
    pub fn new(name: impl Into<StateName>) -> Self {
        Self {
            name: name.into(),
            terminals: Vec::new(),
        }
    }

    /// Add a terminal symbol; returns false when it was already present
    pub fn add_terminal(&mut self, id: SymbolId) -> bool {
        if self.terminals.contains(&id) {
            return false;
        }
        self.terminals.push(id);
        true
    }

    pub fn is_terminal_for(&self, id: &SymbolId) -> bool {
        self.terminals.contains(id)
    }

    pub fn terminals(&self) -> &[SymbolId] {
        &self.terminals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{Outcome, Symbol};

    #[test]
    fn test_terminals_are_deduplicated() {
        let sym = Symbol::action("finish", Outcome::Success);
        let mut state = State::new("done");
        assert!(state.add_terminal(sym.id().clone()));
        assert!(!state.add_terminal(sym.id().clone()));
        assert_eq!(state.terminals().len(), 1);
        assert!(state.is_terminal_for(sym.id()));
    }

    #[test]
    fn test_terminal_is_per_symbol() {
        let ok = Symbol::action("finish", Outcome::Success);
        let err = Symbol::action("finish", Outcome::Error);
        let mut state = State::new("done");
        state.add_terminal(ok.id().clone());
        assert!(!state.is_terminal_for(err.id()));
    }
}
