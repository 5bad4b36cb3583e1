//! Edge representation (δ)

use crate::state_machine::{Effect, StateName, SymbolId};

/// One entry of δ: from `from_state` on `symbol_id`, move to `to_state`,
/// then optionally run `effect`.
///
/// Equality covers `(from_state, to_state, symbol_id)` only; the effect is
/// not part of an edge's identity.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from_state: StateName,
    pub to_state: StateName,
    pub symbol_id: SymbolId,
    pub effect: Option<Effect>,
}

impl Edge {
    pub fn new(
        from_state: impl Into<StateName>,
        to_state: impl Into<StateName>,
        symbol_id: SymbolId,
    ) -> Self {
        Self {
            from_state: from_state.into(),
            to_state: to_state.into(),
            symbol_id,
            effect: None,
        }
    }

    pub fn with_effect(mut self, effect: Option<Effect>) -> Self {
        self.effect = effect;
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_state == self.to_state
    }

    pub fn touches(&self, state: &str) -> bool {
        self.from_state == state || self.to_state == state
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.from_state == other.from_state
            && self.to_state == other.to_state
            && self.symbol_id == other.symbol_id
    }
}

impl Eq for Edge {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{Outcome, Symbol};

    #[test]
    fn test_effect_is_not_part_of_identity() {
        let sym = Symbol::action("go", Outcome::Success);
        let plain = Edge::new("a", "b", sym.id().clone());
        let noisy = Edge::new("a", "b", sym.id().clone()).with_effect(Some(Effect::note("hi")));
        assert_eq!(plain, noisy);

        let other = Edge::new("a", "c", sym.id().clone());
        assert_ne!(plain, other);
    }

    #[test]
    fn test_self_loop() {
        let sym = Symbol::item("file:///x", Outcome::Error);
        assert!(Edge::new("a", "a", sym.id().clone()).is_self_loop());
        assert!(!Edge::new("a", "b", sym.id().clone()).is_self_loop());
    }
}
