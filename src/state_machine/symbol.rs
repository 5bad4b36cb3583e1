//! Input alphabet (Σ)

use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a gated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// Invokable action
    Action,
    /// Retrievable data item, addressed by URI
    Item,
    /// Renderable template
    Template,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::Action, Kind::Item, Kind::Template];

    pub fn name(&self) -> &'static str {
        match self {
            Kind::Action => "action",
            Kind::Item => "item",
            Kind::Template => "template",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Kind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "action" => Ok(Kind::Action),
            "item" => Ok(Kind::Item),
            "template" => Ok(Kind::Template),
            other => Err(crate::Error::custom(format!("unknown kind '{other}'"))),
        }
    }
}

/// Outcome of one wrapped operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub const ALL: [Outcome; 2] = [Outcome::Success, Outcome::Error];

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable identifier of a symbol; the only key edges and terminal sets carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(String);

impl SymbolId {
    /// Blake2b-128 over `kind \x1f ident \x1f outcome`, hex encoded.
    pub fn derive(kind: Kind, ident: &str, outcome: Outcome) -> Self {
        let mut hasher = Blake2b::<U16>::new();
        hasher.update(kind.name().as_bytes());
        hasher.update([0x1f]);
        hasher.update(ident.as_bytes());
        hasher.update([0x1f]);
        hasher.update(outcome.name().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Σ, keyed by id, in first-seen order
pub type SymbolTable = indexmap::IndexMap<SymbolId, Symbol>;

/// One letter of the alphabet: `(kind, ident, outcome)` plus its derived id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    kind: Kind,
    ident: String,
    outcome: Outcome,
    id: SymbolId,
}

impl Symbol {
    pub fn new(kind: Kind, ident: impl Into<String>, outcome: Outcome) -> Self {
        let ident = ident.into();
        let id = SymbolId::derive(kind, &ident, outcome);
        Self {
            kind,
            ident,
            outcome,
            id,
        }
    }

    pub fn action(ident: impl Into<String>, outcome: Outcome) -> Self {
        Self::new(Kind::Action, ident, outcome)
    }

    pub fn item(ident: impl Into<String>, outcome: Outcome) -> Self {
        Self::new(Kind::Item, ident, outcome)
    }

    pub fn template(ident: impl Into<String>, outcome: Outcome) -> Self {
        Self::new(Kind::Template, ident, outcome)
    }

    /// The SUCCESS/ERROR pair for one binding
    pub fn pair(kind: Kind, ident: &str) -> (Self, Self) {
        (
            Self::new(kind, ident, Outcome::Success),
            Self::new(kind, ident, Outcome::Error),
        )
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn id(&self) -> &SymbolId {
        &self.id
    }

    /// Same `(kind, ident, outcome)` triple, ignoring the id
    pub fn same_triple(&self, other: &Symbol) -> bool {
        self.kind == other.kind && self.ident == other.ident && self.outcome == other.outcome
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}={}", self.kind, self.ident, self.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_stable() {
        let a = Symbol::action("login", Outcome::Success);
        let b = Symbol::action("login".to_string(), Outcome::Success);
        assert_eq!(a.id(), b.id());
        assert_eq!(a.id().as_str().len(), 32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_id_distinguishes_triple() {
        let ok = Symbol::action("login", Outcome::Success);
        let err = Symbol::action("login", Outcome::Error);
        let item = Symbol::item("login", Outcome::Success);
        assert_ne!(ok.id(), err.id());
        assert_ne!(ok.id(), item.id());
    }

    #[test]
    fn test_ident_containing_separator() {
        let a = SymbolId::derive(Kind::Item, "a\x1fb", Outcome::Success);
        let b = SymbolId::derive(Kind::Item, "a", Outcome::Success);
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        for kind in Kind::ALL {
            assert_eq!(kind.name().parse::<Kind>().unwrap(), kind);
        }
        assert!("prompt".parse::<Kind>().is_err());
    }

    #[test]
    fn test_display() {
        let s = Symbol::template("greeting", Outcome::Error);
        assert_eq!(s.to_string(), "template:greeting=error");
    }
}
