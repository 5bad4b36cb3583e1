//! State machine module - Declare, validate, and drive the operation automaton
//!
//! An automaton is a DFA over symbols `(kind, ident, outcome)`. Each gated
//! operation produces exactly one symbol when it settles, and the symbol moves
//! the caller's cursor. What a caller may invoke next is whatever the current
//! state has outgoing edges for.

pub mod builder;
pub mod edge;
pub mod effect;
pub mod graph;
pub mod machine;
pub mod scope;
pub mod session;
pub mod state;
pub mod symbol;
pub mod validator;

// Re-export key types
pub use builder::{BindingScope, Builder, Definition, StateScope, Target};
pub use edge::Edge;
pub use effect::{Effect, EffectContext, EffectError, EffectResult};
pub use graph::{AutomatonGraph, GraphEdge, GraphStats};
pub use machine::Automaton;
pub use scope::TransitionScope;
pub use state::{State, StateName};
pub use symbol::{Kind, Outcome, Symbol, SymbolId, SymbolTable};
pub use validator::{IssueLevel, ValidationIssue};
