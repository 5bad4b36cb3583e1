//! State Gate
//!
//! A deterministic automaton that decides which operations a caller may
//! invoke next.
//!
//! This library provides functionality for:
//! - Declaring states and outcome edges over actions, items, and templates
//! - Validating the automaton against the registries that hold the operations
//! - Tracking one cursor per caller session
//! - Wrapping each invocation so its outcome moves the cursor exactly once
//! - Loading automata from TOML definitions

pub mod cli;
pub mod config;
pub mod definition;
pub mod error;
pub mod gate;
pub mod registry;
pub mod state_machine;

pub use config::Config;
pub use error::{Error, Result};
pub use gate::Gate;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the given log level
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "state-gate");
    }
}
