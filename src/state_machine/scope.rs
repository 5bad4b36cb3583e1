//! Transition scope
//!
//! Wraps one invocation of a gated operation. Whatever happens inside, the
//! outcome is folded back into the automaton exactly once: the cursor moves
//! along the matching edge, the edge's effect runs, and a terminal landing
//! resets the session.

use crate::state_machine::effect::panic_payload_to_string;
use crate::state_machine::{Automaton, EffectContext, Kind, Outcome, Symbol, session};
use crate::{Error, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

pub struct TransitionScope<'a> {
    machine: &'a Automaton,
    kind: Kind,
    ident: String,
    success: Symbol,
    error: Symbol,
}

impl<'a> TransitionScope<'a> {
    pub(crate) fn new(machine: &'a Automaton, kind: Kind, ident: &str) -> Self {
        let (success, error) = Symbol::pair(kind, ident);
        Self {
            machine,
            kind,
            ident: ident.to_string(),
            success,
            error,
        }
    }

    /// Await `op` and record its outcome.
    ///
    /// An `Err` or a panic records the error outcome and comes back as
    /// [`Error::Operation`]. Dropping the returned future before `op` settles
    /// records nothing.
    pub async fn run<T, E, F>(self, op: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        let failure = match AssertUnwindSafe(op).catch_unwind().await {
            Ok(Ok(value)) => {
                self.apply(Outcome::Success).await;
                return Ok(value);
            }
            Ok(Err(e)) => e.into(),
            Err(payload) => {
                anyhow::anyhow!("operation panicked: {}", panic_payload_to_string(&payload))
            }
        };

        let state = self.machine.current_state();
        tracing::error!(
            "{} '{}' failed in state '{}': {:#}",
            self.kind,
            self.ident,
            state,
            failure
        );
        self.apply(Outcome::Error).await;
        Err(Error::Operation {
            kind: self.kind,
            ident: self.ident,
            state,
            source: failure,
        })
    }

    /// Record `outcome` for an operation driven outside the scope
    pub async fn complete(self, outcome: Outcome) {
        self.apply(outcome).await;
    }

    async fn apply(&self, outcome: Outcome) {
        let symbol = match outcome {
            Outcome::Success => &self.success,
            Outcome::Error => &self.error,
        };

        let Some((from, edge)) = self.machine.advance(symbol.id()) else {
            tracing::error!(
                "No edge for {} from state '{}'. State unchanged",
                symbol,
                self.machine.current_state()
            );
            return;
        };
        tracing::debug!("{} --{}--> {}", from, symbol, edge.to_state);

        if let Some(effect) = &edge.effect {
            effect
                .run_best_effort(EffectContext {
                    session: session::current(),
                    from_state: from,
                    to_state: edge.to_state.clone(),
                    symbol: symbol.clone(),
                })
                .await;
        }

        if self.machine.reset_if_terminal(symbol.id()) {
            tracing::info!(
                "Terminal {} reached in state '{}'. Reset to '{}'",
                symbol,
                edge.to_state,
                self.machine.initial_state()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MemoryRegistry, Registries};
    use crate::state_machine::{Definition, Effect, Target};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registries() -> Registries {
        Registries::new(
            Arc::new(MemoryRegistry::with_names(Kind::Action, ["login", "logout"])),
            Arc::new(MemoryRegistry::new(Kind::Item)),
            Arc::new(MemoryRegistry::new(Kind::Template)),
        )
    }

    fn machine(effect: Option<Effect>) -> Automaton {
        let mut home = Target::to("home");
        if let Some(effect) = effect {
            home = home.with_effect(effect);
        }
        let mut def = Definition::new(registries());
        def.initial_state("start")
            .on_action("login")
            .on_success(home)
            .on_error("start")
            .done()
            .done()
            .state("home")
            .on_action("logout")
            .on_success(Target::to("start").terminal())
            .done();
        def.build().unwrap()
    }

    #[tokio::test]
    async fn test_terminal_login_returns_to_start() {
        let mut def = Definition::new(registries());
        def.initial_state("start")
            .on_action("login")
            .terminal_success("home")
            .on_error("start")
            .done();
        let m = def.build().unwrap();
        let before = m.available_symbols(Kind::Action).unwrap();

        let err = m
            .step(Kind::Action, "login")
            .run(async { Err::<(), _>(anyhow::anyhow!("bad password")) })
            .await
            .unwrap_err();
        assert!(err.is_operation());
        assert_eq!(m.current_state(), "start");

        m.step(Kind::Action, "login")
            .run(async { Ok::<_, anyhow::Error>(()) })
            .await
            .unwrap();
        assert_eq!(m.current_state(), "start");
        assert_eq!(m.available_symbols(Kind::Action).unwrap(), before);
    }

    #[tokio::test]
    async fn test_success_moves_cursor() {
        let m = machine(None);
        let out = m
            .step(Kind::Action, "login")
            .run(async { Ok::<_, anyhow::Error>(42) })
            .await
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(m.current_state(), "home");
    }

    #[tokio::test]
    async fn test_failure_takes_error_edge_and_is_mapped() {
        let m = machine(None);
        m.set_current_state("home").unwrap();

        let err = m
            .step(Kind::Action, "logout")
            .run(async { Err::<(), _>(anyhow::anyhow!("denied")) })
            .await
            .unwrap_err();
        match err {
            Error::Operation {
                kind,
                ident,
                state,
                source,
            } => {
                assert_eq!(kind, Kind::Action);
                assert_eq!(ident, "logout");
                assert_eq!(state, "home");
                assert_eq!(source.to_string(), "denied");
            }
            other => panic!("expected operation error, got {other:?}"),
        }
        // completed self-loop
        assert_eq!(m.current_state(), "home");
    }

    #[tokio::test]
    async fn test_panic_counts_as_error() {
        let m = machine(None);
        let err = m
            .step(Kind::Action, "login")
            .run(async {
                if true {
                    panic!("kaboom");
                }
                Ok::<(), anyhow::Error>(())
            })
            .await
            .unwrap_err();
        assert!(err.is_operation());
        assert!(err.to_string().contains("operation panicked: kaboom"));
        assert_eq!(m.current_state(), "start");
    }

    #[tokio::test]
    async fn test_terminal_resets_to_initial() {
        let m = machine(None);
        m.step(Kind::Action, "login").complete(Outcome::Success).await;
        assert_eq!(m.current_state(), "home");
        m.step(Kind::Action, "logout").complete(Outcome::Success).await;
        assert_eq!(m.current_state(), "start");
    }

    #[tokio::test]
    async fn test_missing_edge_is_a_no_op() {
        let m = machine(None);
        m.step(Kind::Action, "logout").complete(Outcome::Success).await;
        assert_eq!(m.current_state(), "start");
        m.step(Kind::Template, "unknown").complete(Outcome::Error).await;
        assert_eq!(m.current_state(), "start");
    }

    #[tokio::test]
    async fn test_effect_runs_after_move() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let effect = Effect::blocking("count", move |ctx| {
            assert_eq!(ctx.from_state, "start");
            assert_eq!(ctx.to_state, "home");
            assert_eq!(ctx.session.as_deref(), Some("alice"));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        let m = machine(Some(effect));

        session::scope(Some("alice".to_string()), async {
            m.step(Kind::Action, "login").complete(Outcome::Success).await;
            assert_eq!(m.current_state(), "home");
        })
        .await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(m.current_state(), "start");
    }

    #[tokio::test]
    async fn test_failing_effect_does_not_undo_transition() {
        let effect = Effect::blocking("fail", |_| Err(anyhow::anyhow!("effect broke").into()));
        let m = machine(Some(effect));
        m.step(Kind::Action, "login")
            .run(async { Ok::<_, anyhow::Error>(()) })
            .await
            .unwrap();
        assert_eq!(m.current_state(), "home");
    }

    #[tokio::test]
    async fn test_dropped_future_records_nothing() {
        let m = machine(None);
        let pending = m
            .step(Kind::Action, "login")
            .run(futures::future::pending::<anyhow::Result<()>>());
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(m.current_state(), "start");
    }
}
