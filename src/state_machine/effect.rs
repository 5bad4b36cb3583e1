//! Best-effort side effects attached to edges

use crate::state_machine::{StateName, Symbol};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;

/// What an effect returns. A note is logged and discarded.
pub type EffectResult = std::result::Result<Option<String>, EffectError>;

#[derive(Error, Debug)]
pub enum EffectError {
    /// The effect gave up because its work was cancelled
    #[error("effect cancelled")]
    Cancelled,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Fixed context handed to every effect
#[derive(Debug, Clone)]
pub struct EffectContext {
    /// Ambient session the transition ran under, if any
    pub session: Option<String>,
    pub from_state: StateName,
    pub to_state: StateName,
    pub symbol: Symbol,
}

type EffectFn = dyn Fn(EffectContext) -> BoxFuture<'static, EffectResult> + Send + Sync;

/// A side effect run after the cursor moved along an edge.
///
/// Effects never decide anything: failures, cancellation and panics are logged
/// and swallowed by [`Effect::run_best_effort`].
#[derive(Clone)]
pub struct Effect {
    name: Arc<str>,
    f: Arc<EffectFn>,
}

impl Effect {
    /// Asynchronous effect
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(EffectContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EffectResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |ctx: EffectContext| f(ctx).boxed()),
        }
    }

    /// Synchronous effect; runs to completion on the calling task
    pub fn blocking<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(&EffectContext) -> EffectResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |ctx: EffectContext| futures::future::ready(f(&ctx)).boxed()),
        }
    }

    /// Effect that logs a fixed note whenever its edge fires
    pub fn note(note: impl Into<String>) -> Self {
        let note = note.into();
        Self::blocking("note", move |ctx| {
            tracing::info!(
                "{} -> {} via {}: {}",
                ctx.from_state,
                ctx.to_state,
                ctx.symbol,
                note
            );
            Ok(None)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the effect, logging every failure mode instead of returning it
    pub async fn run_best_effort(&self, ctx: EffectContext) {
        tracing::debug!("Executing effect '{}'", self.name);

        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.f)(ctx))) {
            Ok(fut) => fut,
            Err(payload) => {
                tracing::warn!(
                    "Effect '{}' panicked: {}",
                    self.name,
                    panic_payload_to_string(&payload)
                );
                return;
            }
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(Ok(Some(note))) if !note.is_empty() => {
                tracing::info!("Effect '{}' produced result (ignored): {}", self.name, note);
            }
            Ok(Ok(_)) => {}
            Ok(Err(EffectError::Cancelled)) => {
                tracing::debug!("Effect '{}' was cancelled", self.name);
            }
            Ok(Err(EffectError::Failed(e))) => {
                tracing::warn!("Effect '{}' raised an error: {:#}", self.name, e);
            }
            Err(payload) => {
                tracing::warn!(
                    "Effect '{}' panicked: {}",
                    self.name,
                    panic_payload_to_string(&payload)
                );
            }
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect").field("name", &self.name).finish()
    }
}

pub(crate) fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Outcome;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> EffectContext {
        EffectContext {
            session: Some("s1".to_string()),
            from_state: "a".to_string(),
            to_state: "b".to_string(),
            symbol: Symbol::action("go", Outcome::Success),
        }
    }

    #[tokio::test]
    async fn test_async_effect_is_awaited() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let effect = Effect::new("count", move |ctx| {
            let counter = counter.clone();
            async move {
                tokio::task::yield_now().await;
                assert_eq!(ctx.to_state, "b");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Some("counted".to_string()))
            }
        });

        effect.run_best_effort(ctx()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let failing = Effect::blocking("fail", |_| Err(anyhow::anyhow!("boom").into()));
        failing.run_best_effort(ctx()).await;

        let cancelled = Effect::new("cancel", |_| async { Err(EffectError::Cancelled) });
        cancelled.run_best_effort(ctx()).await;
    }

    #[tokio::test]
    async fn test_panics_are_swallowed() {
        let sync_panic = Effect::blocking("sync-panic", |_| panic!("sync boom"));
        sync_panic.run_best_effort(ctx()).await;

        let async_panic = Effect::new("async-panic", |_| async {
            if true {
                panic!("async boom");
            }
            Ok(None)
        });
        async_panic.run_best_effort(ctx()).await;
    }

    #[test]
    fn test_panic_payload_to_string() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_payload_to_string(&payload), "static");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_payload_to_string(&payload), "unknown panic");
    }
}
