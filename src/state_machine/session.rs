//! Ambient session
//!
//! Operations run on behalf of a caller session without threading its id
//! through every call. The id is bound for the duration of a future (or a
//! closure) and read back by the automaton when it picks a cursor. Tasks
//! spawned from inside a scope do not inherit it.

use std::future::Future;

tokio::task_local! {
    static AMBIENT_SESSION: Option<String>;
}

/// Session bound to the running task, if any
pub fn current() -> Option<String> {
    AMBIENT_SESSION.try_with(|s| s.clone()).ok().flatten()
}

/// Run `fut` with `session` as the ambient session. `None` selects the
/// global cursor even inside an outer scope.
pub async fn scope<F: Future>(session: Option<String>, fut: F) -> F::Output {
    AMBIENT_SESSION.scope(session, fut).await
}

/// Synchronous variant of [`scope`]
pub fn sync_scope<R>(session: Option<String>, f: impl FnOnce() -> R) -> R {
    AMBIENT_SESSION.sync_scope(session, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;

    #[test]
    fn test_no_scope() {
        assert_eq!(current(), None);
    }

    #[test]
    fn test_sync_scope() {
        let seen = sync_scope(Some("alice".to_string()), current);
        assert_eq!(seen.as_deref(), Some("alice"));
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_scope_unbinds_on_error() {
        scope(Some("outer".to_string()), async {
            let result: Result<(), &str> = scope(Some("s".to_string()), async {
                tokio::task::yield_now().await;
                assert_eq!(current().as_deref(), Some("s"));
                Err("failed")
            })
            .await;
            assert!(result.is_err());
            assert_eq!(current().as_deref(), Some("outer"));
        })
        .await;
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_scope_unbinds_on_panic() {
        scope(Some("outer".to_string()), async {
            let caught = AssertUnwindSafe(scope(Some("s".to_string()), async {
                tokio::task::yield_now().await;
                if true {
                    panic!("boom");
                }
                current()
            }))
            .catch_unwind()
            .await;
            assert!(caught.is_err());
            assert_eq!(current().as_deref(), Some("outer"));
        })
        .await;
        assert_eq!(current(), None);
    }

    #[test]
    fn test_sync_scope_unbinds_on_panic() {
        sync_scope(Some("outer".to_string()), || {
            let caught = std::panic::catch_unwind(|| {
                sync_scope(Some("s".to_string()), || {
                    if true {
                        panic!("boom");
                    }
                    current()
                })
            });
            assert!(caught.is_err());
            assert_eq!(current().as_deref(), Some("outer"));
        });
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn test_scope_survives_await_and_nests() {
        scope(Some("outer".to_string()), async {
            tokio::task::yield_now().await;
            assert_eq!(current().as_deref(), Some("outer"));

            scope(None, async {
                assert_eq!(current(), None);
            })
            .await;

            assert_eq!(current().as_deref(), Some("outer"));
        })
        .await;
    }

    #[tokio::test]
    async fn test_concurrent_scopes_are_isolated() {
        let a = tokio::spawn(scope(Some("a".to_string()), async {
            tokio::task::yield_now().await;
            current()
        }));
        let b = tokio::spawn(scope(Some("b".to_string()), async {
            tokio::task::yield_now().await;
            current()
        }));
        assert_eq!(a.await.unwrap().as_deref(), Some("a"));
        assert_eq!(b.await.unwrap().as_deref(), Some("b"));
    }
}
