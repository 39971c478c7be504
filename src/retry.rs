//! The retry harness (spec.md §4.4 "Retry harness").
//!
//! Every network-touching operation on [`crate::node::Node`] goes through
//! `with_retry`: it re-invokes the supplied closure while the returned
//! error is transient, sleeping `fix_interval` between attempts, and
//! escalates to `ChordError::NetworkHosed` once `max_attempts` is spent.
//! `InvalidArgument` always short-circuits, since retrying a malformed
//! request cannot help.

use std::future::Future;
use std::time::Duration;

use crate::error::{ChordError, ChordResult};

pub async fn with_retry<T, F, Fut>(max_attempts: usize, fix_interval: Duration, mut attempt: F) -> ChordResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ChordResult<T>>,
{
    let mut last_err = None;

    for attempt_no in 1..=max_attempts.max(1) {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                last_err = Some(err);
                if attempt_no < max_attempts {
                    tokio::time::sleep(fix_interval).await;
                }
            }
        }
    }

    Err(ChordError::NetworkHosed {
        attempts: max_attempts.max(1),
        source: Box::new(last_err.unwrap_or(ChordError::NodeDeparted)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn succeeds_without_retrying_on_first_try() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ChordError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_argument_short_circuits() {
        let calls = AtomicUsize::new(0);
        let result: ChordResult<()> = with_retry(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChordError::InvalidArgument("bad key".into()))
        })
        .await;
        assert!(matches!(result, Err(ChordError::InvalidArgument(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_attempts_surfaces_network_hosed() {
        let calls = AtomicUsize::new(0);
        let result: ChordResult<()> = with_retry(3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ChordError::TransientPeerFailure("no route".into()))
        })
        .await;
        assert!(matches!(result, Err(ChordError::NetworkHosed { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
