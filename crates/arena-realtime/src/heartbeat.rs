//! Liveness monitoring for an open link.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::errors::{RealtimeError, Result};

/// One round trip that proves the link is alive.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Probe once, failing if no answer arrives within `timeout`.
    async fn probe(&self, timeout: Duration) -> Result<()>;
}

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// A probe failed; the link should be considered dead.
    Failed(RealtimeError),
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Probe every `interval` until a probe fails or `cancel` fires.
///
/// The first probe goes out one full interval after start. Each probe waits
/// at most `interval` for its answer. A single failure ends the loop; there is
/// no retry budget. A zero `interval` cannot monitor anything and fails
/// immediately.
pub async fn run_heartbeat<P: LivenessProbe>(
    probe: P,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    if interval.is_zero() {
        warn!("heartbeat interval is zero");
        return HeartbeatResult::Failed(RealtimeError::HeartbeatTimeout);
    }
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            outcome = probe.probe(interval) => outcome,
        };

        match outcome {
            Ok(()) => trace!("heartbeat ok"),
            Err(error) => {
                warn!(%error, "heartbeat probe failed");
                return HeartbeatResult::Failed(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Succeeds `ok_count` times, then fails.
    struct ScriptedProbe {
        calls: Arc<AtomicU32>,
        ok_count: u32,
    }

    #[async_trait]
    impl LivenessProbe for ScriptedProbe {
        async fn probe(&self, timeout: Duration) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.ok_count {
                Ok(())
            } else {
                time::sleep(timeout).await;
                Err(RealtimeError::Timeout {
                    cid: n.to_string(),
                    timeout_ms: 0,
                })
            }
        }
    }

    fn probe(ok_count: u32) -> (ScriptedProbe, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            ScriptedProbe {
                calls: Arc::clone(&calls),
                ok_count,
            },
            calls,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled() {
        let (probe, calls) = probe(u32::MAX);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_heartbeat(probe, Duration::from_secs(10), cancel).await;
        assert_eq!(result, HeartbeatResult::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_probe_after_one_interval() {
        let (probe, calls) = probe(u32::MAX);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(probe, Duration::from_secs(10), cancel.clone()));

        time::sleep(Duration::from_secs(9)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn single_failure_is_fatal() {
        let (probe, calls) = probe(2);
        let start = Instant::now();
        let result = run_heartbeat(probe, Duration::from_secs(1), CancellationToken::new()).await;

        assert!(matches!(result, HeartbeatResult::Failed(RealtimeError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two good ticks, a third tick, then a full probe timeout
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_fails_without_probing() {
        let (probe, calls) = probe(u32::MAX);
        let result = run_heartbeat(probe, Duration::ZERO, CancellationToken::new()).await;
        assert_eq!(result, HeartbeatResult::Failed(RealtimeError::HeartbeatTimeout));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_probe_wins() {
        let (probe, _calls) = probe(0);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_heartbeat(probe, Duration::from_secs(1), cancel.clone()));

        // Probe in flight between t=1s and t=2s
        time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), HeartbeatResult::Cancelled);
    }
}
