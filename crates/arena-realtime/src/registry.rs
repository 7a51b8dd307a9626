//! Pending request registry.
//!
//! Maps correlation ids to single-use reply slots. `register`, `resolve`,
//! `remove` and `drain` are the only mutators; each takes the lock once and
//! never holds it across an await. A slot leaves the table at the moment it is
//! resolved, drained, or abandoned by its waiter, so a late reply finds
//! nothing and is reported as stray.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::envelope::InboundEnvelope;
use crate::errors::{RealtimeError, Result};

type Slot = oneshot::Sender<Result<InboundEnvelope>>;

/// Table of requests awaiting a reply.
#[derive(Debug)]
pub struct PendingRegistry {
    next_cid: AtomicU64,
    slots: Mutex<HashMap<String, Slot>>,
}

impl Default for PendingRegistry {
    fn default() -> Self {
        Self {
            next_cid: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl PendingRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Issue the next correlation id and open a slot for it.
    ///
    /// Ids are never reused by the same registry.
    pub fn register(self: &Arc<Self>) -> PendingReply {
        let cid = self.next_cid.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = oneshot::channel();
        let _ = self.slots.lock().insert(cid.clone(), tx);
        PendingReply {
            cid,
            rx,
            registered_at: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Deliver `outcome` to the slot for `cid`, removing it.
    ///
    /// Returns `false` if no slot exists (already resolved, timed out, or
    /// never issued).
    pub fn resolve(&self, cid: &str, outcome: Result<InboundEnvelope>) -> bool {
        let Some(slot) = self.slots.lock().remove(cid) else {
            return false;
        };
        // The waiter may have given up between our remove and this send
        let _ = slot.send(outcome);
        true
    }

    /// Drop the slot for `cid` without delivering anything.
    pub fn remove(&self, cid: &str) -> bool {
        self.slots.lock().remove(cid).is_some()
    }

    /// Fail every outstanding slot with `err`. Returns how many were failed.
    pub fn drain(&self, err: &RealtimeError) -> usize {
        let slots: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        let count = slots.len();
        for slot in slots {
            let _ = slot.send(Err(err.clone()));
        }
        count
    }

    /// Number of outstanding slots.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no slots are outstanding.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Whether a slot for `cid` is outstanding.
    pub fn contains(&self, cid: &str) -> bool {
        self.slots.lock().contains_key(cid)
    }
}

/// The waiting side of one registered request.
///
/// Dropping it removes the slot, so an abandoned or cancelled wait never
/// leaves an entry behind.
#[derive(Debug)]
pub struct PendingReply {
    cid: String,
    rx: oneshot::Receiver<Result<InboundEnvelope>>,
    registered_at: Instant,
    registry: Arc<PendingRegistry>,
}

impl PendingReply {
    /// Correlation id to stamp on the outbound envelope.
    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// Wait for the reply until `timeout` after registration.
    pub async fn wait(mut self, timeout: Duration) -> Result<InboundEnvelope> {
        let deadline = self.registered_at + timeout;
        match tokio::time::timeout_at(deadline, &mut self.rx).await {
            Ok(Ok(outcome)) => outcome,
            // Slot dropped without an outcome
            Ok(Err(_)) => Err(RealtimeError::NotConnected),
            Err(_) => Err(RealtimeError::Timeout {
                cid: self.cid.clone(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        let _ = self.registry.remove(&self.cid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;

    fn reply(cid: &str) -> InboundEnvelope {
        InboundEnvelope {
            cid: Some(cid.to_owned()),
            ..InboundEnvelope::default()
        }
    }

    #[test]
    fn cids_are_monotonic() {
        let registry = PendingRegistry::new();
        let a = registry.register();
        let b = registry.register();
        let c = registry.register();
        let ids: Vec<u64> = [a.cid(), b.cid(), c.cid()]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn drop_removes_slot() {
        let registry = PendingRegistry::new();
        let pending = registry.register();
        let cid = pending.cid().to_owned();
        assert!(registry.contains(&cid));
        drop(pending);
        assert!(!registry.contains(&cid));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn resolve_delivers_once() {
        let registry = PendingRegistry::new();
        let pending = registry.register();
        let cid = pending.cid().to_owned();

        assert!(registry.resolve(&cid, Ok(reply(&cid))));
        assert!(!registry.resolve(&cid, Ok(reply(&cid))));

        let got = pending.wait(Duration::from_secs(1)).await.unwrap();
        assert_eq!(got.cid.as_deref(), Some(cid.as_str()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn resolve_error_outcome() {
        let registry = PendingRegistry::new();
        let pending = registry.register();
        let cid = pending.cid().to_owned();
        let _ = registry.resolve(&cid, Err(RealtimeError::Decode("bad".into())));
        assert_matches!(
            pending.wait(Duration::from_secs(1)).await,
            Err(RealtimeError::Decode(_))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_and_cleans_up() {
        let registry = PendingRegistry::new();
        let pending = registry.register();
        let cid = pending.cid().to_owned();

        let start = Instant::now();
        let err = pending.wait(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(
            err,
            RealtimeError::Timeout {
                cid: cid.clone(),
                timeout_ms: 50
            }
        );

        // Late reply finds nothing
        assert!(!registry.resolve(&cid, Ok(reply(&cid))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn drain_fails_everyone() {
        let registry = PendingRegistry::new();
        let waiters: Vec<PendingReply> = (0..5).map(|_| registry.register()).collect();

        assert_eq!(registry.drain(&RealtimeError::NotConnected), 5);
        assert!(registry.is_empty());

        for pending in waiters {
            assert_matches!(
                pending.wait(Duration::from_secs(1)).await,
                Err(RealtimeError::NotConnected)
            );
        }
    }

    #[test]
    fn remove_unknown_is_false() {
        let registry = PendingRegistry::new();
        assert!(!registry.remove("404"));
    }

    #[tokio::test]
    async fn concurrent_registration_is_collision_free() {
        let registry = PendingRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                (0..100)
                    .map(|_| {
                        let pending = registry.register();
                        pending.cid().to_owned()
                    })
                    .collect::<Vec<_>>()
            }));
        }
        let mut seen = HashSet::new();
        for handle in handles {
            for cid in handle.await.unwrap() {
                assert!(seen.insert(cid));
            }
        }
        assert_eq!(seen.len(), 800);
        assert!(registry.is_empty());
    }
}
