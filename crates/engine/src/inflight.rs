//! Per-key in-flight markers.
//!
//! A key is in flight while some mutation holds its marker. Later mutations
//! on the same key queue behind it and are handed the marker in FIFO order
//! when the holder finishes; deletes jump to the front of the queue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use quizsync_core::EntityKey;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Queue behind every waiter.
    Back,
    /// Queue ahead of every waiter.
    Front,
}

type Table = HashMap<EntityKey, VecDeque<oneshot::Sender<()>>>;

#[derive(Debug, Clone, Default)]
pub struct InFlight {
    table: Arc<Mutex<Table>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        // The table holds no invariant a panicking holder could break halfway.
        match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn is_in_flight(&self, key: &EntityKey) -> bool {
        self.table().contains_key(key)
    }

    pub fn waiting(&self, key: &EntityKey) -> usize {
        self.table().get(key).map_or(0, VecDeque::len)
    }

    pub async fn acquire(&self, key: EntityKey, lane: Lane) -> Result<KeyGuard, SyncError> {
        let rx = {
            let mut table = self.table();
            match table.get_mut(&key) {
                None => {
                    table.insert(key, VecDeque::new());
                    return Ok(KeyGuard::new(self.clone(), key));
                }
                Some(queue) => {
                    let (tx, rx) = oneshot::channel();
                    match lane {
                        Lane::Back => queue.push_back(tx),
                        Lane::Front => queue.push_front(tx),
                    }
                    rx
                }
            }
        };

        let mut ticket = Ticket {
            inflight: self.clone(),
            key,
            rx: Some(rx),
        };
        ticket.wait().await?;
        Ok(KeyGuard::new(self.clone(), key))
    }

    /// Acquires every key in sorted order, so two mutations over overlapping
    /// key sets can never wait on each other in a cycle.
    pub async fn acquire_all(&self, keys: &[EntityKey], lane: Lane) -> Result<KeySet, SyncError> {
        let mut unique = keys.to_vec();
        unique.sort();
        unique.dedup();

        let mut guards = Vec::with_capacity(unique.len());
        for key in unique {
            guards.push(self.acquire(key, lane).await?);
        }
        Ok(KeySet { guards })
    }

    /// Hands the marker for `key` to the next live waiter, or clears it.
    fn release(&self, key: &EntityKey) {
        let mut table = self.table();
        let Some(queue) = table.get_mut(key) else {
            return;
        };
        while let Some(next) = queue.pop_front() {
            if next.send(()).is_ok() {
                return;
            }
        }
        table.remove(key);
    }
}

/// A queued claim on a marker. Dropping it before the hand-off completes
/// passes the marker on, so a cancelled waiter never strands a key.
struct Ticket {
    inflight: InFlight,
    key: EntityKey,
    rx: Option<oneshot::Receiver<()>>,
}

impl Ticket {
    async fn wait(&mut self) -> Result<(), SyncError> {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(());
        };
        let result = rx.await;
        self.rx = None;
        result.map_err(|_| SyncError::Detached(format!("marker for {} was dropped", self.key)))
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.inflight.release(&self.key);
            }
        }
    }
}

#[derive(Debug)]
pub struct KeyGuard {
    inflight: InFlight,
    key: EntityKey,
}

impl KeyGuard {
    fn new(inflight: InFlight, key: EntityKey) -> Self {
        Self { inflight, key }
    }

    pub fn key(&self) -> EntityKey {
        self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.inflight.release(&self.key);
    }
}

/// Markers held together by one mutation, released together on drop.
#[derive(Debug, Default)]
pub struct KeySet {
    guards: Vec<KeyGuard>,
}

impl KeySet {
    pub fn keys(&self) -> Vec<EntityKey> {
        self.guards.iter().map(KeyGuard::key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn waiters_are_served_in_order() -> Result<(), SyncError> {
        let inflight = InFlight::new();
        let key = EntityKey::quiz(1);
        let first = inflight.acquire(key, Lane::Back).await?;
        assert!(inflight.is_in_flight(&key));

        let (order_tx, mut order_rx) = tokio::sync::mpsc::unbounded_channel();
        for label in ["second", "third"] {
            let task_inflight = inflight.clone();
            let order_tx = order_tx.clone();
            tokio::spawn(async move {
                let _guard = task_inflight.acquire(key, Lane::Back).await?;
                let _ = order_tx.send(label);
                Ok::<_, SyncError>(())
            });
            while inflight.waiting(&key) == 0 || (label == "third" && inflight.waiting(&key) < 2) {
                tokio::task::yield_now().await;
            }
        }

        drop(first);
        assert_eq!(order_rx.recv().await, Some("second"));
        assert_eq!(order_rx.recv().await, Some("third"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!inflight.is_in_flight(&key));
        Ok(())
    }

    #[tokio::test]
    async fn front_lane_jumps_the_queue() -> Result<(), SyncError> {
        let inflight = InFlight::new();
        let key = EntityKey::question(4);
        let held = inflight.acquire(key, Lane::Back).await?;

        let (order_tx, mut order_rx) = tokio::sync::mpsc::unbounded_channel();
        for (label, lane) in [("update", Lane::Back), ("delete", Lane::Front)] {
            let task_inflight = inflight.clone();
            let order_tx = order_tx.clone();
            let before = inflight.waiting(&key);
            tokio::spawn(async move {
                let _guard = task_inflight.acquire(key, lane).await?;
                let _ = order_tx.send(label);
                Ok::<_, SyncError>(())
            });
            while inflight.waiting(&key) == before {
                tokio::task::yield_now().await;
            }
        }

        drop(held);
        assert_eq!(order_rx.recv().await, Some("delete"));
        assert_eq!(order_rx.recv().await, Some("update"));
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_waiter_does_not_strand_key() -> Result<(), SyncError> {
        let inflight = InFlight::new();
        let key = EntityKey::project(2);
        let held = inflight.acquire(key, Lane::Back).await?;

        let waiter = tokio::time::timeout(Duration::from_millis(10), inflight.acquire(key, Lane::Back)).await;
        assert!(waiter.is_err());

        drop(held);
        assert!(!inflight.is_in_flight(&key));
        let _again = inflight.acquire(key, Lane::Back).await?;
        Ok(())
    }

    #[tokio::test]
    async fn acquire_all_dedups_and_sorts() -> Result<(), SyncError> {
        let inflight = InFlight::new();
        let keys = [EntityKey::quiz(2), EntityKey::question(1), EntityKey::quiz(2)];
        let set = inflight.acquire_all(&keys, Lane::Back).await?;
        assert_eq!(set.keys(), vec![EntityKey::quiz(2), EntityKey::question(1)]);
        drop(set);
        assert!(!inflight.is_in_flight(&EntityKey::quiz(2)));
        Ok(())
    }
}
