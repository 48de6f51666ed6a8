//! Single-flight de-duplication of concurrent upstream dispatches.
//!
//! At most one dispatch may be in flight per cache key. The first caller
//! to reserve a key becomes the leader and owns a [`FlightGuard`];
//! concurrent callers become followers and share the leader's outcome
//! through a watch channel. A failed flight is never cached — followers
//! observe [`FlightState::Failed`] and re-reserve, each then performing
//! at most its own dispatch.
//!
//! Registration is a compare-and-set under the table lock: two tasks
//! racing to reserve the same key cannot both become leader. Guards are
//! id-tagged so a guard from an already-superseded flight cannot disturb
//! a newer one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::exact::CacheEntry;
use super::key::CacheKey;

/// Observable state of one flight.
#[derive(Debug, Clone)]
pub enum FlightState {
    Pending,
    Done(CacheEntry),
    Failed,
}

struct FlightSlot {
    id: u64,
    tx: Arc<watch::Sender<FlightState>>,
}

/// Registry of in-flight dispatches keyed by cache key.
#[derive(Default)]
pub struct FlightTable {
    flights: Mutex<HashMap<CacheKey, FlightSlot>>,
    next_id: AtomicU64,
}

/// Result of a reservation attempt.
pub enum Reservation {
    /// This caller owns the dispatch. `waiter` observes the flight like
    /// any follower, so the guard can move into a detached dispatch task
    /// while the reserving task awaits the shared outcome.
    Leader {
        guard: FlightGuard,
        waiter: FlightWaiter,
    },
    /// Another dispatch for this key is already in flight.
    Follower(FlightWaiter),
}

impl FlightTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the flight for `key`, or join the one already in flight.
    pub fn reserve(self: &Arc<Self>, key: CacheKey) -> Reservation {
        let mut flights = self.flights.lock().expect("flight table lock poisoned");

        if let Some(slot) = flights.get(&key) {
            return Reservation::Follower(FlightWaiter {
                rx: slot.tx.subscribe(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(FlightState::Pending);
        let tx = Arc::new(tx);
        flights.insert(key, FlightSlot { id, tx: tx.clone() });

        Reservation::Leader {
            guard: FlightGuard {
                table: Arc::clone(self),
                key,
                id,
                tx,
            },
            waiter: FlightWaiter { rx },
        }
    }

    /// Complete the flight for `key` with a settled entry, waking every
    /// waiter. A no-op when no flight is registered.
    pub fn complete(&self, key: &CacheKey, entry: CacheEntry) {
        let mut flights = self.flights.lock().expect("flight table lock poisoned");
        if let Some(slot) = flights.remove(key) {
            slot.tx.send_replace(FlightState::Done(entry));
        }
    }

    /// Number of flights currently registered.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().expect("flight table lock poisoned").len()
    }
}

/// Leadership token for one flight.
///
/// Dropping the guard without the flight having been completed marks it
/// failed and wakes waiters so each can retry its own dispatch.
pub struct FlightGuard {
    table: Arc<FlightTable>,
    key: CacheKey,
    id: u64,
    tx: Arc<watch::Sender<FlightState>>,
}

impl FlightGuard {
    /// The key this guard leads.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Resolves once no waiter remains interested in the outcome; a
    /// detached dispatch task uses this to abandon work nobody wants.
    pub async fn abandoned(&self) {
        self.tx.closed().await
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        let mut flights = self
            .table
            .flights
            .lock()
            .expect("flight table lock poisoned");
        // Only a still-registered flight with our id is ours to fail;
        // a completed or superseded flight is left alone.
        if flights.get(&self.key).map(|slot| slot.id) == Some(self.id) {
            flights.remove(&self.key);
            self.tx.send_replace(FlightState::Failed);
        }
    }
}

/// Follower handle on a flight's outcome.
pub struct FlightWaiter {
    rx: watch::Receiver<FlightState>,
}

impl FlightWaiter {
    /// Wait for the flight to settle.
    ///
    /// A sender dropped without settling reads as failure.
    pub async fn outcome(mut self) -> FlightState {
        match self
            .rx
            .wait_for(|state| !matches!(state, FlightState::Pending))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => FlightState::Failed,
        }
    }
}
