//! Distributed seat lock: TTL-based mutual exclusion keyed by
//! (flight, seat), with no knowledge of bookings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{FlightId, SeatNumber, UserId};
use thiserror::Error;

/// How long a seat lock lives before expiring on its own.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10 * 60);

/// Errors from the seat lock store.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock store cannot be reached. Acquire must fail closed on
    /// this error; release relies on TTL expiry instead.
    #[error("seat lock store is unavailable")]
    Unavailable,
}

/// Atomic check-and-set lock store with TTL expiry.
///
/// At most one live lock exists per (flight, seat) key; expiry is
/// automatic and needs no external cleanup.
#[async_trait]
pub trait SeatLockStore: Send + Sync {
    /// Sets the lock only if absent, with TTL. Returns `Ok(false)` when
    /// already held — a user-facing conflict, not a transient error.
    /// Never blocks waiting for the holder.
    async fn acquire(
        &self,
        flight_id: FlightId,
        seat_number: &SeatNumber,
        holder: UserId,
    ) -> Result<bool, LockError>;

    /// Idempotent delete. Releasing a lock that does not exist or has
    /// already expired is not an error.
    async fn release(&self, flight_id: FlightId, seat_number: &SeatNumber)
    -> Result<(), LockError>;

    /// Best-effort query. Callers fall back to "not held" on error,
    /// favoring seat-map availability over strict accuracy.
    async fn is_held(&self, flight_id: FlightId, seat_number: &SeatNumber)
    -> Result<bool, LockError>;
}

#[derive(Debug, Clone)]
struct LockEntry {
    holder: UserId,
    expires_at: Instant,
}

#[derive(Debug)]
struct LockState {
    locks: RwLock<HashMap<(FlightId, SeatNumber), LockEntry>>,
    ttl: Duration,
    unavailable: AtomicBool,
}

/// In-memory lock store with per-entry TTL.
///
/// The `set_unavailable` switch simulates a store outage so the
/// fail-closed acquire path can be exercised in tests.
#[derive(Debug, Clone)]
pub struct InMemorySeatLockStore {
    state: Arc<LockState>,
}

impl InMemorySeatLockStore {
    /// Creates a lock store with [`DEFAULT_LOCK_TTL`].
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_LOCK_TTL)
    }

    /// Creates a lock store with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            state: Arc::new(LockState {
                locks: RwLock::new(HashMap::new()),
                ttl,
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    /// Simulates the store going down (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the current holder of a live lock, if any.
    pub fn holder(&self, flight_id: FlightId, seat_number: &SeatNumber) -> Option<UserId> {
        let locks = self.state.locks.read().unwrap();
        locks
            .get(&(flight_id, seat_number.clone()))
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.holder)
    }

    /// Returns the number of live (unexpired) locks.
    pub fn live_lock_count(&self) -> usize {
        let now = Instant::now();
        let locks = self.state.locks.read().unwrap();
        locks.values().filter(|entry| entry.expires_at > now).count()
    }

    fn check_available(&self) -> Result<(), LockError> {
        if self.state.unavailable.load(Ordering::SeqCst) {
            return Err(LockError::Unavailable);
        }
        Ok(())
    }
}

impl Default for InMemorySeatLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeatLockStore for InMemorySeatLockStore {
    async fn acquire(
        &self,
        flight_id: FlightId,
        seat_number: &SeatNumber,
        holder: UserId,
    ) -> Result<bool, LockError> {
        self.check_available()?;

        let key = (flight_id, seat_number.clone());
        let now = Instant::now();
        let mut locks = self.state.locks.write().unwrap();

        if let Some(entry) = locks.get(&key)
            && entry.expires_at > now
        {
            tracing::debug!(%flight_id, %seat_number, holder = %entry.holder, "seat lock already held");
            return Ok(false);
        }

        locks.insert(
            key,
            LockEntry {
                holder,
                expires_at: now + self.state.ttl,
            },
        );
        tracing::debug!(%flight_id, %seat_number, %holder, ttl_secs = self.state.ttl.as_secs(), "seat lock acquired");
        Ok(true)
    }

    async fn release(
        &self,
        flight_id: FlightId,
        seat_number: &SeatNumber,
    ) -> Result<(), LockError> {
        self.check_available()?;

        let mut locks = self.state.locks.write().unwrap();
        locks.remove(&(flight_id, seat_number.clone()));
        Ok(())
    }

    async fn is_held(
        &self,
        flight_id: FlightId,
        seat_number: &SeatNumber,
    ) -> Result<bool, LockError> {
        self.check_available()?;

        let locks = self.state.locks.read().unwrap();
        Ok(locks
            .get(&(flight_id, seat_number.clone()))
            .is_some_and(|entry| entry.expires_at > Instant::now()))
    }
}
