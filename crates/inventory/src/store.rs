//! Seat persistence with optimistic concurrency.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{FlightId, SeatNumber};
use tokio::sync::RwLock;

use crate::error::{InventoryError, Result};
use crate::seat::Seat;

/// Storage for seat records.
///
/// `update` is a compare-and-swap: the seat carries the version it was
/// read at, and the write succeeds only if the stored version still
/// matches, bumping it by one. Stale writers get a
/// [`InventoryError::VersionConflict`] and must re-read.
#[async_trait]
pub trait SeatStore: Send + Sync {
    /// Inserts or replaces a seat record (seeding/administration).
    async fn insert(&self, seat: Seat) -> Result<()>;

    /// Looks up one seat.
    async fn get(&self, flight_id: FlightId, seat_number: &SeatNumber) -> Result<Option<Seat>>;

    /// Lists all seats of a flight.
    async fn list(&self, flight_id: FlightId) -> Result<Vec<Seat>>;

    /// Compare-and-swap update; see the trait docs.
    async fn update(&self, seat: Seat) -> Result<()>;
}

/// In-memory seat store.
#[derive(Debug, Clone, Default)]
pub struct InMemorySeatStore {
    seats: Arc<RwLock<HashMap<(FlightId, SeatNumber), Seat>>>,
}

impl InMemorySeatStore {
    /// Creates a new empty seat store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored seats.
    pub async fn seat_count(&self) -> usize {
        self.seats.read().await.len()
    }
}

#[async_trait]
impl SeatStore for InMemorySeatStore {
    async fn insert(&self, seat: Seat) -> Result<()> {
        let key = (seat.flight_id, seat.seat_number.clone());
        self.seats.write().await.insert(key, seat);
        Ok(())
    }

    async fn get(&self, flight_id: FlightId, seat_number: &SeatNumber) -> Result<Option<Seat>> {
        let seats = self.seats.read().await;
        Ok(seats.get(&(flight_id, seat_number.clone())).cloned())
    }

    async fn list(&self, flight_id: FlightId) -> Result<Vec<Seat>> {
        let seats = self.seats.read().await;
        let mut result: Vec<Seat> = seats
            .values()
            .filter(|seat| seat.flight_id == flight_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        Ok(result)
    }

    async fn update(&self, seat: Seat) -> Result<()> {
        let key = (seat.flight_id, seat.seat_number.clone());
        let mut seats = self.seats.write().await;

        let current = seats.get(&key).ok_or_else(|| InventoryError::SeatNotFound {
            flight: seat.flight_id,
            seat: seat.seat_number.clone(),
        })?;

        if current.version != seat.version {
            return Err(InventoryError::VersionConflict {
                flight: seat.flight_id,
                seat: seat.seat_number.clone(),
                expected: seat.version,
                actual: current.version,
            });
        }

        let mut next = seat;
        next.version += 1;
        seats.insert(key, next);
        Ok(())
    }
}
