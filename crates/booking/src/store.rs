//! Booking persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::BookingId;
use tokio::sync::RwLock;

use crate::domain::Booking;
use crate::error::{BookingError, Result};

/// Storage for booking records.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists a new booking.
    async fn insert(&self, booking: Booking) -> Result<()>;

    /// Looks up a booking by id.
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Replaces an existing booking.
    async fn update(&self, booking: Booking) -> Result<()>;
}

/// In-memory booking store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty booking store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }

    /// Returns every stored booking, newest first.
    pub async fn all(&self) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.bookings.read().await.values().cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        self.bookings.write().await.insert(booking.booking_id, booking);
        Ok(())
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&booking_id).cloned())
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        if !bookings.contains_key(&booking.booking_id) {
            return Err(BookingError::BookingNotFound(booking.booking_id));
        }
        bookings.insert(booking.booking_id, booking);
        Ok(())
    }
}
