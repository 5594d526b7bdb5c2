//! Booking error types.

use common::{BookingId, FlightId, SeatNumber};
use inventory::InventoryError;
use messaging::MessagingError;
use thiserror::Error;

use crate::domain::BookingStatus;

/// Errors that can occur during booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    /// A requested seat is taken or held by someone else. The user
    /// resolves this by picking a different seat.
    #[error("Seat {seat} on flight {flight} is not available")]
    SeatConflict { flight: FlightId, seat: SeatNumber },

    /// A booking request must name at least one passenger.
    #[error("Booking request has no passengers")]
    EmptyBooking,

    /// The booking does not exist.
    #[error("Booking {0} not found")]
    BookingNotFound(BookingId),

    /// The booking cannot move between these states.
    #[error("Booking cannot transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Seat inventory error.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Event bus error.
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

/// Convenience type alias for booking results.
pub type Result<T> = std::result::Result<T, BookingError>;
