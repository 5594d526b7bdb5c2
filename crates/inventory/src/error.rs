//! Inventory error types.

use common::{FlightId, SeatNumber};
use thiserror::Error;

use crate::lock::LockError;
use crate::seat::SeatStatus;

/// Errors that can occur during seat inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The seat does not exist on the flight.
    #[error("Seat {seat} not found on flight {flight}")]
    SeatNotFound { flight: FlightId, seat: SeatNumber },

    /// The seat exists but cannot serve the requested transition.
    #[error("Seat {seat} on flight {flight} is {status}, cannot book")]
    SeatUnavailable {
        flight: FlightId,
        seat: SeatNumber,
        status: SeatStatus,
    },

    /// Optimistic concurrency check failed; the caller read a stale
    /// version and must re-read before writing.
    #[error("Version conflict on seat {seat} (flight {flight}): expected {expected}, actual {actual}")]
    VersionConflict {
        flight: FlightId,
        seat: SeatNumber,
        expected: u64,
        actual: u64,
    },

    /// Seat lock store error.
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
