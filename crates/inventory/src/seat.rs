//! Seat records and presentation views.

use common::{FlightId, SeatNumber};
use serde::{Deserialize, Serialize};

/// Cabin class of a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatType {
    Economy,
    Business,
    First,
}

/// Seat status.
///
/// `Locked` is never persisted — it exists only as a presentation
/// overlay computed from the live lock store when listing seats. The
/// stored status moves `Available → Booked` through confirmation and
/// never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeatStatus {
    /// Free to be locked and booked.
    Available,
    /// Temporarily held by a live seat lock (overlay only).
    Locked,
    /// Sold; terminal.
    Booked,
    /// Taken out of service by operations.
    Blocked,
}

impl SeatStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "AVAILABLE",
            SeatStatus::Locked => "LOCKED",
            SeatStatus::Booked => "BOOKED",
            SeatStatus::Blocked => "BLOCKED",
        }
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A seat on a flight, versioned for optimistic concurrency.
///
/// `version` increases monotonically on every successful write; a
/// writer holding a stale version fails with a conflict instead of
/// silently overwriting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub flight_id: FlightId,
    pub seat_number: SeatNumber,
    pub seat_type: SeatType,
    pub status: SeatStatus,
    pub version: u64,
}

impl Seat {
    /// Creates a fresh available seat at version 0.
    pub fn new(flight_id: FlightId, seat_number: impl Into<SeatNumber>, seat_type: SeatType) -> Self {
        Self {
            flight_id,
            seat_number: seat_number.into(),
            seat_type,
            status: SeatStatus::Available,
            version: 0,
        }
    }
}

/// A seat as presented to clients, with the lock overlay applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatView {
    pub seat_number: SeatNumber,
    pub seat_type: SeatType,
    pub status: SeatStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_seat_is_available_at_version_zero() {
        let seat = Seat::new(FlightId::new(), "12A", SeatType::Economy);
        assert_eq!(seat.status, SeatStatus::Available);
        assert_eq!(seat.version, 0);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(SeatStatus::Available.to_string(), "AVAILABLE");
        assert_eq!(SeatStatus::Locked.to_string(), "LOCKED");
        assert_eq!(SeatStatus::Booked.to_string(), "BOOKED");
        assert_eq!(SeatStatus::Blocked.to_string(), "BLOCKED");
    }
}
