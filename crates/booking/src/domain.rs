//! The booking aggregate.

use chrono::{DateTime, Utc};
use common::{BookingId, FlightId, Money, SeatNumber, UserId};
use messaging::events::{LuggageKind, PassengerSpec};
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::pricing;

/// Lifecycle state of a booking.
///
/// ```text
///          payment success, seats confirmed
/// Pending ────────────────────────────────► Confirmed
///    │
///    │ payment failed, or compensation
///    └────────────────────────────────────► Cancelled
/// ```
///
/// Confirmed and Cancelled are terminal. No other transition exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Human-readable booking reference shown to the passenger, e.g.
/// `BK-9F3A21C0`. Derived from the booking id so it needs no separate
/// uniqueness check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// Derives the reference for a booking id.
    pub fn for_booking(booking_id: BookingId) -> Self {
        let hex = booking_id.as_uuid().simple().to_string();
        Self(format!("BK-{}", hex[..8].to_uppercase()))
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A luggage item with the fee it was priced at when the booking was
/// created. The fee is frozen here so later tariff changes never touch
/// an existing booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Luggage {
    pub kind: LuggageKind,
    pub weight_kg: f64,
    pub fee: Money,
}

/// A passenger on a booking, owned by the aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub seat_number: SeatNumber,
    pub luggage: Vec<Luggage>,
}

impl Passenger {
    /// Builds a passenger from the requested spec, pricing the luggage.
    pub fn from_spec(spec: &PassengerSpec) -> Self {
        Self {
            first_name: spec.first_name.clone(),
            last_name: spec.last_name.clone(),
            email: spec.email.clone(),
            seat_number: spec.seat_number.clone(),
            luggage: spec
                .luggage
                .iter()
                .map(|item| Luggage {
                    kind: item.kind,
                    weight_kg: item.weight_kg,
                    fee: pricing::luggage_fee(item.kind),
                })
                .collect(),
        }
    }
}

/// A booking: the passenger-facing record of a seat purchase.
///
/// Passengers and their luggage are owned sub-records with no identity
/// outside the booking. The total is computed server-side at creation
/// and never revised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub reference: BookingReference,
    pub flight_id: FlightId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub passengers: Vec<Passenger>,
}

impl Booking {
    /// Creates a pending booking with a fresh id and derived reference.
    pub fn new(
        flight_id: FlightId,
        user_id: UserId,
        passengers: Vec<Passenger>,
        total_amount: Money,
    ) -> Self {
        let booking_id = BookingId::new();
        Self {
            booking_id,
            reference: BookingReference::for_booking(booking_id),
            flight_id,
            user_id,
            total_amount,
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            passengers,
        }
    }

    /// Email of the passenger who receives booking notifications.
    pub fn contact(&self) -> Option<&Passenger> {
        self.passengers.first()
    }

    /// Seat numbers of every passenger on this booking.
    pub fn seat_numbers(&self) -> Vec<SeatNumber> {
        self.passengers.iter().map(|p| p.seat_number.clone()).collect()
    }

    /// Pending → Confirmed.
    pub fn confirm(&mut self) -> Result<()> {
        self.transition(BookingStatus::Confirmed)
    }

    /// Pending → Cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(BookingStatus::Cancelled)
    }

    fn transition(&mut self, to: BookingStatus) -> Result<()> {
        if self.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
