//! Typed payloads for each channel.

use common::{BookingId, FlightId, Money, SeatNumber, UserId};
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::Result;
use crate::topic::Topic;

/// Luggage category, priced at booking time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LuggageKind {
    /// Carry-on, free of charge.
    Cabin,
    /// Checked-in bag, fixed fee.
    Checked,
    /// Oversized item, higher fixed fee.
    Oversized,
}

/// A luggage item declared for a passenger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuggageSpec {
    /// Category of the item.
    pub kind: LuggageKind,
    /// Declared weight in kilograms.
    pub weight_kg: f64,
}

/// A passenger in a booking request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerSpec {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// The seat this passenger wants.
    pub seat_number: SeatNumber,
    /// Declared luggage, may be empty.
    #[serde(default)]
    pub luggage: Vec<LuggageSpec>,
}

/// `booking-request`: a client asks for seats on a flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequested {
    pub flight_id: FlightId,
    pub user_id: UserId,
    pub passengers: Vec<PassengerSpec>,
}

impl BookingRequested {
    /// Wraps the event in an envelope keyed by user id.
    pub fn envelope(&self) -> Result<Envelope> {
        Envelope::new(Topic::BookingRequest, self.user_id.to_string(), self)
    }
}

/// `payment-request`: the booking side asks for a payment with the
/// server-computed amount. The client-supplied amount is never used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequested {
    pub booking_id: BookingId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: String,
}

impl PaymentRequested {
    /// Wraps the event in an envelope keyed by booking id.
    pub fn envelope(&self) -> Result<Envelope> {
        Envelope::new(Topic::PaymentRequest, self.booking_id.to_string(), self)
    }
}

/// `payment-verification`: provider callback details to be verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerification {
    /// The provider order id the payment was made against.
    pub order_id: String,
    /// The provider's payment id.
    pub provider_payment_id: String,
    /// The provider's cryptographic signature over the pair above.
    pub signature: String,
}

impl PaymentVerification {
    /// Wraps the event in an envelope keyed by provider order id.
    pub fn envelope(&self) -> Result<Envelope> {
        Envelope::new(Topic::PaymentVerification, self.order_id.clone(), self)
    }
}

/// Terminal status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentOutcomeStatus {
    Success,
    Failed,
}

impl PaymentOutcomeStatus {
    /// Returns the status name as used in notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcomeStatus::Success => "SUCCESS",
            PaymentOutcomeStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentOutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `payment-outcome`: the payment side reports a terminal result for a
/// booking. The booking saga resumes on this event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub booking_id: BookingId,
    pub status: PaymentOutcomeStatus,
    /// Provider payment id for successful payments.
    pub transaction_id: Option<String>,
}

impl PaymentOutcome {
    /// Wraps the event in an envelope keyed by booking id.
    pub fn envelope(&self) -> Result<Envelope> {
        Envelope::new(Topic::PaymentOutcome, self.booking_id.to_string(), self)
    }
}

/// `booking-failure`: the booking could not be honored after a
/// successful payment; triggers the refund compensation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingFailure {
    pub booking_id: BookingId,
}

impl BookingFailure {
    /// Wraps the event in an envelope keyed by booking id.
    pub fn envelope(&self) -> Result<Envelope> {
        Envelope::new(Topic::BookingFailure, self.booking_id.to_string(), self)
    }
}
