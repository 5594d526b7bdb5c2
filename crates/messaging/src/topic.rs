//! Named message channels.

use serde::{Deserialize, Serialize};

/// The channels connecting the booking, flight and payment services.
///
/// Each topic carries exactly one event type and is keyed so that
/// events for the same booking/payment/order are delivered in publish
/// order (see [`crate::bus`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Incoming booking requests, keyed by user id.
    BookingRequest,

    /// Server-priced payment requests, keyed by booking id.
    PaymentRequest,

    /// Provider callback verifications, keyed by provider order id.
    PaymentVerification,

    /// Terminal payment outcomes, keyed by booking id.
    PaymentOutcome,

    /// Refund triggers for bookings that failed after payment, keyed by
    /// booking id.
    BookingFailure,
}

impl Topic {
    /// Returns the channel name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::BookingRequest => "booking-request",
            Topic::PaymentRequest => "payment-request",
            Topic::PaymentVerification => "payment-verification",
            Topic::PaymentOutcome => "payment-outcome",
            Topic::BookingFailure => "booking-failure",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names() {
        assert_eq!(Topic::BookingRequest.as_str(), "booking-request");
        assert_eq!(Topic::PaymentRequest.as_str(), "payment-request");
        assert_eq!(Topic::PaymentVerification.as_str(), "payment-verification");
        assert_eq!(Topic::PaymentOutcome.as_str(), "payment-outcome");
        assert_eq!(Topic::BookingFailure.as_str(), "booking-failure");
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(Topic::PaymentOutcome.to_string(), "payment-outcome");
    }
}
