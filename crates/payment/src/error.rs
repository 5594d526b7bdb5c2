//! Payment error types.

use common::BookingId;
use messaging::MessagingError;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::payment::PaymentStatus;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No payment record matches the lookup.
    #[error("Payment not found for {0}")]
    PaymentNotFound(String),

    /// The booking has already been paid for.
    #[error("Booking {0} already has a successful payment")]
    DuplicatePayment(BookingId),

    /// A refund was requested for a booking without a successful
    /// payment. This is a data-integrity alarm, not a user error.
    #[error("Refund requested for booking {0} with no successful payment")]
    RefundWithoutPayment(BookingId),

    /// The payment cannot move between these states.
    #[error("Payment cannot transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Provider gateway error.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Event bus error.
    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

/// Convenience type alias for payment results.
pub type Result<T> = std::result::Result<T, PaymentError>;
