//! Outbound user notification capability.
//!
//! Message content and delivery (email, SMS) live outside this system;
//! orchestrators only depend on this trait. Delivery is best effort:
//! implementations log failures rather than propagate them, since a
//! missed notice must never abort a saga step.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::types::{BookingId, Money};

/// A notification emitted on a terminal booking or payment transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Booking confirmed, ticket on its way.
    BookingConfirmed {
        email: String,
        first_name: String,
        booking_id: BookingId,
    },
    /// Booking failed with a user-facing reason.
    BookingFailed {
        email: String,
        first_name: String,
        reason: String,
    },
    /// Payment reached a terminal status (SUCCESS, FAILED, REFUNDED).
    PaymentStatus {
        email: String,
        status: String,
        booking_id: BookingId,
        amount: Money,
    },
}

/// Trait for sending user notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Notifies the user that their booking is confirmed.
    async fn booking_confirmed(&self, email: &str, first_name: &str, booking_id: BookingId);

    /// Notifies the user that their booking failed, with the reason.
    async fn booking_failed(&self, email: &str, first_name: &str, reason: &str);

    /// Notifies the user of a terminal payment status.
    async fn payment_status(&self, email: &str, status: &str, booking_id: BookingId, amount: Money);
}

/// In-memory notifier that records every notification, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl RecordingNotifier {
    /// Creates a new recording notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything sent so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().unwrap().clone()
    }

    /// Returns the number of notifications sent.
    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }

    /// Returns true if any recorded notification satisfies `pred`.
    pub fn any(&self, pred: impl Fn(&Notification) -> bool) -> bool {
        self.sent.read().unwrap().iter().any(pred)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn booking_confirmed(&self, email: &str, first_name: &str, booking_id: BookingId) {
        self.sent.write().unwrap().push(Notification::BookingConfirmed {
            email: email.to_string(),
            first_name: first_name.to_string(),
            booking_id,
        });
    }

    async fn booking_failed(&self, email: &str, first_name: &str, reason: &str) {
        self.sent.write().unwrap().push(Notification::BookingFailed {
            email: email.to_string(),
            first_name: first_name.to_string(),
            reason: reason.to_string(),
        });
    }

    async fn payment_status(
        &self,
        email: &str,
        status: &str,
        booking_id: BookingId,
        amount: Money,
    ) {
        self.sent.write().unwrap().push(Notification::PaymentStatus {
            email: email.to_string(),
            status: status.to_string(),
            booking_id,
            amount,
        });
    }
}
