//! The payment record and its lifecycle.

use chrono::{DateTime, Utc};
use common::{BookingId, Money, PaymentId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Lifecycle state of a payment.
///
/// ```text
/// PendingInitiation ──► Initiated ──► Success ──► Refunded
///                           │
///                           └───────► Failed
/// ```
///
/// Failed and Refunded are terminal. Success leaves only through the
/// explicit refund compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Created from a payment request; no provider order yet.
    PendingInitiation,
    /// Provider order created, awaiting the checkout callback.
    Initiated,
    /// Signature verified, money captured.
    Success,
    /// Verification failed or the provider declined.
    Failed,
    /// Compensated after a booking failure.
    Refunded,
}

impl PaymentStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::PendingInitiation => "PENDING_INITIATION",
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment for a booking.
///
/// The amount is always the server-computed fare carried on the payment
/// request; nothing client-supplied ever reaches this record. At most
/// one payment exists per booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub user_id: UserId,
    /// Contact for payment notifications, captured at initiation.
    pub email: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    /// Provider order id, set at initiation. Unique once assigned.
    pub provider_order_id: Option<String>,
    /// Provider payment id, set on success.
    pub provider_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a payment awaiting initiation.
    pub fn new(booking_id: BookingId, user_id: UserId, amount: Money, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            booking_id,
            user_id,
            email: None,
            amount,
            currency,
            status: PaymentStatus::PendingInitiation,
            provider_order_id: None,
            provider_payment_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// PendingInitiation → Initiated, recording the provider order.
    pub fn mark_initiated(&mut self, provider_order_id: String) -> Result<()> {
        self.guard(PaymentStatus::PendingInitiation, PaymentStatus::Initiated)?;
        self.provider_order_id = Some(provider_order_id);
        self.touch(PaymentStatus::Initiated);
        Ok(())
    }

    /// Initiated → Success, recording the provider payment id.
    pub fn mark_success(&mut self, provider_payment_id: String) -> Result<()> {
        self.guard(PaymentStatus::Initiated, PaymentStatus::Success)?;
        self.provider_payment_id = Some(provider_payment_id);
        self.touch(PaymentStatus::Success);
        Ok(())
    }

    /// Initiated → Failed.
    pub fn mark_failed(&mut self) -> Result<()> {
        self.guard(PaymentStatus::Initiated, PaymentStatus::Failed)?;
        self.touch(PaymentStatus::Failed);
        Ok(())
    }

    /// Success → Refunded.
    pub fn mark_refunded(&mut self) -> Result<()> {
        self.guard(PaymentStatus::Success, PaymentStatus::Refunded)?;
        self.touch(PaymentStatus::Refunded);
        Ok(())
    }

    fn guard(&self, from: PaymentStatus, to: PaymentStatus) -> Result<()> {
        if self.status != from {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    fn touch(&mut self, status: PaymentStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
