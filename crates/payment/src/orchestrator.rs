//! The payment lifecycle driver.
//!
//! Payments are created from `payment-request` events, initiated when
//! the passenger opens checkout, and settled by verifying the signed
//! provider callback. Every settlement, success or failure, is
//! announced on `payment-outcome` so the booking saga can resume.
//! `booking-failure` events trigger the refund compensation.

use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, Notifier, RetryPolicy};
use messaging::events::{
    BookingFailure, PaymentOutcome, PaymentOutcomeStatus, PaymentRequested, PaymentVerification,
};
use messaging::{Envelope, EventBus, EventHandler, MessagingError, Topic};

use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;
use crate::payment::{Payment, PaymentStatus};
use crate::store::PaymentStore;

/// Drives a payment from request to a terminal state.
pub struct PaymentOrchestrator {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    bus: Arc<dyn EventBus>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

impl PaymentOrchestrator {
    /// Creates a payment orchestrator with the default verification
    /// retry schedule (3 attempts, 2s base delay, doubling).
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        bus: Arc<dyn EventBus>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            payments,
            gateway,
            bus,
            notifier,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the verification retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Creates the payment record for a booking. Idempotent: redelivered
    /// requests for a booking that already has a payment are dropped.
    #[tracing::instrument(skip(self, request), fields(booking_id = %request.booking_id))]
    pub async fn on_payment_request(&self, request: PaymentRequested) -> Result<()> {
        if let Some(existing) = self.payments.find_by_booking(request.booking_id).await? {
            tracing::info!(payment_id = %existing.id, "payment already exists, dropping duplicate request");
            return Ok(());
        }

        let payment = Payment::new(
            request.booking_id,
            request.user_id,
            request.amount,
            request.currency,
        );
        tracing::info!(payment_id = %payment.id, amount = %payment.amount, "payment created");
        self.payments.insert(payment).await?;
        metrics::counter!("payments_created_total").increment(1);
        Ok(())
    }

    /// Opens the checkout for a booking's payment: creates the provider
    /// order and records the contact email for status notifications.
    ///
    /// Re-entering an already-initiated checkout returns the stored
    /// payment unchanged; a booking whose payment already succeeded is a
    /// duplicate payment attempt and is rejected.
    #[tracing::instrument(skip(self, email))]
    pub async fn initiate(&self, booking_id: BookingId, email: &str) -> Result<Payment> {
        let mut payment = self
            .payments
            .find_by_booking(booking_id)
            .await?
            .ok_or_else(|| PaymentError::PaymentNotFound(format!("booking {booking_id}")))?;

        match payment.status {
            PaymentStatus::Success | PaymentStatus::Refunded => {
                return Err(PaymentError::DuplicatePayment(booking_id));
            }
            PaymentStatus::Initiated => {
                tracing::info!(payment_id = %payment.id, "checkout already open, returning existing order");
                return Ok(payment);
            }
            _ => {}
        }

        let receipt = format!("txn_{booking_id}");
        let order = self
            .gateway
            .create_order(payment.amount, &payment.currency, &receipt)
            .await?;

        payment.mark_initiated(order.order_id.clone())?;
        payment.email = Some(email.to_string());
        self.payments.update(payment.clone()).await?;

        tracing::info!(payment_id = %payment.id, order_id = %order.order_id, "payment initiated");
        metrics::counter!("payments_initiated_total").increment(1);
        Ok(payment)
    }

    /// Settles a payment from a provider checkout callback.
    ///
    /// The signature is checked through the gateway, retrying transient
    /// provider faults before committing to a verdict. A valid signature
    /// settles Success; an invalid one, or retries exhausted, settles
    /// Failed. Either way a `payment-outcome` is published.
    ///
    /// Callbacks for unknown orders are logged and dropped; a callback
    /// for an already-successful payment is a duplicate and is dropped.
    #[tracing::instrument(skip(self, verification), fields(order_id = %verification.order_id))]
    pub async fn verify(&self, verification: PaymentVerification) -> Result<()> {
        let Some(payment) = self
            .payments
            .find_by_provider_order(&verification.order_id)
            .await?
        else {
            tracing::error!(order_id = %verification.order_id, "verification for unknown order, dropping");
            metrics::counter!("payment_verification_orphans_total").increment(1);
            return Ok(());
        };

        match payment.status {
            PaymentStatus::Initiated => {}
            PaymentStatus::Success => {
                tracing::info!(payment_id = %payment.id, "payment already settled, dropping duplicate callback");
                return Ok(());
            }
            status => {
                tracing::warn!(payment_id = %payment.id, %status, "late callback for settled payment, dropping");
                return Ok(());
            }
        }

        let verdict = self
            .retry
            .run_if(
                || {
                    self.gateway.verify_signature(
                        &verification.order_id,
                        &verification.provider_payment_id,
                        &verification.signature,
                    )
                },
                |e| e.is_transient(),
            )
            .await;

        match verdict {
            Ok(true) => {
                self.settle_success(payment, verification.provider_payment_id.clone())
                    .await
            }
            Ok(false) => {
                tracing::warn!(payment_id = %payment.id, "invalid payment signature");
                metrics::counter!("payment_signature_failures_total").increment(1);
                self.settle_failed(payment).await
            }
            Err(e) => {
                tracing::error!(payment_id = %payment.id, error = %e, "verification attempts exhausted, settling as failed");
                self.settle_failed(payment).await
            }
        }
    }

    /// Refunds the successful payment of a failed booking.
    ///
    /// A refund request for a booking without a successful payment is a
    /// data-integrity alarm and fails loudly. A refund that the provider
    /// rejects is surfaced for manual intervention, never retried here.
    #[tracing::instrument(skip(self))]
    pub async fn refund(&self, booking_id: BookingId) -> Result<()> {
        let payment = self.payments.find_by_booking(booking_id).await?;

        let mut payment = match payment {
            Some(p) if p.status == PaymentStatus::Refunded => {
                tracing::info!(payment_id = %p.id, "already refunded, dropping duplicate compensation");
                return Ok(());
            }
            Some(p) if p.status == PaymentStatus::Success => p,
            _ => {
                tracing::error!(%booking_id, "refund requested but no successful payment exists");
                metrics::counter!("refund_integrity_failures_total").increment(1);
                return Err(PaymentError::RefundWithoutPayment(booking_id));
            }
        };

        let Some(provider_payment_id) = payment.provider_payment_id.clone() else {
            tracing::error!(payment_id = %payment.id, "successful payment has no provider payment id");
            return Err(PaymentError::RefundWithoutPayment(booking_id));
        };

        let refund_id = match self.gateway.refund(&provider_payment_id, payment.amount).await {
            Ok(refund_id) => refund_id,
            Err(e) => {
                tracing::error!(payment_id = %payment.id, error = %e, "refund failed, manual intervention required");
                metrics::counter!("refunds_failed_total").increment(1);
                return Err(e.into());
            }
        };

        payment.mark_refunded()?;
        self.payments.update(payment.clone()).await?;

        if let Some(email) = &payment.email {
            self.notifier
                .payment_status(email, "REFUNDED", payment.booking_id, payment.amount)
                .await;
        }

        tracing::info!(payment_id = %payment.id, %refund_id, "payment refunded");
        metrics::counter!("refunds_total").increment(1);
        Ok(())
    }

    pub(crate) async fn settle_success(
        &self,
        mut payment: Payment,
        provider_payment_id: String,
    ) -> Result<()> {
        payment.mark_success(provider_payment_id.clone())?;
        self.payments.update(payment.clone()).await?;

        let outcome = PaymentOutcome {
            booking_id: payment.booking_id,
            status: PaymentOutcomeStatus::Success,
            transaction_id: Some(provider_payment_id),
        };
        self.bus.publish(outcome.envelope()?).await?;

        if let Some(email) = &payment.email {
            self.notifier
                .payment_status(email, "SUCCESS", payment.booking_id, payment.amount)
                .await;
        }

        tracing::info!(payment_id = %payment.id, "payment succeeded");
        metrics::counter!("payments_succeeded_total").increment(1);
        Ok(())
    }

    pub(crate) async fn settle_failed(&self, mut payment: Payment) -> Result<()> {
        payment.mark_failed()?;
        self.payments.update(payment.clone()).await?;

        let outcome = PaymentOutcome {
            booking_id: payment.booking_id,
            status: PaymentOutcomeStatus::Failed,
            transaction_id: None,
        };
        self.bus.publish(outcome.envelope()?).await?;

        if let Some(email) = &payment.email {
            self.notifier
                .payment_status(email, "FAILED", payment.booking_id, payment.amount)
                .await;
        }

        tracing::warn!(payment_id = %payment.id, "payment failed");
        metrics::counter!("payments_failed_total").increment(1);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for PaymentOrchestrator {
    async fn handle(&self, envelope: Envelope) -> messaging::error::Result<()> {
        match envelope.topic {
            Topic::PaymentRequest => {
                let request: PaymentRequested = envelope.decode()?;
                self.on_payment_request(request)
                    .await
                    .map_err(MessagingError::handler)
            }
            Topic::PaymentVerification => {
                let verification: PaymentVerification = envelope.decode()?;
                self.verify(verification).await.map_err(MessagingError::handler)
            }
            Topic::BookingFailure => {
                let failure: BookingFailure = envelope.decode()?;
                self.refund(failure.booking_id)
                    .await
                    .map_err(MessagingError::handler)
            }
            other => {
                tracing::warn!(topic = %other, "payment orchestrator received unexpected topic");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use common::{Money, RecordingNotifier, UserId};
    use messaging::InMemoryEventBus;

    use crate::gateway::InMemoryPaymentGateway;
    use crate::store::InMemoryPaymentStore;

    #[derive(Clone, Default)]
    struct Collecting {
        seen: Arc<Mutex<Vec<Envelope>>>,
    }

    #[async_trait]
    impl EventHandler for Collecting {
        async fn handle(&self, envelope: Envelope) -> messaging::error::Result<()> {
            self.seen.lock().unwrap().push(envelope);
            Ok(())
        }
    }

    struct Fixture {
        orchestrator: PaymentOrchestrator,
        payments: InMemoryPaymentStore,
        gateway: InMemoryPaymentGateway,
        bus: InMemoryEventBus,
        notifier: RecordingNotifier,
        outcomes: Collecting,
    }

    fn fixture() -> Fixture {
        let payments = InMemoryPaymentStore::new();
        let gateway = InMemoryPaymentGateway::new();
        let bus = InMemoryEventBus::new();
        let notifier = RecordingNotifier::new();

        let outcomes = Collecting::default();
        bus.subscribe(Topic::PaymentOutcome, Arc::new(outcomes.clone()));

        let orchestrator = PaymentOrchestrator::new(
            Arc::new(payments.clone()),
            Arc::new(gateway.clone()),
            Arc::new(bus.clone()),
            Arc::new(notifier.clone()),
        )
        .with_retry_policy(RetryPolicy::immediate(3));

        Fixture {
            orchestrator,
            payments,
            gateway,
            bus,
            notifier,
            outcomes,
        }
    }

    fn request(booking_id: BookingId) -> PaymentRequested {
        PaymentRequested {
            booking_id,
            user_id: UserId::new(),
            amount: Money::from_major(300),
            currency: "INR".to_string(),
        }
    }

    async fn initiated(f: &Fixture) -> (BookingId, Payment) {
        let booking_id = BookingId::new();
        f.orchestrator.on_payment_request(request(booking_id)).await.unwrap();
        let payment = f
            .orchestrator
            .initiate(booking_id, "asha@example.com")
            .await
            .unwrap();
        (booking_id, payment)
    }

    #[tokio::test]
    async fn test_duplicate_payment_request_is_dropped() {
        let f = fixture();
        let booking_id = BookingId::new();

        f.orchestrator.on_payment_request(request(booking_id)).await.unwrap();
        f.orchestrator.on_payment_request(request(booking_id)).await.unwrap();

        assert_eq!(f.payments.payment_count().await, 1);
    }

    #[tokio::test]
    async fn test_initiate_creates_provider_order() {
        let f = fixture();
        let (booking_id, payment) = initiated(&f).await;

        assert_eq!(payment.status, PaymentStatus::Initiated);
        assert_eq!(payment.email.as_deref(), Some("asha@example.com"));
        assert!(payment.provider_order_id.is_some());
        assert_eq!(f.gateway.order_count(), 1);

        // Re-entering checkout reuses the existing order.
        let again = f
            .orchestrator
            .initiate(booking_id, "asha@example.com")
            .await
            .unwrap();
        assert_eq!(again.provider_order_id, payment.provider_order_id);
        assert_eq!(f.gateway.order_count(), 1);
    }

    #[tokio::test]
    async fn test_initiate_unknown_booking_fails() {
        let f = fixture();
        let result = f.orchestrator.initiate(BookingId::new(), "a@example.com").await;
        assert!(matches!(result, Err(PaymentError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn test_valid_callback_settles_success() {
        let f = fixture();
        let (booking_id, payment) = initiated(&f).await;
        let order_id = payment.provider_order_id.unwrap();
        let (provider_payment_id, signature) = f.gateway.complete_checkout(&order_id).unwrap();

        f.orchestrator
            .verify(PaymentVerification {
                order_id,
                provider_payment_id: provider_payment_id.clone(),
                signature,
            })
            .await
            .unwrap();
        f.bus.quiesce().await;

        let stored = f.payments.find_by_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
        assert_eq!(stored.provider_payment_id, Some(provider_payment_id));

        let outcomes = f.outcomes.seen.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        let outcome: PaymentOutcome = outcomes[0].decode().unwrap();
        assert_eq!(outcome.status, PaymentOutcomeStatus::Success);
        assert!(f.notifier.any(|n| matches!(
            n,
            common::Notification::PaymentStatus { status, .. } if status == "SUCCESS"
        )));
    }

    #[tokio::test]
    async fn test_invalid_signature_settles_failed() {
        let f = fixture();
        let (booking_id, payment) = initiated(&f).await;
        let order_id = payment.provider_order_id.unwrap();
        let (provider_payment_id, _) = f.gateway.complete_checkout(&order_id).unwrap();

        f.orchestrator
            .verify(PaymentVerification {
                order_id,
                provider_payment_id,
                signature: "forged".to_string(),
            })
            .await
            .unwrap();
        f.bus.quiesce().await;

        let stored = f.payments.find_by_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);

        let outcomes = f.outcomes.seen.lock().unwrap();
        let outcome: PaymentOutcome = outcomes[0].decode().unwrap();
        assert_eq!(outcome.status, PaymentOutcomeStatus::Failed);
    }

    #[tokio::test]
    async fn test_transient_faults_are_retried_to_success() {
        let f = fixture();
        let (booking_id, payment) = initiated(&f).await;
        let order_id = payment.provider_order_id.unwrap();
        let (provider_payment_id, signature) = f.gateway.complete_checkout(&order_id).unwrap();

        // Two faults, three attempts: the third verifies.
        f.gateway.inject_transient_verification_faults(2);
        f.orchestrator
            .verify(PaymentVerification {
                order_id,
                provider_payment_id,
                signature,
            })
            .await
            .unwrap();

        let stored = f.payments.find_by_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_exhausted_retries_settle_failed() {
        let f = fixture();
        let (booking_id, payment) = initiated(&f).await;
        let order_id = payment.provider_order_id.unwrap();
        let (provider_payment_id, signature) = f.gateway.complete_checkout(&order_id).unwrap();

        f.gateway.inject_transient_verification_faults(5);
        f.orchestrator
            .verify(PaymentVerification {
                order_id,
                provider_payment_id,
                signature,
            })
            .await
            .unwrap();

        let stored = f.payments.find_by_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_duplicate_callback_is_dropped() {
        let f = fixture();
        let (_, payment) = initiated(&f).await;
        let order_id = payment.provider_order_id.unwrap();
        let (provider_payment_id, signature) = f.gateway.complete_checkout(&order_id).unwrap();

        let verification = PaymentVerification {
            order_id,
            provider_payment_id,
            signature,
        };
        f.orchestrator.verify(verification.clone()).await.unwrap();
        f.orchestrator.verify(verification).await.unwrap();
        f.bus.quiesce().await;

        // One outcome, one notification.
        assert_eq!(f.outcomes.seen.lock().unwrap().len(), 1);
        assert_eq!(f.notifier.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_refund_compensates_successful_payment() {
        let f = fixture();
        let (booking_id, payment) = initiated(&f).await;
        let order_id = payment.provider_order_id.unwrap();
        let (provider_payment_id, signature) = f.gateway.complete_checkout(&order_id).unwrap();
        f.orchestrator
            .verify(PaymentVerification {
                order_id,
                provider_payment_id,
                signature,
            })
            .await
            .unwrap();

        f.orchestrator.refund(booking_id).await.unwrap();
        // Duplicate compensation is absorbed.
        f.orchestrator.refund(booking_id).await.unwrap();

        let stored = f.payments.find_by_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Refunded);
        assert!(f.notifier.any(|n| matches!(
            n,
            common::Notification::PaymentStatus { status, .. } if status == "REFUNDED"
        )));
    }

    #[tokio::test]
    async fn test_refund_without_successful_payment_fails_loudly() {
        let f = fixture();
        let result = f.orchestrator.refund(BookingId::new()).await;
        assert!(matches!(result, Err(PaymentError::RefundWithoutPayment(_))));

        // An initiated-but-unsettled payment is not refundable either.
        let (booking_id, _) = initiated(&f).await;
        let result = f.orchestrator.refund(booking_id).await;
        assert!(matches!(result, Err(PaymentError::RefundWithoutPayment(_))));
    }

    #[tokio::test]
    async fn test_rejected_refund_leaves_payment_success() {
        let f = fixture();
        let (booking_id, payment) = initiated(&f).await;
        let order_id = payment.provider_order_id.unwrap();
        let (provider_payment_id, signature) = f.gateway.complete_checkout(&order_id).unwrap();
        f.orchestrator
            .verify(PaymentVerification {
                order_id,
                provider_payment_id,
                signature,
            })
            .await
            .unwrap();

        f.gateway.set_refunds_failing(true);
        let result = f.orchestrator.refund(booking_id).await;
        assert!(matches!(result, Err(PaymentError::Gateway(_))));

        let stored = f.payments.find_by_booking(booking_id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Success);
    }
}
