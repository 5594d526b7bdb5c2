//! Payment persistence.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, PaymentId};
use tokio::sync::RwLock;

use crate::error::{PaymentError, Result};
use crate::payment::{Payment, PaymentStatus};

/// Storage for payment records.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a new payment.
    async fn insert(&self, payment: Payment) -> Result<()>;

    /// Looks up the payment for a booking. At most one exists.
    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<Payment>>;

    /// Looks up a payment by its provider order id.
    async fn find_by_provider_order(&self, provider_order_id: &str) -> Result<Option<Payment>>;

    /// Lists Initiated payments last touched at or before `cutoff`.
    /// Feeds the reconciliation sweep.
    async fn find_initiated_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>>;

    /// Replaces an existing payment.
    async fn update(&self, payment: Payment) -> Result<()>;
}

/// In-memory payment store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new empty payment store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.len()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        self.payments.write().await.insert(payment.id, payment);
        Ok(())
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.values().find(|p| p.booking_id == booking_id).cloned())
    }

    async fn find_by_provider_order(&self, provider_order_id: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments
            .values()
            .find(|p| p.provider_order_id.as_deref() == Some(provider_order_id))
            .cloned())
    }

    async fn find_initiated_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>> {
        let payments = self.payments.read().await;
        let mut stale: Vec<Payment> = payments
            .values()
            .filter(|p| p.status == PaymentStatus::Initiated && p.updated_at <= cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|p| p.updated_at);
        Ok(stale)
    }

    async fn update(&self, payment: Payment) -> Result<()> {
        let mut payments = self.payments.write().await;
        if !payments.contains_key(&payment.id) {
            return Err(PaymentError::PaymentNotFound(payment.id.to_string()));
        }
        payments.insert(payment.id, payment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{Money, UserId};

    fn payment() -> Payment {
        Payment::new(
            BookingId::new(),
            UserId::new(),
            Money::from_major(150),
            "INR".to_string(),
        )
    }

    #[tokio::test]
    async fn test_find_by_booking() {
        let store = InMemoryPaymentStore::new();
        let p = payment();
        let booking_id = p.booking_id;
        store.insert(p.clone()).await.unwrap();

        assert_eq!(store.find_by_booking(booking_id).await.unwrap(), Some(p));
        assert_eq!(store.find_by_booking(BookingId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_by_provider_order() {
        let store = InMemoryPaymentStore::new();
        let mut p = payment();
        p.mark_initiated("order_42".to_string()).unwrap();
        store.insert(p.clone()).await.unwrap();

        let found = store.find_by_provider_order("order_42").await.unwrap();
        assert_eq!(found, Some(p));
        assert!(store.find_by_provider_order("order_nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_initiated_before_skips_fresh_and_terminal() {
        let store = InMemoryPaymentStore::new();

        let mut stale = payment();
        stale.mark_initiated("order_1".to_string()).unwrap();
        stale.updated_at = Utc::now() - Duration::minutes(30);
        store.insert(stale.clone()).await.unwrap();

        let mut fresh = payment();
        fresh.mark_initiated("order_2".to_string()).unwrap();
        store.insert(fresh).await.unwrap();

        let mut settled = payment();
        settled.mark_initiated("order_3".to_string()).unwrap();
        settled.mark_success("pay_3".to_string()).unwrap();
        settled.updated_at = Utc::now() - Duration::minutes(30);
        store.insert(settled).await.unwrap();

        let cutoff = Utc::now() - Duration::minutes(15);
        let found = store.find_initiated_before(cutoff).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stale.id);
    }

    #[tokio::test]
    async fn test_update_missing_payment_fails() {
        let store = InMemoryPaymentStore::new();
        let result = store.update(payment()).await;
        assert!(matches!(result, Err(PaymentError::PaymentNotFound(_))));
    }
}
