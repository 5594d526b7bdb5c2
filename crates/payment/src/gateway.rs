//! Provider gateway: the seam to the external payment provider.
//!
//! The trait mirrors the provider's client surface: hosted-checkout
//! orders, signature verification of checkout callbacks, refunds, and
//! order-status lookup for reconciliation. Errors are split into
//! transient (safe to retry) and permanent, which is what the
//! orchestrator's retry policy keys on.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider could not be reached or answered with a retryable
    /// fault. Safe to retry.
    #[error("Transient gateway error: {0}")]
    Transient(String),

    /// The provider rejected the request. Retrying will not help.
    #[error("Gateway error: {0}")]
    Permanent(String),
}

impl GatewayError {
    /// Returns true if retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }
}

/// Provider-side state of a checkout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderOrderStatus {
    /// Order created, checkout not opened or abandoned early.
    Created,
    /// Checkout attempted but the charge did not go through.
    Attempted,
    /// Charge captured.
    Paid,
}

impl ProviderOrderStatus {
    /// Returns the provider's wire name for the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderOrderStatus::Created => "created",
            ProviderOrderStatus::Attempted => "attempted",
            ProviderOrderStatus::Paid => "paid",
        }
    }
}

impl std::fmt::Display for ProviderOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A checkout order held at the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub order_id: String,
    pub amount: Money,
    pub currency: String,
    pub receipt: String,
    pub status: ProviderOrderStatus,
}

/// Client for the external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a hosted-checkout order for the given amount.
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<ProviderOrder, GatewayError>;

    /// Verifies the provider's signature over a checkout callback.
    /// `Ok(false)` means the signature is genuinely invalid, not a
    /// provider fault.
    async fn verify_signature(
        &self,
        order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError>;

    /// Refunds a captured payment. Returns the provider refund id.
    async fn refund(&self, provider_payment_id: &str, amount: Money)
    -> Result<String, GatewayError>;

    /// Fetches the provider's view of an order, the ground truth used
    /// by reconciliation.
    async fn fetch_order_status(&self, order_id: &str)
    -> Result<ProviderOrderStatus, GatewayError>;
}

#[derive(Debug)]
struct GatewayState {
    secret: String,
    orders: RwLock<HashMap<String, ProviderOrder>>,
    order_seq: AtomicU64,
    payment_seq: AtomicU64,
    refund_seq: AtomicU64,
    transient_verify_faults: AtomicU32,
    refunds_failing: AtomicBool,
    lookups_failing: AtomicBool,
}

/// In-memory provider double with deterministic signatures.
///
/// `complete_checkout` plays the passenger finishing the hosted
/// checkout, returning the payment id and signature the real provider
/// would post back. Failure injection covers transient verification
/// faults, refund rejection and status-lookup outage.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    state: Arc<GatewayState>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway with a default signing secret.
    pub fn new() -> Self {
        Self::with_secret("gw_secret")
    }

    /// Creates a gateway signing with the given secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            state: Arc::new(GatewayState {
                secret: secret.into(),
                orders: RwLock::new(HashMap::new()),
                order_seq: AtomicU64::new(1),
                payment_seq: AtomicU64::new(1),
                refund_seq: AtomicU64::new(1),
                transient_verify_faults: AtomicU32::new(0),
                refunds_failing: AtomicBool::new(false),
                lookups_failing: AtomicBool::new(false),
            }),
        }
    }

    /// Simulates the passenger completing the checkout for an order.
    /// The order becomes `paid` and the returned pair verifies.
    pub fn complete_checkout(&self, order_id: &str) -> Result<(String, String), GatewayError> {
        let mut orders = self.state.orders.write().unwrap();
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::Permanent(format!("unknown order {order_id}")))?;
        order.status = ProviderOrderStatus::Paid;

        let n = self.state.payment_seq.fetch_add(1, Ordering::SeqCst);
        let payment_id = format!("pay_{n}");
        let signature = self.sign(order_id, &payment_id);
        Ok((payment_id, signature))
    }

    /// Forces an order into a provider-side status (abandoned or failed
    /// checkouts for reconciliation scenarios).
    pub fn set_order_status(&self, order_id: &str, status: ProviderOrderStatus) {
        if let Some(order) = self.state.orders.write().unwrap().get_mut(order_id) {
            order.status = status;
        }
    }

    /// The next `n` verification calls fail with a transient error.
    pub fn inject_transient_verification_faults(&self, n: u32) {
        self.state.transient_verify_faults.store(n, Ordering::SeqCst);
    }

    /// Makes every refund call fail until reset.
    pub fn set_refunds_failing(&self, failing: bool) {
        self.state.refunds_failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every order-status lookup fail until reset.
    pub fn set_lookups_failing(&self, failing: bool) {
        self.state.lookups_failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the number of orders created so far.
    pub fn order_count(&self) -> usize {
        self.state.orders.read().unwrap().len()
    }

    fn sign(&self, order_id: &str, provider_payment_id: &str) -> String {
        let mut hasher = DefaultHasher::new();
        self.state.secret.hash(&mut hasher);
        order_id.hash(&mut hasher);
        provider_payment_id.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        receipt: &str,
    ) -> Result<ProviderOrder, GatewayError> {
        let n = self.state.order_seq.fetch_add(1, Ordering::SeqCst);
        let order = ProviderOrder {
            order_id: format!("order_{n}"),
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
            status: ProviderOrderStatus::Created,
        };
        self.state
            .orders
            .write()
            .unwrap()
            .insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn verify_signature(
        &self,
        order_id: &str,
        provider_payment_id: &str,
        signature: &str,
    ) -> Result<bool, GatewayError> {
        let faults = &self.state.transient_verify_faults;
        if faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(GatewayError::Transient("provider timeout".to_string()));
        }

        Ok(self.sign(order_id, provider_payment_id) == signature)
    }

    async fn refund(
        &self,
        provider_payment_id: &str,
        _amount: Money,
    ) -> Result<String, GatewayError> {
        if self.state.refunds_failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Permanent(format!(
                "refund rejected for {provider_payment_id}"
            )));
        }
        let n = self.state.refund_seq.fetch_add(1, Ordering::SeqCst);
        Ok(format!("rfnd_{n}"))
    }

    async fn fetch_order_status(
        &self,
        order_id: &str,
    ) -> Result<ProviderOrderStatus, GatewayError> {
        if self.state.lookups_failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Transient("provider unreachable".to_string()));
        }
        let orders = self.state.orders.read().unwrap();
        orders
            .get(order_id)
            .map(|order| order.status)
            .ok_or_else(|| GatewayError::Permanent(format!("unknown order {order_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completed_checkout_verifies() {
        let gateway = InMemoryPaymentGateway::new();
        let order = gateway
            .create_order(Money::from_major(300), "INR", "txn_abc")
            .await
            .unwrap();

        let (payment_id, signature) = gateway.complete_checkout(&order.order_id).unwrap();
        assert!(gateway
            .verify_signature(&order.order_id, &payment_id, &signature)
            .await
            .unwrap());
        assert_eq!(
            gateway.fetch_order_status(&order.order_id).await.unwrap(),
            ProviderOrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_tampered_signature_is_invalid() {
        let gateway = InMemoryPaymentGateway::new();
        let order = gateway
            .create_order(Money::from_major(300), "INR", "txn_abc")
            .await
            .unwrap();
        let (payment_id, _) = gateway.complete_checkout(&order.order_id).unwrap();

        let valid = gateway
            .verify_signature(&order.order_id, &payment_id, "forged")
            .await
            .unwrap();
        assert!(!valid);
    }

    #[tokio::test]
    async fn test_injected_faults_are_transient_and_bounded() {
        let gateway = InMemoryPaymentGateway::new();
        let order = gateway
            .create_order(Money::from_major(300), "INR", "txn_abc")
            .await
            .unwrap();
        let (payment_id, signature) = gateway.complete_checkout(&order.order_id).unwrap();

        gateway.inject_transient_verification_faults(2);
        for _ in 0..2 {
            let err = gateway
                .verify_signature(&order.order_id, &payment_id, &signature)
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }
        // Faults exhausted, verification works again.
        assert!(gateway
            .verify_signature(&order.order_id, &payment_id, &signature)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_order_status_is_permanent() {
        let gateway = InMemoryPaymentGateway::new();
        let err = gateway.fetch_order_status("order_nope").await.unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_refund_failure_injection() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_refunds_failing(true);
        assert!(gateway.refund("pay_1", Money::from_major(300)).await.is_err());

        gateway.set_refunds_failing(false);
        let refund_id = gateway.refund("pay_1", Money::from_major(300)).await.unwrap();
        assert!(refund_id.starts_with("rfnd_"));
    }
}
