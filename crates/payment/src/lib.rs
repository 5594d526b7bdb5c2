//! Payment side of the seat booking saga.
//!
//! Payments are created from `payment-request` events, initiated
//! against an external provider, verified through signed callbacks and,
//! when a booking fails after a successful charge, refunded as the
//! saga's compensation. A periodic reconciliation sweeper resolves
//! payments left hanging by lost callbacks, so every payment reaches a
//! terminal state eventually.

pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod payment;
pub mod store;
pub mod sweeper;

pub use error::{PaymentError, Result};
pub use gateway::{
    GatewayError, InMemoryPaymentGateway, PaymentGateway, ProviderOrder, ProviderOrderStatus,
};
pub use orchestrator::PaymentOrchestrator;
pub use payment::{Payment, PaymentStatus};
pub use store::{InMemoryPaymentStore, PaymentStore};
pub use sweeper::{DEFAULT_RECONCILIATION_INTERVAL, ReconciliationSweeper, SweepReport};
