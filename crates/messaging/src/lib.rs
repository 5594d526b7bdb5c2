//! Asynchronous message fabric connecting the booking services.
//!
//! This crate defines the named channels (topics), their typed payloads,
//! and an in-memory [`EventBus`] with partitioned, per-key ordered
//! delivery. The delivery contract is at-least-once: consumers are
//! expected to be idempotent, and correctness never depends on
//! exactly-once transport guarantees.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod events;
pub mod topic;

pub use bus::{EventBus, EventHandler, InMemoryEventBus};
pub use envelope::Envelope;
pub use error::MessagingError;
pub use events::{
    BookingFailure, BookingRequested, LuggageKind, LuggageSpec, PassengerSpec, PaymentOutcome,
    PaymentOutcomeStatus, PaymentRequested, PaymentVerification,
};
pub use topic::Topic;
