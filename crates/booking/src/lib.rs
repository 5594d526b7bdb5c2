//! Booking side of the seat booking saga.
//!
//! A booking request locks its seats, persists a pending booking with a
//! server-computed fare and hands off to the payment side through the
//! bus. The saga resumes on the payment outcome: confirmation on
//! success, compensation (seat release, cancellation, refund trigger)
//! on failure.

pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod pricing;
pub mod store;

pub use domain::{Booking, BookingReference, BookingStatus, Luggage, Passenger};
pub use error::{BookingError, Result};
pub use orchestrator::BookingOrchestrator;
pub use store::{BookingStore, InMemoryBookingStore};
