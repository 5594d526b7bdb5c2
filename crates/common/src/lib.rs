//! Shared building blocks for the booking system.
//!
//! This crate provides:
//! - Typed identifiers (BookingId, PaymentId, FlightId, UserId, SeatNumber)
//! - Money represented in integer cents
//! - An explicit RetryPolicy with bounded attempts and exponential backoff
//! - The Notifier capability trait for outbound user notifications

pub mod notify;
pub mod retry;
pub mod types;

pub use notify::{Notification, Notifier, RecordingNotifier};
pub use retry::RetryPolicy;
pub use types::{BookingId, FlightId, Money, PaymentId, SeatNumber, UserId};
