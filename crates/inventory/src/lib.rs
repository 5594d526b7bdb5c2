//! Seat-side services: the distributed seat lock and the authoritative
//! seat inventory.
//!
//! The lock store is a TTL-based mutual exclusion primitive with no
//! knowledge of bookings. The inventory owns persistent seat state and
//! guards concurrent confirmation with optimistic versioning — retries,
//! not locks, resolve racing confirms.

pub mod error;
pub mod lock;
pub mod seat;
pub mod service;
pub mod store;

pub use error::InventoryError;
pub use lock::{DEFAULT_LOCK_TTL, InMemorySeatLockStore, LockError, SeatLockStore};
pub use seat::{Seat, SeatStatus, SeatType, SeatView};
pub use service::SeatInventory;
pub use store::{InMemorySeatStore, SeatStore};
