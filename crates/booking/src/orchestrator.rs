//! The booking saga.
//!
//! ```text
//! booking-request ──► lock seats ──► Pending booking ──► payment-request
//!                        │
//!                        └─ any lock fails: release acquired, conflict
//!
//! payment-outcome(Success) ──► confirm seats ──► Confirmed
//!                                  │
//!                                  └─ any confirm fails: Cancelled,
//!                                     release locks, booking-failure
//! payment-outcome(Failed)  ──► release locks ──► Cancelled
//! ```
//!
//! Seat locks are acquired in seat-number order so two bookings
//! contending for overlapping seats can never deadlock: one of them
//! loses at the first shared seat and rolls back.

use std::sync::Arc;

use async_trait::async_trait;
use common::Notifier;
use inventory::{SeatInventory, SeatLockStore, SeatStore};
use messaging::events::{BookingFailure, BookingRequested, PaymentOutcome, PaymentOutcomeStatus, PaymentRequested};
use messaging::{Envelope, EventBus, EventHandler, MessagingError, Topic};

use crate::domain::{Booking, BookingStatus, Passenger};
use crate::error::{BookingError, Result};
use crate::pricing;
use crate::store::BookingStore;

/// Drives a booking from request to a terminal state.
pub struct BookingOrchestrator<L, S>
where
    L: SeatLockStore,
    S: SeatStore,
{
    inventory: SeatInventory<L, S>,
    bookings: Arc<dyn BookingStore>,
    bus: Arc<dyn EventBus>,
    notifier: Arc<dyn Notifier>,
}

impl<L, S> BookingOrchestrator<L, S>
where
    L: SeatLockStore,
    S: SeatStore,
{
    /// Creates a booking orchestrator.
    pub fn new(
        inventory: SeatInventory<L, S>,
        bookings: Arc<dyn BookingStore>,
        bus: Arc<dyn EventBus>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inventory,
            bookings,
            bus,
            notifier,
        }
    }

    /// Accepts a booking request: locks every requested seat, persists
    /// the booking as Pending with the server-computed fare, and queues
    /// the payment request. Returns as soon as the booking is queued;
    /// the outcome arrives later on the `payment-outcome` channel.
    ///
    /// All-or-nothing locking: if any seat cannot be locked, every lock
    /// taken so far is released and no booking record is created.
    #[tracing::instrument(skip(self, request), fields(flight_id = %request.flight_id, user_id = %request.user_id))]
    pub async fn process_booking(&self, request: BookingRequested) -> Result<common::BookingId> {
        if request.passengers.is_empty() {
            return Err(BookingError::EmptyBooking);
        }

        let mut seats: Vec<_> = request
            .passengers
            .iter()
            .map(|p| p.seat_number.clone())
            .collect();
        seats.sort();

        let mut acquired = Vec::with_capacity(seats.len());
        for seat in &seats {
            let locked = match self
                .inventory
                .lock_seat(request.flight_id, seat, request.user_id)
                .await
            {
                Ok(locked) => locked,
                Err(e) => {
                    self.release_locks(request.flight_id, &acquired).await;
                    return Err(e.into());
                }
            };

            if !locked {
                tracing::info!(%seat, "seat conflict, rolling back acquired locks");
                metrics::counter!("bookings_rejected_total", "reason" => "seat_conflict").increment(1);
                self.release_locks(request.flight_id, &acquired).await;
                return Err(BookingError::SeatConflict {
                    flight: request.flight_id,
                    seat: seat.clone(),
                });
            }
            acquired.push(seat.clone());
        }

        let total = pricing::quote(&request.passengers);
        let passengers: Vec<Passenger> =
            request.passengers.iter().map(Passenger::from_spec).collect();
        let booking = Booking::new(request.flight_id, request.user_id, passengers, total);
        let booking_id = booking.booking_id;
        let reference = booking.reference.clone();

        self.bookings.insert(booking).await?;

        let payment = PaymentRequested {
            booking_id,
            user_id: request.user_id,
            amount: total,
            currency: pricing::CURRENCY.to_string(),
        };
        self.bus.publish(payment.envelope()?).await?;

        tracing::info!(%booking_id, %reference, %total, "booking queued, awaiting payment");
        metrics::counter!("bookings_queued_total").increment(1);
        Ok(booking_id)
    }

    /// Resumes the saga on a payment outcome.
    ///
    /// Idempotent: outcomes for bookings already in a terminal state are
    /// dropped, which absorbs at-least-once redelivery. An outcome for
    /// an unknown booking is a data-integrity alarm and is dropped after
    /// logging, never dereferenced.
    #[tracing::instrument(skip(self), fields(booking_id = %outcome.booking_id, status = %outcome.status))]
    pub async fn on_payment_outcome(&self, outcome: PaymentOutcome) -> Result<()> {
        let Some(booking) = self.bookings.get(outcome.booking_id).await? else {
            tracing::error!(booking_id = %outcome.booking_id, "payment outcome for unknown booking, dropping");
            metrics::counter!("booking_outcome_orphans_total").increment(1);
            return Ok(());
        };

        if booking.status != BookingStatus::Pending {
            tracing::info!(status = %booking.status, "booking already settled, dropping duplicate outcome");
            return Ok(());
        }

        match outcome.status {
            PaymentOutcomeStatus::Success => self.confirm_booking(booking).await,
            PaymentOutcomeStatus::Failed => {
                self.cancel_booking(booking, "Payment failed", false).await
            }
        }
    }

    async fn confirm_booking(&self, mut booking: Booking) -> Result<()> {
        for seat in booking.seat_numbers() {
            if let Err(e) = self.inventory.confirm_seat(booking.flight_id, &seat).await {
                tracing::error!(%seat, error = %e, "seat confirmation failed after successful payment, compensating");
                return self
                    .cancel_booking(booking, "Could not honor the seat reservation", true)
                    .await;
            }
        }

        booking.confirm()?;
        self.bookings.update(booking.clone()).await?;

        if let Some(contact) = booking.contact() {
            self.notifier
                .booking_confirmed(&contact.email, &contact.first_name, booking.booking_id)
                .await;
        }

        tracing::info!(reference = %booking.reference, "booking confirmed");
        metrics::counter!("bookings_confirmed_total").increment(1);
        Ok(())
    }

    /// Terminal failure path. With `refund` set, a `booking-failure`
    /// event is published so the payment side refunds the charge.
    async fn cancel_booking(&self, mut booking: Booking, reason: &str, refund: bool) -> Result<()> {
        self.release_locks(booking.flight_id, &booking.seat_numbers())
            .await;

        booking.cancel()?;
        self.bookings.update(booking.clone()).await?;

        if refund {
            let failure = BookingFailure {
                booking_id: booking.booking_id,
            };
            self.bus.publish(failure.envelope()?).await?;
        }

        if let Some(contact) = booking.contact() {
            self.notifier
                .booking_failed(&contact.email, &contact.first_name, reason)
                .await;
        }

        tracing::warn!(reference = %booking.reference, reason, refund, "booking cancelled");
        metrics::counter!("bookings_cancelled_total").increment(1);
        Ok(())
    }

    /// Best-effort lock release: a failed release is logged and left to
    /// TTL expiry. Already-booked seats are untouched (the unlock is a
    /// no-op on them).
    async fn release_locks(&self, flight_id: common::FlightId, seats: &[common::SeatNumber]) {
        for seat in seats {
            if let Err(e) = self.inventory.unlock_seat(flight_id, seat).await {
                tracing::warn!(%seat, error = %e, "failed to release seat lock, TTL will expire it");
            }
        }
    }
}

#[async_trait]
impl<L, S> EventHandler for BookingOrchestrator<L, S>
where
    L: SeatLockStore + 'static,
    S: SeatStore + 'static,
{
    async fn handle(&self, envelope: Envelope) -> messaging::error::Result<()> {
        match envelope.topic {
            Topic::BookingRequest => {
                let request: BookingRequested = envelope.decode()?;
                match self.process_booking(request).await {
                    // Conflicts are normal outcomes with no caller to
                    // report to on this path; the user sees the seat map.
                    Ok(_) | Err(BookingError::SeatConflict { .. }) => Ok(()),
                    Err(e) => Err(MessagingError::handler(e)),
                }
            }
            Topic::PaymentOutcome => {
                let outcome: PaymentOutcome = envelope.decode()?;
                self.on_payment_outcome(outcome)
                    .await
                    .map_err(MessagingError::handler)
            }
            other => {
                tracing::warn!(topic = %other, "booking orchestrator received unexpected topic");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use common::{FlightId, Money, RecordingNotifier, UserId};
    use inventory::{InMemorySeatLockStore, InMemorySeatStore, Seat, SeatStatus, SeatType};
    use messaging::InMemoryEventBus;
    use messaging::events::PassengerSpec;

    use crate::store::InMemoryBookingStore;

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
        orchestrator: BookingOrchestrator<InMemorySeatLockStore, InMemorySeatStore>,
        locks: InMemorySeatLockStore,
        seats: InMemorySeatStore,
        bookings: InMemoryBookingStore,
        bus: InMemoryEventBus,
        notifier: RecordingNotifier,
        payment_requests: Collecting,
        booking_failures: Collecting,
        flight: FlightId,
    }

    async fn fixture() -> Fixture {
        let locks = InMemorySeatLockStore::new();
        let seats = InMemorySeatStore::new();
        let bookings = InMemoryBookingStore::new();
        let bus = InMemoryEventBus::new();
        let notifier = RecordingNotifier::new();
        let flight = FlightId::new();

        for s in ["12A", "12B", "14C"] {
            seats.insert(Seat::new(flight, s, SeatType::Economy)).await.unwrap();
        }

        let payment_requests = Collecting::default();
        let booking_failures = Collecting::default();
        bus.subscribe(Topic::PaymentRequest, Arc::new(payment_requests.clone()));
        bus.subscribe(Topic::BookingFailure, Arc::new(booking_failures.clone()));

        let orchestrator = BookingOrchestrator::new(
            SeatInventory::new(locks.clone(), seats.clone()),
            Arc::new(bookings.clone()),
            Arc::new(bus.clone()),
            Arc::new(notifier.clone()),
        );

        Fixture {
            orchestrator,
            locks,
            seats,
            bookings,
            bus,
            notifier,
            payment_requests,
            booking_failures,
            flight,
        }
    }

    fn request(flight: FlightId, user: UserId, seats: &[&str]) -> BookingRequested {
        BookingRequested {
            flight_id: flight,
            user_id: user,
            passengers: seats
                .iter()
                .map(|s| PassengerSpec {
                    first_name: "Asha".to_string(),
                    last_name: "Iyer".to_string(),
                    email: "asha@example.com".to_string(),
                    seat_number: (*s).into(),
                    luggage: Vec::new(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_process_booking_locks_seats_and_queues_payment() {
        let f = fixture().await;
        let user = UserId::new();

        let booking_id = f
            .orchestrator
            .process_booking(request(f.flight, user, &["12B", "12A"]))
            .await
            .unwrap();
        f.bus.quiesce().await;

        let booking = f.bookings.get(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_amount, Money::from_major(300));

        assert_eq!(f.locks.holder(f.flight, &"12A".into()), Some(user));
        assert_eq!(f.locks.holder(f.flight, &"12B".into()), Some(user));

        let published = f.payment_requests.seen.lock().unwrap();
        assert_eq!(published.len(), 1);
        let event: PaymentRequested = published[0].decode().unwrap();
        assert_eq!(event.booking_id, booking_id);
        assert_eq!(event.amount, Money::from_major(300));
        assert_eq!(event.currency, "INR");
    }

    #[tokio::test]
    async fn test_seat_conflict_rolls_back_all_locks() {
        let f = fixture().await;
        let rival = UserId::new();

        // "12A" is already held by someone else.
        assert!(f.locks.acquire(f.flight, &"12A".into(), rival).await.unwrap());

        let result = f
            .orchestrator
            .process_booking(request(f.flight, UserId::new(), &["12B", "12A"]))
            .await;
        assert!(matches!(result, Err(BookingError::SeatConflict { .. })));

        // No booking row, and "12B" was released again.
        assert_eq!(f.bookings.booking_count().await, 0);
        assert_eq!(f.locks.holder(f.flight, &"12B".into()), None);
        assert_eq!(f.locks.holder(f.flight, &"12A".into()), Some(rival));
        assert!(f.payment_requests.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let f = fixture().await;
        let result = f
            .orchestrator
            .process_booking(request(f.flight, UserId::new(), &[]))
            .await;
        assert!(matches!(result, Err(BookingError::EmptyBooking)));
    }

    #[tokio::test]
    async fn test_success_outcome_confirms_booking_and_seats() {
        let f = fixture().await;
        let booking_id = f
            .orchestrator
            .process_booking(request(f.flight, UserId::new(), &["12A", "12B"]))
            .await
            .unwrap();

        f.orchestrator
            .on_payment_outcome(PaymentOutcome {
                booking_id,
                status: PaymentOutcomeStatus::Success,
                transaction_id: Some("pay_1".to_string()),
            })
            .await
            .unwrap();

        let booking = f.bookings.get(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        for seat in ["12A", "12B"] {
            let stored = f.seats.get(f.flight, &seat.into()).await.unwrap().unwrap();
            assert_eq!(stored.status, SeatStatus::Booked);
        }
        assert_eq!(f.locks.live_lock_count(), 0);
        assert!(f.notifier.any(|n| matches!(
            n,
            common::Notification::BookingConfirmed { .. }
        )));
    }

    #[tokio::test]
    async fn test_duplicate_success_outcome_is_dropped() {
        let f = fixture().await;
        let booking_id = f
            .orchestrator
            .process_booking(request(f.flight, UserId::new(), &["12A"]))
            .await
            .unwrap();

        let outcome = PaymentOutcome {
            booking_id,
            status: PaymentOutcomeStatus::Success,
            transaction_id: Some("pay_1".to_string()),
        };
        f.orchestrator.on_payment_outcome(outcome.clone()).await.unwrap();
        f.orchestrator.on_payment_outcome(outcome).await.unwrap();

        let booking = f.bookings.get(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        // One confirmation notice, not two.
        assert_eq!(f.notifier.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_outcome_cancels_and_releases_locks() {
        let f = fixture().await;
        let booking_id = f
            .orchestrator
            .process_booking(request(f.flight, UserId::new(), &["12A", "12B"]))
            .await
            .unwrap();

        f.orchestrator
            .on_payment_outcome(PaymentOutcome {
                booking_id,
                status: PaymentOutcomeStatus::Failed,
                transaction_id: None,
            })
            .await
            .unwrap();
        f.bus.quiesce().await;

        let booking = f.bookings.get(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(f.locks.live_lock_count(), 0);
        // Seats are available again; no refund needed, no failure event.
        assert!(f.booking_failures.seen.lock().unwrap().is_empty());
        assert!(f.notifier.any(|n| matches!(
            n,
            common::Notification::BookingFailed { reason, .. } if reason == "Payment failed"
        )));
    }

    #[tokio::test]
    async fn test_failed_confirmation_compensates_and_triggers_refund() {
        let f = fixture().await;
        let booking_id = f
            .orchestrator
            .process_booking(request(f.flight, UserId::new(), &["12A", "12B"]))
            .await
            .unwrap();

        // "12B" goes out of service between payment and confirmation.
        let mut seat = f.seats.get(f.flight, &"12B".into()).await.unwrap().unwrap();
        seat.status = SeatStatus::Blocked;
        f.seats.update(seat).await.unwrap();

        f.orchestrator
            .on_payment_outcome(PaymentOutcome {
                booking_id,
                status: PaymentOutcomeStatus::Success,
                transaction_id: Some("pay_1".to_string()),
            })
            .await
            .unwrap();
        f.bus.quiesce().await;

        let booking = f.bookings.get(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);

        // "12A" was confirmed before the failure and stays sold; the
        // refund makes the passenger whole.
        let kept = f.seats.get(f.flight, &"12A".into()).await.unwrap().unwrap();
        assert_eq!(kept.status, SeatStatus::Booked);
        assert_eq!(f.locks.live_lock_count(), 0);

        let failures = f.booking_failures.seen.lock().unwrap();
        assert_eq!(failures.len(), 1);
        let failure: BookingFailure = failures[0].decode().unwrap();
        assert_eq!(failure.booking_id, booking_id);
    }

    #[tokio::test]
    async fn test_outcome_for_unknown_booking_is_dropped() {
        let f = fixture().await;
        // Must not error or create state.
        f.orchestrator
            .on_payment_outcome(PaymentOutcome {
                booking_id: common::BookingId::new(),
                status: PaymentOutcomeStatus::Success,
                transaction_id: None,
            })
            .await
            .unwrap();
        assert_eq!(f.bookings.booking_count().await, 0);
    }
}
