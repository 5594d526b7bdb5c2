//! Seat inventory service: the synchronous seat-side surface the
//! booking saga depends on.

use common::{FlightId, RetryPolicy, SeatNumber, UserId};

use crate::error::{InventoryError, Result};
use crate::lock::SeatLockStore;
use crate::seat::{Seat, SeatStatus, SeatView};
use crate::store::SeatStore;

/// Authoritative seat state combined with the live lock overlay.
///
/// Confirmation uses optimistic versioning: when two paths race to
/// confirm the same seat (a reconciliation-driven confirm against the
/// normal path), the loser re-reads and retries a bounded number of
/// times instead of taking a lock.
#[derive(Debug, Clone)]
pub struct SeatInventory<L, S>
where
    L: SeatLockStore,
    S: SeatStore,
{
    locks: L,
    seats: S,
    retry: RetryPolicy,
}

impl<L, S> SeatInventory<L, S>
where
    L: SeatLockStore,
    S: SeatStore,
{
    /// Creates a seat inventory service.
    ///
    /// Version conflicts are in-process races, so the default retry
    /// schedule has no backoff.
    pub fn new(locks: L, seats: S) -> Self {
        Self {
            locks,
            seats,
            retry: RetryPolicy::immediate(3),
        }
    }

    /// Overrides the confirm retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Locks a seat for a user ahead of booking.
    ///
    /// Returns `Ok(false)` when the seat is taken or the lock is held by
    /// someone else — a conflict the user resolves by picking another
    /// seat. An unreachable lock store fails the call (fail closed):
    /// booking without the lock risks selling a seat twice.
    #[tracing::instrument(skip(self))]
    pub async fn lock_seat(
        &self,
        flight_id: FlightId,
        seat_number: &SeatNumber,
        user_id: UserId,
    ) -> Result<bool> {
        let seat = self
            .seats
            .get(flight_id, seat_number)
            .await?
            .ok_or_else(|| InventoryError::SeatNotFound {
                flight: flight_id,
                seat: seat_number.clone(),
            })?;

        if seat.status != SeatStatus::Available {
            tracing::info!(%flight_id, %seat_number, status = %seat.status, "seat not available for locking");
            metrics::counter!("seat_lock_conflicts_total").increment(1);
            return Ok(false);
        }

        let acquired = self.locks.acquire(flight_id, seat_number, user_id).await?;
        if !acquired {
            metrics::counter!("seat_lock_conflicts_total").increment(1);
        }
        Ok(acquired)
    }

    /// Releases the temporary hold on a seat.
    ///
    /// Strict no-op when the seat is already booked: confirmation is
    /// final and must never be undone by a stray unlock.
    #[tracing::instrument(skip(self))]
    pub async fn unlock_seat(&self, flight_id: FlightId, seat_number: &SeatNumber) -> Result<()> {
        if let Some(seat) = self.seats.get(flight_id, seat_number).await?
            && seat.status == SeatStatus::Booked
        {
            tracing::debug!(%flight_id, %seat_number, "seat already booked, unlock is a no-op");
            return Ok(());
        }

        self.locks.release(flight_id, seat_number).await?;
        Ok(())
    }

    /// Finalizes a seat as booked once payment is confirmed.
    ///
    /// Idempotent: confirming an already-booked seat succeeds, which
    /// absorbs duplicate payment-outcome deliveries. Version conflicts
    /// are retried up to the policy bound, then surfaced.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_seat(&self, flight_id: FlightId, seat_number: &SeatNumber) -> Result<()> {
        self.retry
            .run_with_fallback(
                || self.try_confirm(flight_id, seat_number),
                |e| matches!(e, InventoryError::VersionConflict { .. }),
                |e| {
                    tracing::warn!(%flight_id, %seat_number, error = %e, "seat confirmation retries exhausted");
                    Err(e)
                },
            )
            .await?;

        // The temporary lock has served its purpose; TTL covers us if
        // the release fails.
        if let Err(e) = self.locks.release(flight_id, seat_number).await {
            tracing::warn!(%flight_id, %seat_number, error = %e, "failed to release lock after confirmation, TTL will expire it");
        }

        metrics::counter!("seats_confirmed_total").increment(1);
        Ok(())
    }

    async fn try_confirm(&self, flight_id: FlightId, seat_number: &SeatNumber) -> Result<()> {
        let seat = self
            .seats
            .get(flight_id, seat_number)
            .await?
            .ok_or_else(|| InventoryError::SeatNotFound {
                flight: flight_id,
                seat: seat_number.clone(),
            })?;

        match seat.status {
            SeatStatus::Booked => {
                tracing::info!(%flight_id, %seat_number, "seat already booked, treating confirm as idempotent success");
                Ok(())
            }
            SeatStatus::Available => {
                let mut next = seat;
                next.status = SeatStatus::Booked;
                self.seats.update(next).await
            }
            status => Err(InventoryError::SeatUnavailable {
                flight: flight_id,
                seat: seat_number.clone(),
                status,
            }),
        }
    }

    /// Lists a flight's seats with the live lock overlay applied to
    /// available seats. Presentation only: an unreachable lock store
    /// degrades to "not held" so browsing keeps working.
    pub async fn list_seats(&self, flight_id: FlightId) -> Result<Vec<SeatView>> {
        let seats = self.seats.list(flight_id).await?;
        let mut views = Vec::with_capacity(seats.len());

        for seat in seats {
            let status = self.overlay_status(&seat).await;
            views.push(SeatView {
                seat_number: seat.seat_number,
                seat_type: seat.seat_type,
                status,
            });
        }

        Ok(views)
    }

    async fn overlay_status(&self, seat: &Seat) -> SeatStatus {
        if seat.status != SeatStatus::Available {
            return seat.status;
        }

        match self.locks.is_held(seat.flight_id, &seat.seat_number).await {
            Ok(true) => SeatStatus::Locked,
            Ok(false) => SeatStatus::Available,
            Err(e) => {
                tracing::warn!(
                    flight_id = %seat.flight_id,
                    seat_number = %seat.seat_number,
                    error = %e,
                    "lock store unreachable, seat map may under-report holds"
                );
                SeatStatus::Available
            }
        }
    }
}
