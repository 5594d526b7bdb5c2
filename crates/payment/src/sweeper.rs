//! Reconciliation of payments stranded by lost callbacks.
//!
//! A payment sits Initiated until the provider's checkout callback
//! arrives. If that callback is lost, the sweeper asks the provider for
//! the order's ground truth and settles the payment accordingly, so
//! every payment reaches a terminal state even when the callback path
//! fails. Settlement goes through the same paths as verification, so
//! the booking saga resumes identically.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::Result;
use crate::gateway::{PaymentGateway, ProviderOrderStatus};
use crate::orchestrator::PaymentOrchestrator;
use crate::store::PaymentStore;

/// How often the sweeper runs, and how long a payment may sit
/// Initiated before it is reconciled.
pub const DEFAULT_RECONCILIATION_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale Initiated payments looked at.
    pub examined: usize,
    /// Settled as Success from a paid provider order.
    pub recovered: usize,
    /// Settled as Failed from an attempted-but-unpaid order.
    pub failed: usize,
    /// Left alone: checkout merely abandoned, order still `created`.
    pub abandoned: usize,
    /// Skipped because the provider lookup or settlement errored.
    pub errors: usize,
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "examined={} recovered={} failed={} abandoned={} errors={}",
            self.examined, self.recovered, self.failed, self.abandoned, self.errors
        )
    }
}

/// Periodic job resolving stale Initiated payments against provider
/// ground truth.
pub struct ReconciliationSweeper {
    payments: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    orchestrator: Arc<PaymentOrchestrator>,
    interval: Duration,
}

impl ReconciliationSweeper {
    /// Creates a sweeper with [`DEFAULT_RECONCILIATION_INTERVAL`].
    pub fn new(
        payments: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        orchestrator: Arc<PaymentOrchestrator>,
    ) -> Self {
        Self {
            payments,
            gateway,
            orchestrator,
            interval: DEFAULT_RECONCILIATION_INTERVAL,
        }
    }

    /// Overrides the sweep interval. The staleness cutoff follows the
    /// interval: a payment is reconciled once it has sat Initiated for
    /// at least one full period.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs the sweep loop forever. Callers spawn this on the runtime.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The immediate first tick sweeps whatever was stranded before
        // the process started.
        loop {
            ticker.tick().await;
            match self.sweep().await {
                Ok(report) if report.examined > 0 => {
                    tracing::info!(%report, "reconciliation sweep finished");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "reconciliation sweep failed"),
            }
        }
    }

    /// One reconciliation pass over every stale Initiated payment.
    ///
    /// Per-payment provider errors are counted and skipped — the next
    /// pass picks the payment up again. The sweep itself only fails on
    /// store errors.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport> {
        let cutoff = Utc::now() - chrono::Duration::seconds(self.interval.as_secs() as i64);
        let stale = self.payments.find_initiated_before(cutoff).await?;

        let mut report = SweepReport::default();
        for payment in stale {
            report.examined += 1;
            let payment_id = payment.id;

            let Some(order_id) = payment.provider_order_id.clone() else {
                tracing::error!(%payment_id, "initiated payment has no provider order id, skipping");
                report.errors += 1;
                continue;
            };

            let status = match self.gateway.fetch_order_status(&order_id).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(%payment_id, %order_id, error = %e, "provider lookup failed, will retry next sweep");
                    report.errors += 1;
                    continue;
                }
            };

            let settled = match status {
                ProviderOrderStatus::Paid => {
                    // The charge went through but the callback never
                    // arrived. Settle with a synthetic payment id.
                    let synthetic = format!("RECONCILED-{}", Utc::now().timestamp_millis());
                    tracing::info!(%payment_id, %order_id, "recovering paid order missed by callback");
                    self.orchestrator
                        .settle_success(payment, synthetic)
                        .await
                        .map(|_| &mut report.recovered)
                }
                ProviderOrderStatus::Attempted => {
                    tracing::info!(%payment_id, %order_id, "checkout attempted but never paid, settling as failed");
                    self.orchestrator
                        .settle_failed(payment)
                        .await
                        .map(|_| &mut report.failed)
                }
                ProviderOrderStatus::Created => {
                    // The user simply never finished checkout. No money
                    // moved, nothing to settle yet.
                    tracing::debug!(%payment_id, %order_id, "checkout abandoned, leaving payment initiated");
                    Ok(&mut report.abandoned)
                }
            };

            match settled {
                Ok(bucket) => *bucket += 1,
                Err(e) => {
                    tracing::error!(%payment_id, error = %e, "reconciliation settlement failed");
                    report.errors += 1;
                }
            }
        }

        metrics::counter!("reconciliation_sweeps_total").increment(1);
        metrics::counter!("reconciliation_recovered_total").increment(report.recovered as u64);
        metrics::counter!("reconciliation_failed_total").increment(report.failed as u64);
        Ok(report)
    }
}
