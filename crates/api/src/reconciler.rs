//! Periodic settlement of stale gateway payments.
//!
//! Catches payments whose webhook never arrived and whose customer never came
//! back to verify. Each pass re-verifies pending deposits and subscription
//! payments older than `stale_after_secs`; those still undecided after
//! `abandon_after_secs` are failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cambio_core::gateway::PaymentGateway;
use cambio_db::TransactionRepository;
use cambio_shared::config::ReconciliationConfig;

use crate::settlement::{Settled, Settlement, SettlementError};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Pending transactions examined.
    pub checked: usize,
    /// Settled as completed.
    pub completed: usize,
    /// Failed by the gateway.
    pub failed: usize,
    /// Failed because they stayed pending past the abandonment window.
    pub abandoned: usize,
    /// Left pending for the next pass.
    pub still_pending: usize,
    /// Settled by another path in the meantime.
    pub already_final: usize,
    /// Could not be processed.
    pub errors: usize,
}

/// Background job settling stale gateway payments.
pub struct Reconciler {
    settlement: Settlement,
    transactions: TransactionRepository,
    config: ReconciliationConfig,
}

impl Reconciler {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn PaymentGateway>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            settlement: Settlement::new(db.clone(), gateway),
            transactions: TransactionRepository::new(db),
            config,
        }
    }

    /// Runs one pass.
    ///
    /// # Errors
    ///
    /// Returns an error only if the stale transactions cannot be listed;
    /// failures on individual transactions are counted in the report.
    pub async fn run_once(&self) -> Result<ReconcileReport, DbErr> {
        let now = Utc::now();
        let stale_before = now - secs(self.config.stale_after_secs);
        let abandon_before = now - secs(self.config.abandon_after_secs);

        let stale = self
            .transactions
            .list_stale_pending(stale_before, self.config.batch_size)
            .await?;

        let mut report = ReconcileReport::default();
        for transaction in stale {
            report.checked += 1;
            let Some(reference) = transaction.reference.as_deref() else {
                continue;
            };
            let expired = transaction.created_at < abandon_before;

            let mut result = self.settlement.settle(reference).await;
            let mut abandoned = false;
            if expired && matches!(result, Ok(Settled::Pending) | Err(SettlementError::Gateway(_))) {
                result = self
                    .settlement
                    .abandon(&transaction, "Payment was not completed in time")
                    .await;
                abandoned = true;
            }

            match result {
                Ok(Settled::Completed(_)) => report.completed += 1,
                Ok(Settled::Failed { .. }) if abandoned => report.abandoned += 1,
                Ok(Settled::Failed { .. }) => report.failed += 1,
                Ok(Settled::Pending) => report.still_pending += 1,
                Ok(Settled::AlreadyFinal(_)) => report.already_final += 1,
                Err(SettlementError::Gateway(e)) => {
                    warn!(reference, error = %e, "Gateway error during reconciliation");
                    report.errors += 1;
                }
                Err(e) => {
                    error!(reference, error = %e, "Reconciliation failed");
                    report.errors += 1;
                }
            }
        }

        Ok(report)
    }

    /// Runs a pass every `interval_secs` until `shutdown` is cancelled.
    #[must_use]
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = Duration::from_secs(self.config.interval_secs.max(1));
            let mut ticker = tokio::time::interval(period);
            info!(
                interval_secs = self.config.interval_secs,
                stale_after_secs = self.config.stale_after_secs,
                "Reconciliation job started"
            );

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match self.run_once().await {
                    Ok(report) if report.checked > 0 => {
                        info!(?report, "Reconciliation pass finished");
                    }
                    Ok(_) => debug!("Nothing to reconcile"),
                    Err(e) => error!(error = %e, "Could not list stale transactions"),
                }
            }

            info!("Reconciliation job stopped");
        })
    }
}

fn secs(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or_else(|| chrono::Duration::days(365))
}
