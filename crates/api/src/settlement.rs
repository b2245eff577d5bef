//! Settlement of gateway payments.
//!
//! Webhooks, the verify endpoints, confirmation polls, and the reconciliation
//! job all end up in [`Settlement::settle`]. The status flip out of `pending`
//! and its wallet or plan effects commit in one database transaction, and
//! only the caller whose conditional update matched the row applies them.
//!
//! Payouts settle through [`Settlement::settle_payout`]: a withdrawal whose
//! transfer outcome is unknown stays pending until a transfer event decides it,
//! and failing it refunds the wallet in the same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use cambio_core::gateway::{
    ChargeStatus, GatewayError, PaymentGateway, PaymentVerification, TransferStatus,
};
use cambio_core::poller::{Verification, Verifier};
use cambio_core::subscription::referral_commission;
use cambio_core::transaction::{
    Outcome, TransactionLifecycle, TransactionStatus as CoreStatus, TransactionType as CoreType,
};
use cambio_core::wallet::WalletOperation;
use cambio_db::entities::{
    plans,
    sea_orm_active_enums::{TransactionStatus, TransactionType},
    transactions,
};
use cambio_db::repositories::{
    CouponRepository, NewTransaction, PlanRepository, ReferralRepository, TransactionRepoError,
    TransactionRepository, UserRepository, WalletRepoError, WalletRepository,
};

use crate::error::ApiError;

/// Message shown once a payment could not be confirmed.
pub const CONTACT_SUPPORT: &str = "Payment verification failed, please contact support";

/// Result of one settlement attempt.
#[derive(Debug, Clone)]
pub enum Settled {
    /// This call completed the transaction and applied its effects.
    Completed(transactions::Model),
    /// The gateway reported a failure and the transaction is now failed.
    Failed {
        /// The failed transaction.
        transaction: transactions::Model,
        /// Why the payment failed.
        reason: String,
    },
    /// The gateway has not decided yet.
    Pending,
    /// Another path settled the transaction first.
    AlreadyFinal(transactions::Model),
}

/// Settlement errors.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// No transaction carries this reference.
    #[error("No transaction with reference {0}")]
    NotFound(String),

    /// The gateway could not answer.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Transaction rule violation.
    #[error(transparent)]
    Transaction(#[from] TransactionRepoError),

    /// Wallet rule violation.
    #[error(transparent)]
    Wallet(#[from] WalletRepoError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<SettlementError> for ApiError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::NotFound(_) => Self::not_found(e.to_string()),
            SettlementError::Gateway(e) => e.into(),
            SettlementError::Transaction(e) => e.into(),
            SettlementError::Wallet(e) => e.into(),
            SettlementError::Database(e) => e.into(),
        }
    }
}

/// Turns verified gateway results into final transactions.
#[derive(Clone)]
pub struct Settlement {
    db: DatabaseConnection,
    gateway: Arc<dyn PaymentGateway>,
}

impl Settlement {
    /// Creates a settlement over the given database and gateway.
    #[must_use]
    pub fn new(db: DatabaseConnection, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { db, gateway }
    }

    /// Verifies `reference` with the gateway and settles it.
    ///
    /// Safe to call any number of times, from any confirmation path.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::NotFound` for an unknown reference, the
    /// gateway error if verification fails, or a database error.
    pub async fn settle(&self, reference: &str) -> Result<Settled, SettlementError> {
        let transaction = TransactionRepository::new(self.db.clone())
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| SettlementError::NotFound(reference.to_string()))?;

        if transaction.status != TransactionStatus::Pending {
            return Ok(Settled::AlreadyFinal(transaction));
        }

        let verification = self.gateway.verify(reference).await?;

        match verification.status {
            ChargeStatus::Pending => Ok(Settled::Pending),
            ChargeStatus::Success => {
                if let Some(reason) = mismatch(&transaction, &verification) {
                    warn!(reference, %reason, "Verified payment does not match transaction");
                    return self.fail(&transaction, Outcome::Failed, &reason).await;
                }
                self.complete(&transaction, &verification).await
            }
            ChargeStatus::Failed => {
                let reason = verification
                    .gateway_response
                    .unwrap_or_else(|| "Payment failed".to_string());
                self.fail(&transaction, Outcome::Failed, &reason).await
            }
        }
    }

    /// Fails a pending transaction without asking the gateway again.
    ///
    /// Used for payments the customer never finished.
    ///
    /// # Errors
    ///
    /// Returns a database error if the update fails.
    pub async fn abandon(
        &self,
        transaction: &transactions::Model,
        reason: &str,
    ) -> Result<Settled, SettlementError> {
        self.fail(transaction, Outcome::Failed, reason).await
    }

    /// Applies a payout outcome reported for the withdrawal `reference`.
    ///
    /// A successful transfer completes the withdrawal; a failed or reversed
    /// one fails it and refunds the debited amount. Undecided statuses leave
    /// it pending.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::NotFound` if no withdrawal carries this
    /// reference, or a database error.
    pub async fn settle_payout(
        &self,
        reference: &str,
        status: TransferStatus,
        reason: &str,
    ) -> Result<Settled, SettlementError> {
        let transaction = TransactionRepository::new(self.db.clone())
            .find_by_reference(reference)
            .await?
            .filter(|row| row.transaction_type == TransactionType::Withdrawal)
            .ok_or_else(|| SettlementError::NotFound(reference.to_string()))?;

        if transaction.status != TransactionStatus::Pending {
            return Ok(Settled::AlreadyFinal(transaction));
        }

        match status {
            TransferStatus::Success => {
                match TransactionRepository::new(self.db.clone())
                    .finalize(
                        transaction.id,
                        Outcome::Completed,
                        json!({ "transfer_status": status }),
                    )
                    .await
                {
                    Ok(row) => {
                        info!(transaction_id = %row.id, reference, "Payout confirmed");
                        Ok(Settled::Completed(row))
                    }
                    Err(e) if e.is_already_final() => self.reload(transaction.id).await,
                    Err(e) => Err(e.into()),
                }
            }
            TransferStatus::Failed => self.fail(&transaction, Outcome::Failed, reason).await,
            TransferStatus::Pending | TransferStatus::Otp => Ok(Settled::Pending),
        }
    }

    /// Fails a pending withdrawal whose payout was declined, refunding it.
    ///
    /// # Errors
    ///
    /// Returns a wallet or database error; nothing is changed then.
    pub async fn refund_payout(
        &self,
        transaction: &transactions::Model,
        reason: &str,
    ) -> Result<Settled, SettlementError> {
        self.fail(transaction, Outcome::Failed, reason).await
    }

    async fn complete(
        &self,
        transaction: &transactions::Model,
        verification: &PaymentVerification,
    ) -> Result<Settled, SettlementError> {
        let txn = self.db.begin().await?;

        let extra = json!({
            "gateway_response": verification.gateway_response,
            "verified_amount": verification.amount,
        });
        let completed =
            match TransactionRepository::finalize_in(&txn, transaction.id, Outcome::Completed, extra)
                .await
            {
                Ok(row) => row,
                Err(e) if e.is_already_final() => {
                    txn.rollback().await?;
                    return self.reload(transaction.id).await;
                }
                Err(e) => return Err(e.into()),
            };

        match completed.transaction_type {
            TransactionType::Deposit => {
                WalletRepository::apply_in(
                    &txn,
                    completed.user_id,
                    WalletOperation::Deposit(completed.amount),
                )
                .await?;
            }
            TransactionType::Subscription => {
                match PlanRepository::activate_pending_in(&txn, completed.id).await? {
                    Some((_, plan)) => {
                        reward_referral_in(
                            &txn,
                            completed.user_id,
                            &plan,
                            completed.amount,
                            completed.id,
                        )
                        .await?;
                    }
                    None => {
                        warn!(transaction_id = %completed.id, "Paid subscription has no pending plan");
                    }
                }
            }
            other => {
                warn!(
                    transaction_id = %completed.id,
                    kind = ?other,
                    "Settled a transaction with no gateway effect"
                );
            }
        }

        txn.commit().await?;
        info!(
            transaction_id = %completed.id,
            reference = completed.reference.as_deref().unwrap_or_default(),
            amount = %completed.amount,
            "Payment settled"
        );
        Ok(Settled::Completed(completed))
    }

    async fn fail(
        &self,
        transaction: &transactions::Model,
        outcome: Outcome,
        reason: &str,
    ) -> Result<Settled, SettlementError> {
        let txn = self.db.begin().await?;

        let failed = match TransactionRepository::finalize_in(
            &txn,
            transaction.id,
            outcome,
            json!({ "failure_reason": reason }),
        )
        .await
        {
            Ok(row) => row,
            Err(e) if e.is_already_final() => {
                txn.rollback().await?;
                return self.reload(transaction.id).await;
            }
            Err(e) => return Err(e.into()),
        };

        match failed.transaction_type {
            TransactionType::Subscription => {
                PlanRepository::cancel_pending_in(&txn, failed.id).await?;
                CouponRepository::reverse_for_transaction_in(&txn, failed.id).await?;
            }
            // The amount left the wallet when the withdrawal was recorded.
            TransactionType::Withdrawal => {
                WalletRepository::apply_in(
                    &txn,
                    failed.user_id,
                    WalletOperation::Refund(failed.amount),
                )
                .await?;
            }
            _ => {}
        }

        txn.commit().await?;
        info!(
            transaction_id = %failed.id,
            kind = ?failed.transaction_type,
            %reason,
            "Payment failed"
        );
        Ok(Settled::Failed {
            transaction: failed,
            reason: reason.to_string(),
        })
    }

    async fn reload(&self, id: Uuid) -> Result<Settled, SettlementError> {
        let row = TransactionRepository::new(self.db.clone())
            .find_by_id(id)
            .await?
            .ok_or_else(|| SettlementError::NotFound(id.to_string()))?;
        Ok(Settled::AlreadyFinal(row))
    }
}

#[async_trait]
impl Verifier for Settlement {
    async fn verify(&self, reference: &str) -> Verification {
        match self.settle(reference).await {
            Ok(Settled::Completed(_)) => Verification::Confirmed,
            Ok(Settled::AlreadyFinal(row)) if row.status == TransactionStatus::Completed => {
                Verification::Confirmed
            }
            Ok(Settled::AlreadyFinal(row)) => {
                Verification::Failed(format!("Payment {}", CoreStatus::from(row.status)))
            }
            Ok(Settled::Failed { reason, .. }) => Verification::Failed(reason),
            Ok(Settled::Pending) => Verification::Retry("Payment is still pending".to_string()),
            Err(SettlementError::Gateway(GatewayError::Unavailable(message))) => {
                warn!(reference, %message, "Gateway unavailable during confirmation");
                Verification::Retry(CONTACT_SUPPORT.to_string())
            }
            // Verification only reads, so a 4xx is retried like an outage
            // until the attempt budget runs out.
            Err(SettlementError::Gateway(GatewayError::Rejected(message))) => {
                warn!(reference, %message, "Gateway rejected the verification request");
                Verification::Retry(message)
            }
            Err(SettlementError::NotFound(_)) => {
                Verification::Failed("Unknown payment reference".to_string())
            }
            Err(e) => {
                error!(reference, error = %e, "Settlement failed");
                Verification::Retry(CONTACT_SUPPORT.to_string())
            }
        }
    }
}

/// Pays the referrer of `referred_id` for their first paid subscription.
///
/// Does nothing for free activations, users without a pending referral, or
/// users who already completed a paid subscription before `payment_id`.
/// Returns the commission credited, if any.
///
/// # Errors
///
/// Returns a wallet or database error; the caller's transaction must then be
/// rolled back.
pub async fn reward_referral_in<C: ConnectionTrait>(
    conn: &C,
    referred_id: Uuid,
    plan: &plans::Model,
    charge: Decimal,
    payment_id: Uuid,
) -> Result<Option<Decimal>, SettlementError> {
    if charge <= Decimal::ZERO {
        return Ok(None);
    }

    let Some(referral) = ReferralRepository::find_pending_for_referred_in(conn, referred_id).await?
    else {
        return Ok(None);
    };

    if TransactionRepository::has_completed_in(conn, referred_id, CoreType::Subscription, payment_id)
        .await?
    {
        return Ok(None);
    }

    let commission = referral_commission(charge, plan.referral_commission_rate);
    if commission <= Decimal::ZERO {
        return Ok(None);
    }

    let Some(referrer) = UserRepository::find_by_id_in(conn, referral.referrer_id).await? else {
        warn!(referral_id = %referral.id, "Referrer no longer exists");
        return Ok(None);
    };

    let credit = TransactionRepository::create_completed_in(
        conn,
        NewTransaction::new(referrer.id, CoreType::Referral, commission, referrer.currency.clone())
            .with_reference(TransactionLifecycle::generate_reference(CoreType::Referral))
            .with_metadata(json!({
                "counterparty_id": referred_id,
                "plan_id": plan.id,
                "payment_id": payment_id,
            })),
    )
    .await?;

    WalletRepository::apply_in(conn, referrer.id, WalletOperation::ReferralCredit(commission))
        .await?;
    ReferralRepository::reward_in(conn, referral.id, commission, credit.id).await?;

    info!(referrer_id = %referrer.id, %referred_id, %commission, "Referral commission paid");
    Ok(Some(commission))
}

/// Why a successful charge cannot be credited, if it cannot.
fn mismatch(transaction: &transactions::Model, verification: &PaymentVerification) -> Option<String> {
    if verification.currency.code() != transaction.currency {
        return Some(format!(
            "Paid in {} but expected {}",
            verification.currency, transaction.currency
        ));
    }
    if verification.amount < transaction.amount {
        return Some(format!(
            "Paid {} but expected {}",
            verification.amount, transaction.amount
        ));
    }
    None
}
