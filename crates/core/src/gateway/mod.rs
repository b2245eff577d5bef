//! Payment gateway contract.
//!
//! The gateway is an external collaborator. Implementations translate these
//! calls into provider HTTP requests and never retry on their own; retry
//! policy belongs to the confirmation poller.

pub mod error;
pub mod types;

use async_trait::async_trait;

pub use error::GatewayError;
pub use types::{
    Bank, ChargeStatus, InitializeRequest, InitializedPayment, PaymentVerification,
    ResolvedAccount, TransferReceipt, TransferRequest, TransferStatus,
};

use cambio_shared::types::Currency;

/// Operations the platform needs from a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Starts a hosted checkout for a pending transaction.
    async fn initialize(&self, request: InitializeRequest) -> Result<InitializedPayment, GatewayError>;

    /// Asks the provider for the current state of a payment.
    async fn verify(&self, reference: &str) -> Result<PaymentVerification, GatewayError>;

    /// Pays out to a bank account.
    async fn initiate_transfer(&self, request: TransferRequest) -> Result<TransferReceipt, GatewayError>;

    /// Resolves the holder name of a bank account.
    async fn verify_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, GatewayError>;

    /// Lists banks that accept payouts in `currency`.
    async fn list_banks(&self, currency: Currency) -> Result<Vec<Bank>, GatewayError>;
}
