//! Paystack HTTP client.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use cambio_core::gateway::{
    Bank, GatewayError, InitializeRequest, InitializedPayment, PaymentGateway,
    PaymentVerification, ResolvedAccount, TransferReceipt, TransferRequest,
};
use cambio_shared::config::PaystackConfig;
use cambio_shared::types::{Currency, Money};
use reqwest::{RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::{
    BankData, Envelope, InitializeBody, InitializeData, RecipientBody, RecipientData, ResolveData,
    TransferBody, TransferData, VerifyData, charge_status, transfer_status,
};

/// Paystack implementation of [`PaymentGateway`].
#[derive(Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    callback_url: Option<String>,
}

impl PaystackClient {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: &PaystackConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            callback_url: config.callback_url.clone(),
        })
    }

    /// Secret key, also used to check webhook signatures.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a request and unwraps the Paystack envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Paystack request failed");
                GatewayError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if status.is_server_error() {
            warn!(%status, "Paystack server error");
            return Err(GatewayError::Unavailable(format!("Paystack returned {status}")));
        }

        let envelope: Envelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_client_error() => {
                return Err(GatewayError::Rejected(rejection_message(status, &body, &e)));
            }
            Err(e) => {
                warn!(error = %e, "Malformed Paystack response");
                return Err(GatewayError::Unavailable(format!(
                    "malformed gateway response: {e}"
                )));
            }
        };

        if status.is_client_error() || !envelope.status {
            debug!(%status, message = %envelope.message, "Paystack rejected request");
            return Err(GatewayError::Rejected(envelope.message));
        }

        envelope
            .data
            .ok_or_else(|| GatewayError::Unavailable("gateway response missing data".into()))
    }
}

fn rejection_message(status: StatusCode, body: &str, error: &serde_json::Error) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| format!("Paystack returned {status}: {error}"))
}

fn minor_units(amount: Decimal, currency: Currency) -> Result<i64, GatewayError> {
    Money::new(amount, currency)
        .to_minor_units()
        .filter(|minor| *minor > 0)
        .ok_or_else(|| GatewayError::Rejected(format!("invalid amount {amount}")))
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn initialize(
        &self,
        request: InitializeRequest,
    ) -> Result<InitializedPayment, GatewayError> {
        let body = InitializeBody {
            amount: minor_units(request.amount, request.currency)?,
            email: &request.email,
            currency: request.currency.code(),
            reference: &request.reference,
            callback_url: self.callback_url.as_deref(),
        };

        let data: InitializeData = self
            .send(self.http.post(self.url("/transaction/initialize")).json(&body))
            .await?;

        Ok(InitializedPayment {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<PaymentVerification, GatewayError> {
        let data: VerifyData = self
            .send(
                self.http
                    .get(self.url(&format!("/transaction/verify/{reference}"))),
            )
            .await?;

        let currency = Currency::from_str(&data.currency)
            .map_err(|e| GatewayError::Unavailable(format!("malformed gateway response: {e}")))?;

        Ok(PaymentVerification {
            status: charge_status(&data.status),
            amount: Money::from_minor_units(data.amount, currency).amount,
            currency,
            reference: data.reference,
            gateway_response: data.gateway_response,
        })
    }

    async fn initiate_transfer(
        &self,
        request: TransferRequest,
    ) -> Result<TransferReceipt, GatewayError> {
        let recipient: RecipientData = self
            .send(self.http.post(self.url("/transferrecipient")).json(&RecipientBody {
                kind: "nuban",
                name: &request.account_name,
                account_number: &request.account_number,
                bank_code: &request.bank_code,
                currency: request.currency.code(),
            }))
            .await?;

        let transfer: TransferData = self
            .send(self.http.post(self.url("/transfer")).json(&TransferBody {
                source: "balance",
                amount: minor_units(request.amount, request.currency)?,
                recipient: &recipient.recipient_code,
                reference: &request.reference,
                reason: "Wallet withdrawal",
                currency: request.currency.code(),
            }))
            .await?;

        Ok(TransferReceipt {
            transfer_reference: transfer.transfer_code,
            status: transfer_status(&transfer.status),
        })
    }

    async fn verify_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, GatewayError> {
        let data: ResolveData = self
            .send(
                self.http
                    .get(self.url("/bank/resolve"))
                    .query(&[("account_number", account_number), ("bank_code", bank_code)]),
            )
            .await?;

        Ok(ResolvedAccount {
            account_number: data.account_number,
            account_name: data.account_name,
        })
    }

    async fn list_banks(&self, currency: Currency) -> Result<Vec<Bank>, GatewayError> {
        let data: Vec<BankData> = self
            .send(
                self.http
                    .get(self.url("/bank"))
                    .query(&[("currency", currency.code())]),
            )
            .await?;

        Ok(data
            .into_iter()
            .filter(|bank| bank.active.unwrap_or(true))
            .map(|bank| Bank {
                name: bank.name,
                code: bank.code,
            })
            .collect())
    }
}
