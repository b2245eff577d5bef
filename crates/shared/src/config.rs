//! Application configuration management.
//!
//! Values are layered: `config/default.toml`, then `config/{RUN_MODE}.toml`,
//! then environment variables prefixed with `CAMBIO__` (e.g.
//! `CAMBIO__PAYSTACK__SECRET_KEY`).

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Paystack gateway configuration.
    pub paystack: PaystackConfig,
    /// Payment confirmation polling.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    /// Background reconciliation of stale pending payments.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Currency exchange settings.
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Log output settings.
    #[serde(default)]
    pub log: LogConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration as read from config sources.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
    /// Refresh token expiration in seconds.
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

fn default_refresh_token_expiry() -> u64 {
    604_800 // 7 days
}

/// Paystack gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackConfig {
    /// API base URL.
    #[serde(default = "default_paystack_url")]
    pub base_url: String,
    /// Secret key, used both as bearer token and webhook HMAC key.
    pub secret_key: String,
    /// URL Paystack redirects the customer to after checkout.
    pub callback_url: Option<String>,
    /// HTTP timeout for a single gateway call.
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_paystack_url() -> String {
    "https://api.paystack.co".to_string()
}

fn default_gateway_timeout() -> u64 {
    20
}

/// Confirmation poll policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    /// Delay between verification attempts.
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
    /// Number of attempts before giving up.
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
    /// Upper bound of random jitter added to each delay.
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
            max_attempts: default_poll_attempts(),
            jitter_ms: 0,
        }
    }
}

fn default_poll_interval() -> u64 {
    5000
}

fn default_poll_attempts() -> u32 {
    12
}

/// Reconciliation job configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationConfig {
    /// Whether the job runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
    /// Pending transactions younger than this are left to the poller.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    /// Pending transactions older than this are failed if still unconfirmed.
    #[serde(default = "default_abandon_after")]
    pub abandon_after_secs: u64,
    /// Maximum transactions examined per sweep.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reconcile_interval(),
            stale_after_secs: default_stale_after(),
            abandon_after_secs: default_abandon_after(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reconcile_interval() -> u64 {
    60
}

fn default_stale_after() -> u64 {
    120
}

fn default_abandon_after() -> u64 {
    86_400
}

fn default_batch_size() -> u64 {
    50
}

/// Exchange configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Fee charged on exchanges, in percent of the source amount.
    #[serde(default = "default_fee_percent")]
    pub fee_percent: rust_decimal::Decimal,
    /// How long a rate stays cached.
    #[serde(default = "default_rate_ttl")]
    pub rate_cache_ttl_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            fee_percent: default_fee_percent(),
            rate_cache_ttl_secs: default_rate_ttl(),
        }
    }
}

fn default_fee_percent() -> rust_decimal::Decimal {
    rust_decimal::Decimal::ONE
}

fn default_rate_ttl() -> u64 {
    60
}

/// Log output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CAMBIO").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
