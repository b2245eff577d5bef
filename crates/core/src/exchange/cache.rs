//! Exchange-rate cache using Moka, with live update broadcasts.
//!
//! The cache is created once at startup and injected through application
//! state. Every published rate is fanned out on a broadcast channel so
//! streaming clients see updates without polling.

use std::time::Duration;

use cambio_shared::types::Currency;
use moka::future::Cache;
use tokio::sync::broadcast;

use super::types::ExchangeRate;

/// Default time-to-live for cached rates.
const DEFAULT_TTL_SECS: u64 = 60;

/// Pairs are few; this bounds the cache regardless.
const MAX_CAPACITY: u64 = 1_024;

/// Buffered updates per slow subscriber before it starts lagging.
const BROADCAST_CAPACITY: usize = 64;

/// Cache of the latest published rate per currency pair.
#[derive(Clone)]
pub struct RateCache {
    rates: Cache<(Currency, Currency), ExchangeRate>,
    updates: broadcast::Sender<ExchangeRate>,
}

impl RateCache {
    /// Creates a cache with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(DEFAULT_TTL_SECS))
    }

    /// Creates a cache whose entries expire after `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        let rates = Cache::builder()
            .max_capacity(MAX_CAPACITY)
            .time_to_live(ttl)
            .build();
        let (updates, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self { rates, updates }
    }

    /// Stores a rate loaded from the database without notifying subscribers.
    pub async fn insert(&self, rate: ExchangeRate) {
        self.rates
            .insert((rate.base_currency, rate.quote_currency), rate)
            .await;
    }

    /// Stores a newly published rate and notifies subscribers.
    pub async fn publish(&self, rate: ExchangeRate) {
        self.insert(rate.clone()).await;
        // No receivers is fine; the rate is still cached.
        let _ = self.updates.send(rate);
    }

    /// Looks up a rate, deriving it from the opposite pair when only that is cached.
    pub async fn get(&self, base: Currency, quote: Currency) -> Option<ExchangeRate> {
        if let Some(rate) = self.rates.get(&(base, quote)).await {
            return Some(rate);
        }
        self.rates
            .get(&(quote, base))
            .await
            .and_then(|rate| rate.inverse())
    }

    /// Returns every cached rate, sorted by pair.
    #[must_use]
    pub fn list(&self) -> Vec<ExchangeRate> {
        let mut rates: Vec<ExchangeRate> = self.rates.iter().map(|(_, rate)| rate).collect();
        rates.sort_by(|a, b| {
            (a.base_currency.code(), a.quote_currency.code())
                .cmp(&(b.base_currency.code(), b.quote_currency.code()))
        });
        rates
    }

    /// Subscribes to published rate updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ExchangeRate> {
        self.updates.subscribe()
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn usd_ngn() -> ExchangeRate {
        ExchangeRate {
            base_currency: Currency::Usd,
            quote_currency: Currency::Ngn,
            rate: dec!(1600),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_get_direct_and_inverse() {
        let cache = RateCache::new();
        cache.insert(usd_ngn()).await;

        assert_eq!(
            cache.get(Currency::Usd, Currency::Ngn).await.unwrap().rate,
            dec!(1600)
        );
        assert_eq!(
            cache.get(Currency::Ngn, Currency::Usd).await.unwrap().rate,
            dec!(0.000625)
        );
        assert!(cache.get(Currency::Gbp, Currency::Ngn).await.is_none());
    }

    #[tokio::test]
    async fn test_publish_notifies_subscribers() {
        let cache = RateCache::new();
        let mut rx = cache.subscribe();

        cache.publish(usd_ngn()).await;

        let update = rx.recv().await.unwrap();
        assert_eq!(update.rate, dec!(1600));
    }

    #[tokio::test]
    async fn test_publish_replaces_previous_rate() {
        let cache = RateCache::new();
        cache.publish(usd_ngn()).await;
        cache
            .publish(ExchangeRate {
                rate: dec!(1650),
                ..usd_ngn()
            })
            .await;

        assert_eq!(
            cache.get(Currency::Usd, Currency::Ngn).await.unwrap().rate,
            dec!(1650)
        );
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = RateCache::with_ttl(Duration::from_millis(50));
        cache.insert(usd_ngn()).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get(Currency::Usd, Currency::Ngn).await.is_none());
    }
}
