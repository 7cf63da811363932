use crate::core::cache::FetchCache;
use crate::core::config::CacheConfig;
use crate::core::rates::RatesProvider;
use crate::core::types::{AggregatedRate, Timeframe, TrendData};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub const CURRENT_RATES_KEY: &str = "rates:current";

pub fn trends_key(currency: &str, timeframe: Timeframe) -> String {
    format!("trends:{}:{}", currency.to_uppercase(), timeframe)
}

/// Wraps a [`RatesProvider`] so identical requests within a TTL window, or
/// overlapping in flight, reach the inner provider only once.
#[derive(Clone)]
pub struct CachingRatesProvider<T: RatesProvider + 'static> {
    inner: Arc<T>,
    rates_cache: FetchCache<Vec<AggregatedRate>>,
    trends_cache: FetchCache<TrendData>,
    rates_ttl: Duration,
    trends_ttl: Duration,
}

impl<T: RatesProvider + 'static> CachingRatesProvider<T> {
    pub fn new(inner: T, config: &CacheConfig) -> Self {
        Self::with_caches(inner, config, FetchCache::new(), FetchCache::new())
    }

    pub fn with_caches(
        inner: T,
        config: &CacheConfig,
        rates_cache: FetchCache<Vec<AggregatedRate>>,
        trends_cache: FetchCache<TrendData>,
    ) -> Self {
        Self {
            inner: Arc::new(inner),
            rates_cache,
            trends_cache,
            rates_ttl: config.rates_ttl(),
            trends_ttl: config.trends_ttl(),
        }
    }
}

#[async_trait]
impl<T: RatesProvider + 'static> RatesProvider for CachingRatesProvider<T> {
    async fn get_current_rates(&self) -> Result<Vec<AggregatedRate>> {
        let inner = Arc::clone(&self.inner);
        self.rates_cache
            .get_or_fetch(
                CURRENT_RATES_KEY,
                move || async move { inner.get_current_rates().await },
                self.rates_ttl,
            )
            .await
    }

    async fn get_trends(&self, currency: &str, timeframe: Timeframe) -> Result<TrendData> {
        // The key and the upstream request must agree on casing.
        let currency = currency.trim().to_uppercase();
        let key = trends_key(&currency, timeframe);
        let inner = Arc::clone(&self.inner);
        self.trends_cache
            .get_or_fetch(
                &key,
                move || async move { inner.get_trends(&currency, timeframe).await },
                self.trends_ttl,
            )
            .await
    }
}
