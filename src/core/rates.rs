//! Rates source abstraction

use super::types::{AggregatedRate, Timeframe, TrendData};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RatesProvider: Send + Sync {
    /// Current USD-based rates, one record per currency.
    async fn get_current_rates(&self) -> Result<Vec<AggregatedRate>>;

    async fn get_trends(&self, currency: &str, timeframe: Timeframe) -> Result<TrendData>;
}
