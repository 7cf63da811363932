//! Core abstractions: data types, caching, configuration and the dashboard controller

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod format;
pub mod log;
pub mod rates;
pub mod types;

// Re-export main types for cleaner imports
pub use cache::FetchCache;
pub use dashboard::{Dashboard, DashboardHandle, DashboardState, DashboardStatus, Selection};
pub use rates::RatesProvider;
pub use types::{AggregatedRate, Timeframe, TrendData, TrendPoint};
