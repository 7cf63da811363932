pub mod caching;
pub mod http;

pub use caching::CachingRatesProvider;
pub use http::HttpRatesProvider;
