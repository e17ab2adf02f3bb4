pub mod yahoo;

use crate::errors::Result;
use crate::models::{Company, CompanyDailyQuote, Exchange};
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use std::time::Duration;

pub use yahoo::YahooFinance;

/// Fetches one company's minute quotes for one day.
///
/// Implementations own their retry policy and must be safe to call from
/// several exchange recorders at once.
#[async_trait]
pub trait Source: Send + Sync {
    /// Crawl `company` on the local day starting at `date`.
    ///
    /// Returns [`RecorderError::NoData`](crate::errors::RecorderError::NoData)
    /// when the market legitimately has nothing for that day.
    async fn crawl(
        &self,
        exchange: &Exchange,
        company: &Company,
        date: DateTime<Tz>,
    ) -> Result<CompanyDailyQuote>;

    /// How far back from today historical data can still be fetched
    fn expiration(&self) -> chrono::Duration;

    /// Upper bound of concurrent `crawl` calls for one exchange
    fn parallel_max(&self) -> usize;

    fn retry_count(&self) -> usize;

    fn retry_interval(&self) -> Duration;
}
