pub mod filesystem;
pub mod memory;

use crate::errors::Result;
use crate::models::{Exchange, ExchangeDailyQuote};
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};

pub use filesystem::FileSystemStore;
pub use memory::MemoryStore;

/// Persistence of one exchange-day artifact.
#[async_trait]
pub trait Store: Send + Sync {
    /// True only once a complete `save` for that exchange-day has finished.
    async fn exists(&self, exchange: &Exchange, date: DateTime<Tz>) -> Result<bool>;

    async fn save(&self, quote: &ExchangeDailyQuote) -> Result<()>;

    async fn load(&self, exchange: &Exchange, date: DateTime<Tz>) -> Result<ExchangeDailyQuote>;
}

/// `<root>/<yyyy>/<mm>/<dd>/<lowercase code>.<ext>`, using the exchange-local date
pub fn store_path(root: &Path, exchange: &Exchange, date: DateTime<Tz>, ext: &str) -> PathBuf {
    root.join(date.format("%Y").to_string())
        .join(date.format("%m").to_string())
        .join(date.format("%d").to_string())
        .join(format!("{}.{}", exchange.code.to_lowercase(), ext))
}
