pub mod roster_file;
pub mod static_list;

use crate::errors::Result;
use crate::models::{Company, Exchange};
use async_trait::async_trait;
use std::sync::Arc;

pub use roster_file::RosterFileProvider;
pub use static_list::StaticProvider;

/// Supplies an exchange and its current list of listed companies.
#[async_trait]
pub trait Provider: Send + Sync {
    fn exchange(&self) -> Arc<Exchange>;

    /// Called once per crawl cycle, so the roster may change between days.
    async fn companies(&self) -> Result<Vec<Company>>;
}
