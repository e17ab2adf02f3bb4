use crate::codec::{Marshal, Unmarshal};
use crate::errors::{RecorderError, Result};
use crate::models::{Exchange, ExchangeDailyQuote};
use crate::stores::Store;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// 内存存储，保存编码后的字节，进程退出即丢失
#[derive(Default)]
pub struct MemoryStore {
    days: Mutex<HashMap<(String, NaiveDate), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(exchange: &Exchange, date: DateTime<Tz>) -> (String, NaiveDate) {
        (exchange.code.to_lowercase(), date.date_naive())
    }

    /// 已保存的日期，升序
    pub fn saved_dates(&self, exchange: &Exchange) -> Vec<NaiveDate> {
        let code = exchange.code.to_lowercase();
        let days = self.days.lock().unwrap_or_else(PoisonError::into_inner);
        let mut dates: Vec<NaiveDate> = days
            .keys()
            .filter(|(c, _)| *c == code)
            .map(|(_, d)| *d)
            .collect();
        dates.sort();
        dates
    }

    pub fn len(&self) -> usize {
        self.days.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, exchange: &Exchange, date: DateTime<Tz>) -> Result<bool> {
        let days = self.days.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(days.contains_key(&Self::key(exchange, date)))
    }

    async fn save(&self, quote: &ExchangeDailyQuote) -> Result<()> {
        let bytes = quote.to_bytes()?;
        self.days
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Self::key(&quote.exchange, quote.date), bytes);
        Ok(())
    }

    async fn load(&self, exchange: &Exchange, date: DateTime<Tz>) -> Result<ExchangeDailyQuote> {
        let bytes = {
            let days = self.days.lock().unwrap_or_else(PoisonError::into_inner);
            days.get(&Self::key(exchange, date)).cloned()
        };

        match bytes {
            Some(bytes) => ExchangeDailyQuote::from_bytes(&bytes),
            None => Err(RecorderError::DataError(format!(
                "{} has no record for {}",
                exchange.code,
                date.date_naive()
            ))),
        }
    }
}
