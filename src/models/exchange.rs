use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;

use super::company::CompanyDailyQuote;
use crate::errors::{RecorderError, Result};

/// 交易所配置，进程内只读共享
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub code: String,
    pub name: String,
    /// IANA 时区名称，例如 America/New_York
    pub location: String,
    /// 数据源查询代码后缀，例如 .HK
    pub suffix: String,
}

impl Exchange {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            location: location.into(),
            suffix: suffix.into(),
        }
    }

    /// 解析交易所所在时区
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.location)
    }

    /// 数据源使用的查询代码
    pub fn query_code(&self, company_code: &str) -> String {
        format!("{}{}", company_code, self.suffix)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| RecorderError::TimezoneError(format!("{}: {}", name, e)))
}

/// 交易所某一天的全部公司报价，即一次保存的单位
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeDailyQuote {
    pub exchange: Arc<Exchange>,
    /// 交易所当地零点
    pub date: DateTime<Tz>,
    /// 以公司代码为键
    pub companies: HashMap<String, CompanyDailyQuote>,
}

impl ExchangeDailyQuote {
    pub fn new(exchange: Arc<Exchange>, date: DateTime<Tz>) -> Self {
        Self {
            exchange,
            date,
            companies: HashMap::new(),
        }
    }

    pub fn insert(&mut self, quote: CompanyDailyQuote) {
        self.companies.insert(quote.company.code.clone(), quote);
    }

    pub fn get(&self, code: &str) -> Option<&CompanyDailyQuote> {
        self.companies.get(code)
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}
