use serde::{Deserialize, Serialize};

use super::quote::{Serial, SerialType};

/// 上市公司
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Company {
    pub code: String,
    pub name: String,
}

impl Company {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// 公司在某一天的盘前、盘中、盘后三段分时报价
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyDailyQuote {
    pub company: Company,
    pub pre: Serial,
    pub regular: Serial,
    pub post: Serial,
}

impl CompanyDailyQuote {
    pub fn new(company: Company) -> Self {
        Self {
            company,
            pre: Serial::default(),
            regular: Serial::default(),
            post: Serial::default(),
        }
    }

    pub fn code(&self) -> &str {
        &self.company.code
    }

    pub fn serial(&self, kind: SerialType) -> &Serial {
        match kind {
            SerialType::Pre => &self.pre,
            SerialType::Regular => &self.regular,
            SerialType::Post => &self.post,
        }
    }

    pub fn serial_mut(&mut self, kind: SerialType) -> &mut Serial {
        match kind {
            SerialType::Pre => &mut self.pre,
            SerialType::Regular => &mut self.regular,
            SerialType::Post => &mut self.post,
        }
    }
}
