use crate::errors::Result;
use crate::models::{Company, Exchange};
use crate::providers::Provider;
use async_trait::async_trait;
use log::warn;
use std::collections::HashSet;
use std::sync::Arc;

/// 固定公司列表
pub struct StaticProvider {
    exchange: Arc<Exchange>,
    companies: Vec<Company>,
}

impl StaticProvider {
    /// 代码为空或重复的公司在构造时丢弃
    pub fn new(exchange: Exchange, companies: Vec<Company>) -> Self {
        let mut seen = HashSet::new();
        let companies = companies
            .into_iter()
            .filter_map(|company| {
                let code = company.code.trim();
                if code.is_empty() {
                    warn!("[{}] Company without code skipped: {:?}", exchange.code, company.name);
                    return None;
                }
                if !seen.insert(code.to_string()) {
                    return None;
                }
                Some(Company::new(code, company.name.trim()))
            })
            .collect();

        Self {
            exchange: Arc::new(exchange),
            companies,
        }
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn exchange(&self) -> Arc<Exchange> {
        self.exchange.clone()
    }

    async fn companies(&self) -> Result<Vec<Company>> {
        Ok(self.companies.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drops_blank_and_duplicate_codes() {
        let provider = StaticProvider::new(
            Exchange::new("HongKong", "Hong Kong Stock Exchange", "Asia/Hong_Kong", ".HK"),
            vec![
                Company::new("0700", "Tencent"),
                Company::new("  ", "Nameless"),
                Company::new("", "Empty"),
                Company::new("0700 ", "Tencent again"),
                Company::new("0005", "HSBC"),
            ],
        );

        let codes: Vec<String> = provider
            .companies()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert_eq!(codes, vec!["0700", "0005"]);
    }
}
