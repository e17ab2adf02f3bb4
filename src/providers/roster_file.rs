use crate::errors::{RecorderError, Result};
use crate::models::{Company, Exchange};
use crate::providers::Provider;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// 从 JSON 文件读取公司列表，每次抓取前重新读取
///
/// The file holds an array of `{"code": "...", "name": "..."}` objects.
pub struct RosterFileProvider {
    exchange: Arc<Exchange>,
    path: PathBuf,
}

impl RosterFileProvider {
    pub fn new(exchange: Exchange, path: impl Into<PathBuf>) -> Self {
        Self {
            exchange: Arc::new(exchange),
            path: path.into(),
        }
    }
}

#[async_trait]
impl Provider for RosterFileProvider {
    fn exchange(&self) -> Arc<Exchange> {
        self.exchange.clone()
    }

    async fn companies(&self) -> Result<Vec<Company>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RecorderError::ConfigError(format!("read roster {}: {}", self.path.display(), e))
        })?;
        let listed: Vec<Company> = serde_json::from_str(&content)?;

        // 代码为空或重复的条目丢弃
        let mut seen = HashSet::new();
        let mut companies = Vec::with_capacity(listed.len());
        for company in listed {
            let code = company.code.trim();
            if code.is_empty() {
                warn!("[{}] Roster entry without code skipped: {:?}", self.exchange.code, company.name);
                continue;
            }
            if !seen.insert(code.to_string()) {
                debug!("[{}] Duplicate roster entry {} skipped", self.exchange.code, code);
                continue;
            }
            companies.push(Company::new(code, company.name.trim()));
        }

        Ok(companies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn london() -> Exchange {
        Exchange::new("England", "London Stock Exchange", "Europe/London", ".L")
    }

    #[tokio::test]
    async fn reads_roster_and_drops_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("england.json");
        std::fs::write(
            &path,
            r#"[{"code":"VOD","name":"Vodafone"},{"code":" ","name":"Blank"},{"code":"VOD","name":"Again"},{"code":"BP","name":" BP plc "}]"#,
        )
        .unwrap();

        let provider = RosterFileProvider::new(london(), &path);
        let companies = provider.companies().await.unwrap();
        assert_eq!(
            companies,
            vec![Company::new("VOD", "Vodafone"), Company::new("BP", "BP plc")]
        );
    }

    #[tokio::test]
    async fn roster_is_reread_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("england.json");
        std::fs::write(&path, r#"[{"code":"VOD","name":"Vodafone"}]"#).unwrap();

        let provider = RosterFileProvider::new(london(), &path);
        assert_eq!(provider.companies().await.unwrap().len(), 1);

        std::fs::write(&path, r#"[{"code":"VOD","name":"Vodafone"},{"code":"BP","name":"BP plc"}]"#).unwrap();
        assert_eq!(provider.companies().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_roster_is_a_config_error() {
        let provider = RosterFileProvider::new(london(), "/nonexistent/roster.json");
        assert!(matches!(
            provider.companies().await,
            Err(RecorderError::ConfigError(_))
        ));
    }
}
