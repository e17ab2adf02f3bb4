use crate::errors::{RecorderError, Result};
use crate::models::{Company, Exchange};
use crate::providers::{Provider, RosterFileProvider, StaticProvider};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// 数据源参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub parallel_max: usize,
    pub retry_count: usize,
    pub retry_interval_secs: u64,
    pub expiration_days: i64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            parallel_max: 32,
            retry_count: 5,
            retry_interval_secs: 10,
            expiration_days: 30,
        }
    }
}

/// 交易所配置
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub code: String,
    pub name: String,
    /// IANA 时区，启动记录器时才解析
    pub location: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub companies: Vec<Company>,
    /// 公司列表文件，优先于 companies
    #[serde(default)]
    pub roster: Option<PathBuf>,
}

impl ExchangeConfig {
    pub fn exchange(&self) -> Exchange {
        Exchange::new(&self.code, &self.name, &self.location, &self.suffix)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub exchanges: Vec<ExchangeConfig>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            source: SourceConfig::default(),
            exchanges: Vec::new(),
        }
    }
}

impl RecorderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取配置文件，相对路径以配置文件所在目录为准
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RecorderError::ConfigError(format!("read {}: {}", path.display(), e)))?;
        let mut config: RecorderConfig = serde_json::from_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.data_dir = resolve(base, &config.data_dir);
        for exchange in &mut config.exchanges {
            if let Some(roster) = &exchange.roster {
                exchange.roster = Some(resolve(base, roster));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_parallel_max(mut self, parallel_max: usize) -> Self {
        self.source.parallel_max = parallel_max;
        self
    }

    pub fn with_expiration_days(mut self, days: i64) -> Self {
        self.source.expiration_days = days;
        self
    }

    pub fn with_exchange(mut self, exchange: ExchangeConfig) -> Self {
        self.exchanges.push(exchange);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.parallel_max == 0 {
            return Err(RecorderError::ConfigError("source.parallel_max must be positive".into()));
        }
        if self.source.expiration_days < 0 {
            return Err(RecorderError::ConfigError("source.expiration_days must not be negative".into()));
        }

        let mut codes = std::collections::HashSet::new();
        for exchange in &self.exchanges {
            if exchange.code.trim().is_empty() {
                return Err(RecorderError::ConfigError("exchange code must not be empty".into()));
            }
            if !codes.insert(exchange.code.to_lowercase()) {
                return Err(RecorderError::ConfigError(format!(
                    "exchange {} configured twice",
                    exchange.code
                )));
            }
        }
        Ok(())
    }

    pub fn find_exchange(&self, code: &str) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|e| e.code.eq_ignore_ascii_case(code))
    }

    /// 每个交易所一个 Provider
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.exchanges
            .iter()
            .map(|config| -> Arc<dyn Provider> {
                match &config.roster {
                    Some(roster) => Arc::new(RosterFileProvider::new(config.exchange(), roster)),
                    None => Arc::new(StaticProvider::new(config.exchange(), config.companies.clone())),
                }
            })
            .collect()
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
