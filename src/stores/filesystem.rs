use crate::codec::{Marshal, Unmarshal};
use crate::errors::{RecorderError, Result};
use crate::models::{Exchange, ExchangeDailyQuote};
use crate::stores::{store_path, Store};
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use std::io::Write;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "mdq";

/// 文件系统存储，gzip 压缩后按日期分目录保存
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 存储路径
    pub fn path_of(&self, exchange: &Exchange, date: DateTime<Tz>) -> PathBuf {
        store_path(&self.root, exchange, date, EXTENSION)
    }
}

fn compress(quote: &ExchangeDailyQuote) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    quote.marshal(&mut encoder)?;
    encoder.flush()?;
    Ok(encoder.finish()?)
}

fn decompress(bytes: &[u8]) -> Result<ExchangeDailyQuote> {
    let mut decoder = GzDecoder::new(bytes);
    ExchangeDailyQuote::unmarshal(&mut decoder)
}

#[async_trait]
impl Store for FileSystemStore {
    async fn exists(&self, exchange: &Exchange, date: DateTime<Tz>) -> Result<bool> {
        let path = self.path_of(exchange, date);
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn save(&self, quote: &ExchangeDailyQuote) -> Result<()> {
        let path = self.path_of(&quote.exchange, quote.date);
        let bytes = compress(quote)?;

        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        // 先写临时文件再改名，exists 不会看到写了一半的文件
        let tmp = path.with_extension(format!("{}.tmp", EXTENSION));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!(
            "Saved {} companies of {} to {} ({} bytes)",
            quote.len(),
            quote.exchange.code,
            path.display(),
            bytes.len()
        );
        Ok(())
    }

    async fn load(&self, exchange: &Exchange, date: DateTime<Tz>) -> Result<ExchangeDailyQuote> {
        let path = self.path_of(exchange, date);
        debug!("Loading {}", path.display());

        let bytes = tokio::fs::read(&path).await?;
        let quote = decompress(&bytes)?;

        if quote.exchange.code != exchange.code {
            return Err(RecorderError::DataError(format!(
                "{} holds exchange {}, expected {}",
                path.display(),
                quote.exchange.code,
                exchange.code
            )));
        }
        Ok(quote)
    }
}
