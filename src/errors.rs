use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateError(#[from] chrono::ParseError),

    #[error("Timezone error: {0}")]
    TimezoneError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    /// 数据源在该日没有任何数据（休市、停牌等），不是故障
    #[error("no data for this day")]
    NoData,

    #[error("cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RecorderError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, RecorderError::NoData)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RecorderError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;

// 用于从字符串创建错误
impl From<String> for RecorderError {
    fn from(s: String) -> Self {
        RecorderError::Unknown(s)
    }
}

// 用于从&str创建错误
impl From<&str> for RecorderError {
    fn from(s: &str) -> Self {
        RecorderError::Unknown(s.to_string())
    }
}
