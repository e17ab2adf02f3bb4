// 公开导出的模块，供外部使用
pub mod codec;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod sources;
pub mod stores;

#[doc(hidden)]
pub mod config;

// 重新导出常用类型，方便使用
pub use codec::{Marshal, Unmarshal};
pub use errors::{RecorderError, Result};
pub use models::{Company, CompanyDailyQuote, Exchange, ExchangeDailyQuote, Quote, Serial, SerialType};
pub use providers::Provider;
pub use services::{ExchangeRecorder, Recorder, RecorderHandle};
pub use sources::Source;
pub use stores::Store;
