pub mod exchange_recorder;
pub mod recorder;
pub mod schedule;
pub mod task_group;

pub use exchange_recorder::{CrawlSummary, ExchangeRecorder};
pub use recorder::{Recorder, RecorderHandle};
