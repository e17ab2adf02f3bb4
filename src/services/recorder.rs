use crate::errors::{RecorderError, Result};
use crate::providers::Provider;
use crate::services::exchange_recorder::ExchangeRecorder;
use crate::sources::Source;
use crate::stores::Store;
use log::{error, info};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 股票记录器，每个交易所一个独立任务
pub struct Recorder {
    source: Arc<dyn Source>,
    store: Arc<dyn Store>,
    providers: Vec<Arc<dyn Provider>>,
}

impl Recorder {
    pub fn new(source: Arc<dyn Source>, store: Arc<dyn Store>, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            source,
            store,
            providers,
        }
    }

    /// 启动全部交易所记录器，必须在 tokio 运行时内调用
    pub fn run(&self) -> RecorderHandle {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(self.providers.len());

        for provider in &self.providers {
            let recorder = ExchangeRecorder::new(self.source.clone(), self.store.clone(), provider.clone());
            let code = recorder.exchange().code.clone();
            info!("[{}] Starting recorder", code);

            let handle = tokio::spawn(recorder.run(cancel.child_token()));
            tasks.push((code, handle));
        }

        RecorderHandle { cancel, tasks }
    }
}

/// 运行中的记录器
pub struct RecorderHandle {
    cancel: CancellationToken,
    tasks: Vec<(String, JoinHandle<Result<()>>)>,
}

impl RecorderHandle {
    /// 通知所有交易所记录器停止
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 等待全部记录器结束，返回每个交易所的最终结果
    ///
    /// Without a `shutdown` this only returns once every recorder has failed.
    pub async fn wait(self) -> Vec<(String, Result<()>)> {
        let mut results = Vec::with_capacity(self.tasks.len());
        for (code, handle) in self.tasks {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(RecorderError::Unknown(format!("recorder task failed: {}", e))),
            };
            if let Err(e) = &result {
                error!("[{}] Recorder exited with error: {}", code, e);
            }
            results.push((code, result));
        }
        results
    }
}
