use crate::errors::{RecorderError, Result};
use crate::models::{Company, CompanyDailyQuote, Exchange, ExchangeDailyQuote};
use crate::providers::Provider;
use crate::services::schedule;
use crate::services::task_group::TaskGroup;
use crate::sources::Source;
use crate::stores::Store;
use chrono::DateTime;
use chrono_tz::Tz;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

const DATE_PATTERN: &str = "%Y-%m-%d";

/// 单个公司的抓取结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Recorded,
    NoData,
    Failed,
}

/// 一次抓取汇总的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub companies: usize,
    pub recorded: usize,
    pub no_data: usize,
    pub failed: usize,
}

/// 交易所记录器：启动时补抓历史数据，之后每天当地零点抓取前一天的数据
#[derive(Clone)]
pub struct ExchangeRecorder {
    source: Arc<dyn Source>,
    store: Arc<dyn Store>,
    provider: Arc<dyn Provider>,
    exchange: Arc<Exchange>,
    // 补抓和每日任务共用，保证同一交易所的并发请求不超过 parallel_max
    permits: Arc<Semaphore>,
}

impl ExchangeRecorder {
    pub fn new(source: Arc<dyn Source>, store: Arc<dyn Store>, provider: Arc<dyn Provider>) -> Self {
        let exchange = provider.exchange();
        let permits = Arc::new(Semaphore::new(source.parallel_max().max(1)));
        Self {
            source,
            store,
            provider,
            exchange,
            permits,
        }
    }

    pub fn exchange(&self) -> &Exchange {
        &self.exchange
    }

    /// 运行直到 cancel 被触发。时区无法解析时立即返回错误
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let code = self.exchange.code.clone();
        let tz = self.exchange.timezone().map_err(|e| {
            error!("[{}] Cannot start recorder: {}", code, e);
            e
        })?;

        let today = schedule::start_of_day(tz, schedule::local_now(tz).date_naive())?;

        // 历史数据与每日任务并行
        let backfill = {
            let recorder = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                info!("[{}] Backfill started", recorder.exchange.code);
                match recorder.backfill(today, &cancel).await {
                    Ok(()) => info!("[{}] Backfill finished", recorder.exchange.code),
                    Err(e) if e.is_cancelled() => info!("[{}] Backfill cancelled", recorder.exchange.code),
                    Err(e) => error!("[{}] Backfill failed: {}", recorder.exchange.code, e),
                }
            })
        };

        let result = self.daily_loop(tz, &cancel).await;

        if let Err(e) = backfill.await {
            error!("[{}] Backfill task failed: {}", code, e);
        }
        info!("[{}] Recorder stopped", code);
        result
    }

    /// 补抓 [today - expiration, today) 之间尚未保存的日期，按日期升序逐日完成
    pub async fn backfill(&self, today: DateTime<Tz>, cancel: &CancellationToken) -> Result<()> {
        let dates = schedule::backfill_dates(today, self.source.expiration())?;
        if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
            info!(
                "[{}] Backfill window {} to {}",
                self.exchange.code,
                first.format(DATE_PATTERN),
                last.format(DATE_PATTERN)
            );
        }

        for date in dates {
            if cancel.is_cancelled() {
                return Err(RecorderError::Cancelled);
            }

            match self.store.exists(&self.exchange, date).await {
                Ok(true) => {
                    debug!("[{}] {} already recorded", self.exchange.code, date.format(DATE_PATTERN));
                }
                Ok(false) => match self.crawl(date, cancel).await {
                    Ok(_) => {}
                    Err(RecorderError::Cancelled) => return Err(RecorderError::Cancelled),
                    Err(e) => error!(
                        "[{}] Recording {} failed: {}",
                        self.exchange.code,
                        date.format(DATE_PATTERN),
                        e
                    ),
                },
                Err(e) => warn!(
                    "[{}] Cannot check {}, skipped: {}",
                    self.exchange.code,
                    date.format(DATE_PATTERN),
                    e
                ),
            }
        }

        Ok(())
    }

    /// 每日任务，只在 cancel 时返回
    async fn daily_loop(&self, tz: Tz, cancel: &CancellationToken) -> Result<()> {
        loop {
            // 每次重新计算，避免长时间运行后的时钟漂移和夏令时误差
            let wait = schedule::duration_to_next_day(schedule::local_now(tz))?;
            info!(
                "[{}] Next crawl in {}h{:02}m",
                self.exchange.code,
                wait.num_hours(),
                wait.num_minutes() % 60
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(wait.to_std().unwrap_or_default()) => {}
            }

            match self.record_yesterday(schedule::local_now(tz), cancel).await {
                Ok(()) => {}
                Err(RecorderError::Cancelled) => return Ok(()),
                Err(e) => error!("[{}] Daily crawl failed: {}", self.exchange.code, e),
            }
        }
    }

    /// 记录 `now` 所在日期的前一天，已保存则跳过
    pub async fn record_yesterday(&self, now: DateTime<Tz>, cancel: &CancellationToken) -> Result<()> {
        let yesterday = schedule::yesterday(now)?;

        // 避免重复记录
        if self.store.exists(&self.exchange, yesterday).await? {
            info!(
                "[{}] {} already recorded",
                self.exchange.code,
                yesterday.format(DATE_PATTERN)
            );
            return Ok(());
        }

        self.crawl(yesterday, cancel).await.map(|_| ())
    }

    /// 抓取指定日期全部公司的报价并保存一次
    pub async fn crawl(&self, date: DateTime<Tz>, cancel: &CancellationToken) -> Result<CrawlSummary> {
        let day = date.format(DATE_PATTERN).to_string();
        let companies = self.provider.companies().await?;
        info!("[{}] Crawling {} companies for {}", self.exchange.code, companies.len(), day);

        let quotes: Arc<Mutex<HashMap<String, CompanyDailyQuote>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut group = TaskGroup::with_semaphore(self.permits.clone());
        let total = companies.len();

        for company in companies {
            let worker = self.worker(company, date, quotes.clone());
            tokio::select! {
                _ = cancel.cancelled() => return Err(RecorderError::Cancelled),
                spawned = group.spawn(worker) => spawned?,
            }
        }

        let outcomes = tokio::select! {
            _ = cancel.cancelled() => return Err(RecorderError::Cancelled),
            outcomes = group.join() => outcomes,
        };

        let mut summary = CrawlSummary {
            companies: total,
            ..CrawlSummary::default()
        };
        for outcome in &outcomes {
            match outcome {
                Outcome::Recorded => summary.recorded += 1,
                Outcome::NoData => summary.no_data += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }
        // 崩溃的任务没有返回结果
        summary.failed += total - outcomes.len();

        let companies = std::mem::take(&mut *quotes.lock().unwrap_or_else(PoisonError::into_inner));
        let daily = ExchangeDailyQuote {
            exchange: self.exchange.clone(),
            date,
            companies,
        };

        self.store.save(&daily).await.map_err(|e| {
            error!("[{}] Saving {} failed: {}", self.exchange.code, day, e);
            e
        })?;

        if summary.failed > 0 {
            warn!(
                "[{}] {} recorded with gaps: {} recorded, {} without data, {} failed",
                self.exchange.code, day, summary.recorded, summary.no_data, summary.failed
            );
        } else {
            info!(
                "[{}] {} recorded: {} recorded, {} without data",
                self.exchange.code, day, summary.recorded, summary.no_data
            );
        }

        Ok(summary)
    }

    fn worker(
        &self,
        company: Company,
        date: DateTime<Tz>,
        quotes: Arc<Mutex<HashMap<String, CompanyDailyQuote>>>,
    ) -> impl std::future::Future<Output = Outcome> + Send + 'static {
        let source = self.source.clone();
        let exchange = self.exchange.clone();

        async move {
            match source.crawl(&exchange, &company, date).await {
                Ok(quote) => {
                    quotes
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(company.code.clone(), quote);
                    Outcome::Recorded
                }
                Err(RecorderError::NoData) => {
                    debug!("[{}] {} has no data", exchange.code, company.code);
                    Outcome::NoData
                }
                Err(e) => {
                    warn!("[{}] Crawling {} failed: {}", exchange.code, company.code, e);
                    Outcome::Failed
                }
            }
        }
    }
}
