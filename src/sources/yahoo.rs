use crate::config::SourceConfig;
use crate::errors::{RecorderError, Result};
use crate::models::{Company, CompanyDailyQuote, Exchange, Quote, SerialType};
use crate::services::schedule;
use crate::sources::Source;
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// 雅虎财经分时数据源
pub struct YahooFinance {
    client: Client,
    base_url: String,
    config: SourceConfig,
}

/// 单次请求失败的处理方式
enum Attempt {
    Retry(RecorderError),
    Abort(RecorderError),
}

impl YahooFinance {
    /// 创建新的雅虎财经数据源
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) stockrecorder")
            .build()
            .map_err(RecorderError::RequestError)?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            config,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn chart_url(&self, exchange: &Exchange, company: &Company, start: i64, end: i64) -> String {
        format!(
            "{}/{}?period1={}&period2={}&interval=1m&indicators=quote&includeTimestamps=true&includePrePost=true",
            self.base_url,
            exchange.query_code(&company.code),
            start,
            end
        )
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<(StatusCode, String), Attempt> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Retry(RecorderError::RequestError(e)))?;

        let status = response.status();
        // 404 的响应体里带有 chart.error，交给解析阶段判断
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return response
                .text()
                .await
                .map(|body| (status, body))
                .map_err(|e| Attempt::Retry(RecorderError::RequestError(e)));
        }

        let err = RecorderError::SourceError(format!("{} returned {}", url, status));
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(Attempt::Retry(err))
        } else {
            Err(Attempt::Abort(err))
        }
    }

    /// 下载，失败时按配置重试
    async fn download(&self, url: &str) -> Result<(StatusCode, String)> {
        let attempts = self.retry_count().max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(Attempt::Abort(e)) => return Err(e),
                Err(Attempt::Retry(e)) => {
                    warn!("Request {} failed (attempt {}/{}): {}", url, attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.retry_interval()).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            RecorderError::SourceError(format!("{} failed after {} attempts", url, attempts))
        }))
    }
}

#[async_trait]
impl Source for YahooFinance {
    async fn crawl(
        &self,
        exchange: &Exchange,
        company: &Company,
        date: DateTime<Tz>,
    ) -> Result<CompanyDailyQuote> {
        let start = schedule::start_of_day(date.timezone(), date.date_naive())?;
        let end = schedule::next_day_start(start)?;

        let url = self.chart_url(exchange, company, start.timestamp(), end.timestamp());
        debug!("Fetching {} {} for {}", exchange.code, company.code, start.date_naive());

        let (status, body) = self.download(&url).await?;
        parse_response(status, &body, company)
    }

    fn expiration(&self) -> chrono::Duration {
        chrono::Duration::days(self.config.expiration_days)
    }

    fn parallel_max(&self) -> usize {
        self.config.parallel_max
    }

    fn retry_count(&self) -> usize {
        self.config.retry_count
    }

    fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.config.retry_interval_secs)
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    #[serde(default)]
    trading_periods: Option<TradingPeriods>,
}

#[derive(Debug, Default, Deserialize)]
struct TradingPeriods {
    #[serde(default)]
    pre: Vec<Vec<Period>>,
    #[serde(default)]
    regular: Vec<Vec<Period>>,
    #[serde(default)]
    post: Vec<Vec<Period>>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Period {
    start: i64,
    end: i64,
}

impl Period {
    fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts < self.end
    }
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<IndicatorQuote>,
}

#[derive(Debug, Deserialize)]
struct IndicatorQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn first_period(periods: &[Vec<Period>]) -> Option<Period> {
    periods.first().and_then(|p| p.first()).copied()
}

/// 解析雅虎财经返回的分时数据，按交易时段归类
fn parse_response(status: StatusCode, body: &str, company: &Company) -> Result<CompanyDailyQuote> {
    match parse_chart(body, company) {
        // 没有 chart.error 的 404（例如网关返回的 HTML）同样视为无数据
        Err(RecorderError::JsonError(e)) if status == StatusCode::NOT_FOUND => {
            debug!("{} answered 404 without a chart body: {}", company.code, e);
            Err(RecorderError::NoData)
        }
        parsed => parsed,
    }
}

fn parse_chart(body: &str, company: &Company) -> Result<CompanyDailyQuote> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(error) = response.chart.error {
        if error.code == "Not Found" || error.description.contains("No data found") {
            return Err(RecorderError::NoData);
        }
        return Err(RecorderError::SourceError(format!(
            "{}: {} {}",
            company.code, error.code, error.description
        )));
    }

    let result = match response.chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result,
        None => return Err(RecorderError::NoData),
    };

    let timestamps = match result.timestamp {
        Some(ts) if !ts.is_empty() => ts,
        _ => return Err(RecorderError::NoData),
    };

    let quote = match result.indicators.quote.into_iter().next() {
        Some(quote) => quote,
        None => return Err(RecorderError::NoData),
    };

    let count = timestamps.len();
    if [&quote.open, &quote.close, &quote.high, &quote.low, &quote.volume]
        .iter()
        .any(|series| series.len() != count)
    {
        return Err(RecorderError::SourceError(format!(
            "{}: indicator lengths do not match {} timestamps",
            company.code, count
        )));
    }

    let periods = result.meta.trading_periods.unwrap_or_default();
    let regular = first_period(&periods.regular).ok_or_else(|| {
        RecorderError::SourceError(format!("{}: missing regular trading period", company.code))
    })?;
    let windows = [
        (SerialType::Pre, first_period(&periods.pre)),
        (SerialType::Regular, Some(regular)),
        (SerialType::Post, first_period(&periods.post)),
    ];

    let mut daily = CompanyDailyQuote::new(company.clone());
    for (index, &ts) in timestamps.iter().enumerate() {
        let (open, close, high, low, volume) = match (
            quote.open[index],
            quote.close[index],
            quote.high[index],
            quote.low[index],
            quote.volume[index],
        ) {
            (Some(o), Some(c), Some(h), Some(l), Some(v)) => (o, c, h, l, v),
            _ => continue,
        };

        // 全为0的报价忽略
        if open == 0.0 && close == 0.0 && high == 0.0 && low == 0.0 && volume == 0.0 {
            continue;
        }
        if ts < 0 {
            continue;
        }

        let kind = windows
            .iter()
            .find(|(_, window)| window.map_or(false, |w| w.contains(ts)))
            .map(|(kind, _)| *kind);

        if let Some(kind) = kind {
            daily.serial_mut(kind).push(Quote {
                timestamp: ts as u64,
                open: open as f32,
                close: close as f32,
                high: high as f32,
                low: low as f32,
                volume: volume.max(0.0) as u64,
            });
        }
    }

    for kind in SerialType::ALL {
        daily.serial_mut(kind).sort();
    }

    Ok(daily)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> Company {
        Company::new("AAPL", "Apple Inc.")
    }

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "AAPL",
                    "tradingPeriods": {
                        "pre": [[{"timezone": "EDT", "start": 1000, "end": 2000, "gmtoffset": -14400}]],
                        "regular": [[{"timezone": "EDT", "start": 2000, "end": 3000, "gmtoffset": -14400}]],
                        "post": [[{"timezone": "EDT", "start": 3000, "end": 4000, "gmtoffset": -14400}]]
                    }
                },
                "timestamp": [1060, 2120, 2060, 2180, 3060, 4060, 1120],
                "indicators": {
                    "quote": [{
                        "open":   [10.0, 11.0, 10.5, 0.0, 12.0, 13.0, null],
                        "close":  [10.5, 11.5, 11.0, 0.0, 12.5, 13.5, 10.0],
                        "high":   [10.75, 11.75, 11.25, 0.0, 12.75, 13.75, 10.0],
                        "low":    [9.75, 10.75, 10.25, 0.0, 11.75, 12.75, 10.0],
                        "volume": [100, 300, 200, 0, 400, 500, 1]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn classifies_bars_into_sessions() {
        let daily = parse_chart(CHART, &apple()).unwrap();

        assert_eq!(daily.company, apple());
        assert_eq!(daily.pre.len(), 1);
        assert_eq!(daily.pre.0[0].timestamp, 1060);

        // out-of-order bars are sorted, zero bars dropped
        let regular: Vec<u64> = daily.regular.iter().map(|q| q.timestamp).collect();
        assert_eq!(regular, vec![2060, 2120]);
        assert_eq!(daily.regular.0[0].volume, 200);
        assert_eq!(daily.regular.0[1].open, 11.0);

        // 4060 falls outside every period, 1120 has a null open
        assert_eq!(daily.post.len(), 1);
        assert_eq!(daily.post.0[0].timestamp, 3060);
    }

    #[test]
    fn not_found_is_no_data() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        assert!(parse_chart(body, &apple()).unwrap_err().is_no_data());
    }

    #[test]
    fn not_found_without_chart_body_is_no_data() {
        let body = "<html><body>404 Not Found</body></html>";
        assert!(parse_response(StatusCode::NOT_FOUND, body, &apple())
            .unwrap_err()
            .is_no_data());
        assert!(matches!(
            parse_response(StatusCode::OK, body, &apple()),
            Err(RecorderError::JsonError(_))
        ));
    }

    #[test]
    fn missing_timestamps_is_no_data() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        assert!(parse_chart(body, &apple()).unwrap_err().is_no_data());
    }

    #[test]
    fn other_chart_errors_are_source_errors() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        assert!(matches!(
            parse_chart(body, &apple()),
            Err(RecorderError::SourceError(_))
        ));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let body = r#"{"chart":{"result":[{"meta":{"tradingPeriods":{"regular":[[{"start":0,"end":10}]]}},
            "timestamp":[1,2],"indicators":{"quote":[{"open":[1.0],"close":[1.0,1.0],"high":[1.0,1.0],"low":[1.0,1.0],"volume":[1,1]}]}}],"error":null}}"#;
        assert!(matches!(
            parse_chart(body, &apple()),
            Err(RecorderError::SourceError(_))
        ));
    }

    #[test]
    fn chart_url_uses_suffix() {
        let source = YahooFinance::new(SourceConfig::default())
            .unwrap()
            .with_base_url("http://localhost:9000/chart/");
        let exchange = Exchange::new("HongKong", "Hong Kong Exchange", "Asia/Hong_Kong", ".HK");
        let url = source.chart_url(&exchange, &Company::new("0700", "Tencent"), 10, 20);
        assert!(url.starts_with("http://localhost:9000/chart/0700.HK?period1=10&period2=20"));
    }
}
