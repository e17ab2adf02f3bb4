use stockrecorder::config::RecorderConfig;
use stockrecorder::models::{parse_timezone, CompanyDailyQuote, SerialType};
use stockrecorder::services::{schedule, Recorder};
use stockrecorder::sources::{Source, YahooFinance};
use stockrecorder::stores::{FileSystemStore, Store};

use anyhow::{bail, Context};
use clap::{App, Arg, ArgMatches, SubCommand};
use log::{error, info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_arg = Arg::with_name("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Recorder configuration file (JSON)")
        .takes_value(true)
        .default_value("recorder.json");

    let app = App::new("stockrecorder")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Records minute quotes of every configured exchange, one file per exchange per day")
        .subcommand(
            SubCommand::with_name("run")
                .about("Backfill missing days, then record every day at local midnight")
                .arg(config_arg.clone())
                .arg(
                    Arg::with_name("data-dir")
                        .short('d')
                        .long("data-dir")
                        .value_name("DIR")
                        .help("Override the data directory from the configuration")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("parallel")
                        .short('p')
                        .long("parallel")
                        .value_name("N")
                        .help("Override the maximum concurrent requests per exchange")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("inspect")
                .about("Summarise one recorded exchange day")
                .arg(config_arg)
                .arg(
                    Arg::with_name("exchange")
                        .short('e')
                        .long("exchange")
                        .value_name("EXCHANGE")
                        .help("Exchange code, e.g. America")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("date")
                        .long("date")
                        .value_name("DATE")
                        .help("Exchange-local date (YYYY-MM-DD)")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("limit")
                        .short('l')
                        .long("limit")
                        .value_name("LIMIT")
                        .help("Limit the number of companies to display")
                        .takes_value(true)
                        .default_value("10"),
                ),
        );

    let matches = app.get_matches();

    if let Some(matches) = matches.subcommand_matches("run") {
        run(matches).await
    } else if let Some(matches) = matches.subcommand_matches("inspect") {
        inspect(matches).await
    } else {
        info!("No command specified. Use --help for usage information.");
        Ok(())
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<RecorderConfig> {
    let path = matches.value_of("config").unwrap_or("recorder.json");
    RecorderConfig::from_file(path).with_context(|| format!("loading configuration {}", path))
}

fn parse_number(flag: &str, value: &str) -> anyhow::Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("--{} must be a number, got {:?}", flag, value))
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let mut config = load_config(matches)?;
    if let Some(dir) = matches.value_of("data-dir") {
        config = config.with_data_dir(dir);
    }
    if let Some(parallel) = matches.value_of("parallel") {
        config = config.with_parallel_max(parse_number("parallel", parallel)?);
    }
    config.validate()?;

    if config.exchanges.is_empty() {
        bail!("no exchange configured");
    }

    info!(
        "Recording {} exchanges into {}",
        config.exchanges.len(),
        config.data_dir.display()
    );

    let source: Arc<dyn Source> = Arc::new(YahooFinance::new(config.source.clone())?);
    let store: Arc<dyn Store> = Arc::new(FileSystemStore::new(&config.data_dir));
    let recorder = Recorder::new(source, store, config.providers());

    let handle = recorder.run();
    let cancel = handle.cancellation_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, stopping recorders");
                cancel.cancel();
            }
            Err(e) => error!("Cannot listen for Ctrl-C: {}", e),
        }
    });

    let results = handle.wait().await;
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    info!("{} recorders stopped, {} with errors", results.len(), failed);
    Ok(())
}

async fn inspect(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(matches)?;
    let code = matches.value_of("exchange").unwrap_or_default();
    let date = matches.value_of("date").unwrap_or_default();
    let limit = parse_number("limit", matches.value_of("limit").unwrap_or("10"))?;

    let exchange = match config.find_exchange(code) {
        Some(exchange) => exchange.exchange(),
        None => bail!("exchange {} is not configured", code),
    };
    let tz = parse_timezone(&exchange.location)?;
    let day = schedule::parse_day(tz, date).with_context(|| format!("--date {}", date))?;

    let store = FileSystemStore::new(&config.data_dir);
    if !store.exists(&exchange, day).await? {
        bail!("{} has no record for {}", exchange.code, date);
    }
    let quote = store.load(&exchange, day).await?;

    info!(
        "{} ({}) {}: {} companies",
        quote.exchange.name,
        quote.exchange.code,
        quote.date.format("%Y-%m-%d %Z"),
        quote.len()
    );
    info!("{:-<78}", "");
    info!(
        "{:<10} {:>5} {:>5} {:>5} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Code", "Pre", "Reg", "Post", "Open", "High", "Low", "Close", "Volume"
    );
    info!("{:-<78}", "");

    let mut companies: Vec<&CompanyDailyQuote> = quote.companies.values().collect();
    companies.sort_by(|a, b| a.code().cmp(b.code()));

    for company in companies.iter().take(limit) {
        let bar = company.serial(SerialType::Regular).rollup();
        info!(
            "{:<10} {:>5} {:>5} {:>5} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12}",
            company.code(),
            company.pre.len(),
            company.regular.len(),
            company.post.len(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        );
    }

    if companies.len() > limit {
        info!("... and {} more companies", companies.len() - limit);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_flags_reject_garbage() {
        assert_eq!(parse_number("limit", "25").unwrap(), 25);
        assert_eq!(parse_number("limit", " 3 ").unwrap(), 3);

        let err = parse_number("limit", "ten").unwrap_err();
        assert!(err.to_string().contains("--limit"));
        assert!(parse_number("parallel", "-1").is_err());
    }
}
