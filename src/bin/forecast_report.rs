/// Консольный отчет: `forecast_report <city> [horizon] [YYYY-MM-DD]`

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;

use weather_forecast::{ForecastConfig, ForecastPipeline, RunOptions};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(city) = args.next() else {
        bail!("usage: forecast_report <city> [horizon] [start-date]");
    };

    let horizon = args
        .next()
        .map(|h| h.parse::<u32>().with_context(|| format!("invalid horizon: {}", h)))
        .transpose()?;
    let start_date = args
        .next()
        .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").with_context(|| format!("invalid start date: {}", d)))
        .transpose()?;

    let config = ForecastConfig::from_env().context("failed to load configuration")?;
    let pipeline = Arc::new(ForecastPipeline::new(config)?);
    let options = RunOptions {
        horizon,
        start_date,
        targets: None,
    };
    // тот же режим обучения, что и в API
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let report = runtime
        .block_on(pipeline.run_configured(city.clone(), options))
        .with_context(|| format!("forecast for {} failed", city))?;

    for average in &report.summary.averages {
        eprintln!("{} average: {:.2}", average.target, average.value);
    }
    for evaluation in &report.evaluations {
        eprintln!("{} MSE: {:.2}", evaluation.target, evaluation.mse);
    }
    for skipped in &report.skipped_targets {
        eprintln!("{} skipped: {}", skipped.target, skipped.reason);
    }
    for line in &report.lines {
        println!("{}", line);
    }
    Ok(())
}
