//! FARMWISE: crop-planning advisory engines
//!
//! Entry point. Loads configuration, initialises structured logging,
//! loads the market data and prints one advisory report for the
//! planting described in `[report]`.

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use farmwise::config::AppConfig;
use farmwise::data::MarketDataStore;
use farmwise::engine::{profit_curve, FinancialCalculator, ForecastPipeline};
use farmwise::strategy::{ArbitrageRecommender, CreditScorer};
use farmwise::types::{
    AgriError, ArbitrageReport, CreditScoreResult, FinancialSummary, ForecastPoint, ProfitPoint,
};

// ---------------------------------------------------------------------------
// Report shape
// ---------------------------------------------------------------------------

/// A report section: the engine's result, or the reason it has none.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Section<T> {
    Ok(T),
    Failed { error: String },
}

#[derive(Debug, Serialize)]
struct Options {
    districts: Vec<String>,
    crops: Vec<String>,
    seasons: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ForecastSection {
    points: Vec<ForecastPoint>,
    /// Absent when the financial summary could not be computed.
    profit_curve: Option<Vec<ProfitPoint>>,
}

#[derive(Debug, Serialize)]
struct AdvisoryReport {
    report_id: String,
    service: String,
    generated_at: String,
    district: String,
    crop: String,
    season: String,
    acres: f64,
    options: Options,
    financials: Section<FinancialSummary>,
    forecast: Section<ForecastSection>,
    arbitrage: Section<ArbitrageReport>,
    credit: Section<CreditScoreResult>,
}

fn section<T>(name: &str, result: Result<T, AgriError>) -> Section<T> {
    match result {
        Ok(value) => Section::Ok(value),
        Err(e) => {
            if e.is_caller_error() {
                warn!(section = name, error = %e, "Section unavailable");
            } else {
                error!(section = name, error = %e, "Section failed");
            }
            Section::Failed { error: e.to_string() }
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("FARMWISE_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    info!(
        service = %cfg.service.name,
        config = %config_path,
        district = %cfg.report.district,
        crop = %cfg.report.crop,
        "FARMWISE starting up"
    );

    let store = MarketDataStore::load(&cfg.dataset_paths())
        .context("Failed to load market data")?;
    let loaded = store.load_report();
    info!(
        history = %loaded.price_history,
        costs = %loaded.crop_costs,
        "Datasets normalised"
    );

    let report = build_report(&cfg, Arc::new(store)).await?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
    println!("{json}");

    Ok(())
}

/// Run every engine for the configured planting.
async fn build_report(cfg: &AppConfig, store: Arc<MarketDataStore>) -> Result<AdvisoryReport> {
    let query = cfg.report.query()?;
    let arbitrage_config = cfg.arbitrage_config()?;

    let calculator = FinancialCalculator::new(Arc::clone(&store));
    let pipeline = ForecastPipeline::new(Arc::clone(&store), cfg.forecast_config());
    let recommender = ArbitrageRecommender::new(Arc::clone(&store), arbitrage_config);
    let scorer = CreditScorer::new(Arc::clone(&store));

    let summary = calculator.compute(&query);

    let forecast = pipeline
        .forecast_async(&query.crop, &query.district)
        .await
        .map(|points| {
            let curve = summary.as_ref().ok().map(|s| {
                profit_curve(
                    &points,
                    s.yield_per_acre.to_f64().unwrap_or(0.0),
                    query.acres.to_f64().unwrap_or(0.0),
                    s.total_expense.to_f64().unwrap_or(0.0),
                )
            });
            ForecastSection {
                points,
                profit_curve: curve,
            }
        });

    let arbitrage = recommender.recommend(&query.crop, &query.district);

    let credit = match &summary {
        Ok(s) => section("credit", scorer.score(s.total_income, s.total_expense, &query.crop)),
        Err(_) => Section::Failed {
            error: "Credit score needs the financial summary".to_string(),
        },
    };

    Ok(AdvisoryReport {
        report_id: uuid::Uuid::new_v4().to_string(),
        service: cfg.service.name.clone(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        district: query.district.clone(),
        crop: query.crop.clone(),
        season: query.season.clone(),
        acres: cfg.report.acres,
        options: Options {
            districts: store.districts(),
            crops: store.crops(),
            seasons: store.seasons(),
        },
        financials: section("financials", summary),
        forecast: section("forecast", forecast),
        arbitrage: section("arbitrage", arbitrage),
        credit,
    })
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("farmwise=info"));

    let json_logging = std::env::var("FARMWISE_LOG_JSON").is_ok();

    // Logs go to stderr so stdout carries only the report.
    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}
