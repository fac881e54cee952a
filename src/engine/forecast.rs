//! Forecast pipeline: live feed → SARIMA → 30-day price projection.
//!
//! The feed is filtered by substring on commodity and district, since the
//! scraper names markets loosely. Fitting is CPU-bound: async callers go
//! through [`ForecastPipeline::forecast_async`], which runs the fit on the
//! blocking pool under a timeout and cancels it when the timeout fires.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::feed::{COMMODITY, DATE, DISTRICT, MODAL_PRICE};
use crate::data::normalize::MatchStrategy;
use crate::data::MarketDataStore;
use crate::model::sarima::{Sarima, SarimaOrder};
use crate::model::ModelError;
use crate::storage;
use crate::types::{AgriError, ForecastPoint, ProfitPoint};

const FEED_DATASET: &str = "live price feed";

/// Days projected past the last observation. Fixed, not configurable.
pub const FORECAST_HORIZON_DAYS: usize = 30;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// Two-sided prediction interval level.
    pub confidence: f64,
    pub fit_timeout: Duration,
    pub max_iterations: usize,
    /// Where the audit snapshot of each successful run is written.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            confidence: 0.95,
            fit_timeout: Duration::from_secs(30),
            max_iterations: 2000,
            snapshot_path: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Fits one (crop, district) price series per call.
#[derive(Clone)]
pub struct ForecastPipeline {
    store: Arc<MarketDataStore>,
    config: ForecastConfig,
    order: SarimaOrder,
}

impl ForecastPipeline {
    pub fn new(store: Arc<MarketDataStore>, config: ForecastConfig) -> Self {
        Self {
            store,
            config,
            order: SarimaOrder::WEEKLY,
        }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Observed (date, price) series for a crop and district, oldest first.
    pub fn observed_series(
        &self,
        crop: &str,
        district: &str,
    ) -> Result<Vec<(NaiveDate, f64)>, AgriError> {
        let snapshot = self.store.live_snapshot()?;

        for column in [MODAL_PRICE, DATE] {
            if !snapshot.has_column(column) {
                return Err(AgriError::MissingColumn {
                    dataset: FEED_DATASET.to_string(),
                    column: column.to_string(),
                });
            }
        }

        // A filter only applies when the feed carries its column.
        let filter_crop = snapshot.has_column(COMMODITY);
        let filter_district = snapshot.has_column(DISTRICT);

        let mut series: Vec<(NaiveDate, f64)> = snapshot
            .rows
            .iter()
            .filter(|row| {
                !filter_crop
                    || row
                        .commodity
                        .as_deref()
                        .is_some_and(|c| MatchStrategy::Contains.matches(c, crop))
            })
            .filter(|row| {
                !filter_district
                    || row
                        .district
                        .as_deref()
                        .is_some_and(|d| MatchStrategy::Contains.matches(d, district))
            })
            .filter_map(|row| {
                let date = row.date?;
                let price = row.modal_price?.to_f64()?;
                Some((date, price))
            })
            .collect();

        // Stable: same-day quotes keep feed order.
        series.sort_by_key(|(date, _)| *date);

        debug!(
            crop,
            district,
            observations = series.len(),
            origin = ?snapshot.origin,
            "Forecast series extracted"
        );
        Ok(series)
    }

    /// Run the full pipeline on the current thread.
    pub fn forecast(&self, crop: &str, district: &str) -> Result<Vec<ForecastPoint>, AgriError> {
        self.run(crop, district, Arc::new(AtomicBool::new(false)))
    }

    /// Run the pipeline on the blocking pool, bounded by the configured
    /// timeout. A fit that panics is reported as `FitFailed`.
    pub async fn forecast_async(
        &self,
        crop: &str,
        district: &str,
    ) -> Result<Vec<ForecastPoint>, AgriError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let pipeline = self.clone();
        let (crop_owned, district_owned) = (crop.to_string(), district.to_string());
        let flag = Arc::clone(&cancel);

        let task = tokio::task::spawn_blocking(move || {
            pipeline.run(&crop_owned, &district_owned, flag)
        });

        match tokio::time::timeout(self.config.fit_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AgriError::FitFailed(format!(
                "forecast task aborted: {join_err}"
            ))),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(
                    crop,
                    district,
                    timeout = ?self.config.fit_timeout,
                    "Forecast timed out, fit cancelled"
                );
                Err(AgriError::ForecastTimeout(self.config.fit_timeout))
            }
        }
    }

    fn run(
        &self,
        crop: &str,
        district: &str,
        cancel: Arc<AtomicBool>,
    ) -> Result<Vec<ForecastPoint>, AgriError> {
        let observed = self.observed_series(crop, district)?;
        let required = self.order.min_observations();
        if observed.len() < required {
            return Err(AgriError::InsufficientHistory {
                crop: crop.to_string(),
                district: district.to_string(),
                observations: observed.len(),
                required,
            });
        }

        let prices: Vec<f64> = observed.iter().map(|(_, p)| *p).collect();
        let dates: Vec<NaiveDate> = observed.iter().map(|(d, _)| *d).collect();

        let model = Sarima::new(self.order)
            .with_max_iterations(self.config.max_iterations)
            .with_cancel(cancel);
        let predictions = model
            .fit(&prices)
            .and_then(|fitted| fitted.forecast(FORECAST_HORIZON_DAYS, self.config.confidence))
            .map_err(|e| self.model_error(e, crop, district))?;

        let future_dates = forecast_dates(&dates, FORECAST_HORIZON_DAYS);
        let points: Vec<ForecastPoint> = predictions
            .iter()
            .zip(future_dates)
            .enumerate()
            .map(|(i, (p, date))| ForecastPoint {
                day_index: i as u32 + 1,
                date,
                predicted_price: p.mean,
                lower_bound: p.lower,
                upper_bound: p.upper,
            })
            .collect();

        info!(
            crop,
            district,
            observations = prices.len(),
            horizon = points.len(),
            first = points.first().map(|p| p.predicted_price),
            last = points.last().map(|p| p.predicted_price),
            "Price forecast generated"
        );

        if let Some(path) = &self.config.snapshot_path {
            if let Err(e) = storage::save_forecast(&points, path) {
                warn!(path = %path.display(), error = %e, "Failed to write forecast snapshot");
            }
        }

        Ok(points)
    }

    fn model_error(&self, err: ModelError, crop: &str, district: &str) -> AgriError {
        match err {
            ModelError::InsufficientData { observations, required } => {
                AgriError::InsufficientHistory {
                    crop: crop.to_string(),
                    district: district.to_string(),
                    observations,
                    required,
                }
            }
            ModelError::Cancelled => AgriError::ForecastTimeout(self.config.fit_timeout),
            ModelError::InvalidConfidence(c) => {
                AgriError::InvalidConfig(format!("forecast confidence {c}"))
            }
            other @ ModelError::NonFinite(_) => AgriError::FitFailed(other.to_string()),
        }
    }
}

/// Calendar dates for the forecast horizon.
///
/// Dates are only derivable when the observations are strictly increasing
/// with a constant spacing; otherwise every entry is `None`.
fn forecast_dates(observed: &[NaiveDate], steps: usize) -> Vec<Option<NaiveDate>> {
    let step = match observed {
        [.., a, b] => *b - *a,
        _ => return vec![None; steps],
    };
    let regular = step > chrono::Duration::zero()
        && observed.windows(2).all(|w| w[1] - w[0] == step);
    if !regular {
        return vec![None; steps];
    }

    let last = observed[observed.len() - 1];
    (1..=steps)
        .map(|h| last.checked_add_signed(step * h as i32))
        .collect()
}

/// Profit curve from a price forecast: `income = price * yield * acres`,
/// `profit = income - total_expense`. Values are not rounded.
pub fn profit_curve(
    points: &[ForecastPoint],
    yield_per_acre: f64,
    acres: f64,
    total_expense: f64,
) -> Vec<ProfitPoint> {
    points
        .iter()
        .map(|p| {
            let income = p.predicted_price * yield_per_acre * acres;
            ProfitPoint {
                day: p.day_index,
                date: p.label(),
                price: p.predicted_price,
                income,
                profit: income - total_expense,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feed::{FeedOrigin, FeedRow, FeedSnapshot, MockPriceFeed};
    use crate::data::reference::ReferenceTables;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + chrono::Duration::days(n)
    }

    fn row(commodity: &str, district: &str, date: NaiveDate, price: f64) -> FeedRow {
        FeedRow {
            commodity: Some(commodity.to_string()),
            district: Some(district.to_string()),
            modal_price: Decimal::from_f64(price),
            date: Some(date),
        }
    }

    /// Daily paddy quotes with a weekly cycle.
    fn paddy_rows(days: i64) -> Vec<FeedRow> {
        (0..days)
            .map(|t| {
                let price = 2100.0
                    + 3.0 * t as f64
                    + 40.0 * (2.0 * std::f64::consts::PI * t as f64 / 7.0).sin()
                    + 5.0 * (t as f64 * 1.3).cos();
                row("Paddy", "Warangal (Enumamula)", day(t), price.round())
            })
            .collect()
    }

    fn pipeline_with(columns: &[&str], rows: Vec<FeedRow>, config: ForecastConfig) -> ForecastPipeline {
        let snapshot = FeedSnapshot {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            origin: FeedOrigin::Primary,
            dropped_rows: 0,
        };
        let mut feed = MockPriceFeed::new();
        feed.expect_snapshot().returning(move || Ok(snapshot.clone()));
        let store = MarketDataStore::from_parts(
            Vec::new(),
            Vec::new(),
            Arc::new(feed),
            ReferenceTables::default(),
        );
        ForecastPipeline::new(Arc::new(store), config)
    }

    const FULL: &[&str] = &["Market", "Commodity", "District", "Modal_Price", "Date"];

    #[test]
    fn test_forecast_has_fixed_horizon() {
        let p = pipeline_with(FULL, paddy_rows(60), ForecastConfig::default());
        let points = p.forecast("paddy", "warangal").unwrap();
        assert_eq!(points.len(), FORECAST_HORIZON_DAYS);
        assert_eq!(FORECAST_HORIZON_DAYS, 30);
        for (i, pt) in points.iter().enumerate() {
            assert_eq!(pt.day_index as usize, i + 1);
            assert!(pt.lower_bound <= pt.predicted_price);
            assert!(pt.predicted_price <= pt.upper_bound);
        }
    }

    #[test]
    fn test_forecast_dates_continue_daily() {
        let p = pipeline_with(FULL, paddy_rows(45), ForecastConfig::default());
        let points = p.forecast("Paddy", "Warangal").unwrap();
        assert_eq!(points[0].date, Some(day(45)));
        assert_eq!(points[29].date, Some(day(74)));
        assert_eq!(points[0].label(), "2024-06-15");
    }

    #[test]
    fn test_series_filtered_by_substring_and_sorted() {
        let mut rows = paddy_rows(3);
        rows.reverse();
        rows.push(row("Maize", "Warangal", day(1), 1900.0));
        rows.push(row("Paddy", "Karimnagar", day(1), 2300.0));
        let p = pipeline_with(FULL, rows, ForecastConfig::default());

        let series = p.observed_series("paddy", "WARANGAL").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].0, day(0));
        assert_eq!(series[2].0, day(2));
    }

    #[test]
    fn test_empty_series_is_insufficient_history() {
        let p = pipeline_with(FULL, paddy_rows(60), ForecastConfig::default());
        let err = p.forecast("cotton", "Warangal").unwrap_err();
        match err {
            AgriError::InsufficientHistory { observations, .. } => assert_eq!(observations, 0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_series_is_insufficient_history() {
        let p = pipeline_with(FULL, paddy_rows(12), ForecastConfig::default());
        let err = p.forecast("paddy", "Warangal").unwrap_err();
        assert!(matches!(
            err,
            AgriError::InsufficientHistory { observations: 12, required: 21, .. }
        ));
    }

    #[test]
    fn test_missing_modal_price_column() {
        let p = pipeline_with(
            &["Commodity", "District", "Min_Price", "Date"],
            paddy_rows(30),
            ForecastConfig::default(),
        );
        let err = p.forecast("paddy", "Warangal").unwrap_err();
        match err {
            AgriError::MissingColumn { column, .. } => assert_eq!(column, MODAL_PRICE),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_date_column() {
        let p = pipeline_with(
            &["Commodity", "District", "Modal_Price"],
            paddy_rows(30),
            ForecastConfig::default(),
        );
        let err = p.forecast("paddy", "Warangal").unwrap_err();
        assert!(matches!(err, AgriError::MissingColumn { ref column, .. } if column == DATE));
    }

    #[test]
    fn test_district_filter_skipped_without_column() {
        let p = pipeline_with(
            &["Commodity", "Modal_Price", "Date"],
            paddy_rows(5),
            ForecastConfig::default(),
        );
        let series = p.observed_series("paddy", "Nowhere").unwrap();
        assert_eq!(series.len(), 5);
    }

    #[test]
    fn test_snapshot_written_on_success() {
        let mut path = std::env::temp_dir();
        path.push(format!("farmwise_forecast_{}.csv", uuid::Uuid::new_v4()));
        let config = ForecastConfig {
            snapshot_path: Some(path.clone()),
            ..ForecastConfig::default()
        };
        let p = pipeline_with(FULL, paddy_rows(40), config);
        let points = p.forecast("paddy", "warangal").unwrap();

        let saved = storage::load_forecast(&path).unwrap();
        assert_eq!(saved.len(), points.len());
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_forecast_async_matches_blocking() {
        let p = pipeline_with(FULL, paddy_rows(50), ForecastConfig::default());
        let blocking = p.forecast("paddy", "warangal").unwrap();
        let async_points = p.forecast_async("paddy", "warangal").await.unwrap();
        assert_eq!(blocking, async_points);
    }

    #[tokio::test]
    async fn test_forecast_async_times_out() {
        let config = ForecastConfig {
            fit_timeout: Duration::ZERO,
            ..ForecastConfig::default()
        };
        let p = pipeline_with(FULL, paddy_rows(365), config);
        let err = p.forecast_async("paddy", "warangal").await.unwrap_err();
        assert!(matches!(err, AgriError::ForecastTimeout(_)));
    }

    #[tokio::test]
    async fn test_forecast_async_panic_is_fit_failed() {
        let mut feed = MockPriceFeed::new();
        feed.expect_snapshot()
            .returning(|| panic!("feed reader crashed"));
        let store = MarketDataStore::from_parts(
            Vec::new(),
            Vec::new(),
            Arc::new(feed),
            ReferenceTables::default(),
        );
        let p = ForecastPipeline::new(Arc::new(store), ForecastConfig::default());

        let err = p.forecast_async("paddy", "warangal").await.unwrap_err();
        match err {
            AgriError::FitFailed(msg) => assert!(msg.contains("forecast task aborted")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancelled_fit_is_timeout() {
        let config = ForecastConfig {
            fit_timeout: Duration::from_secs(7),
            ..ForecastConfig::default()
        };
        let p = pipeline_with(FULL, paddy_rows(60), config);
        let err = p
            .run("paddy", "warangal", Arc::new(AtomicBool::new(true)))
            .unwrap_err();
        assert!(matches!(err, AgriError::ForecastTimeout(d) if d == Duration::from_secs(7)));
    }

    #[test]
    fn test_model_errors_carry_context() {
        let p = pipeline_with(FULL, Vec::new(), ForecastConfig::default());

        let err = p.model_error(ModelError::NonFinite("sigma2".into()), "paddy", "Warangal");
        assert!(matches!(err, AgriError::FitFailed(ref msg) if msg.contains("sigma2")));

        let err = p.model_error(ModelError::Cancelled, "paddy", "Warangal");
        assert!(matches!(err, AgriError::ForecastTimeout(d) if d == Duration::from_secs(30)));

        let err = p.model_error(ModelError::InvalidConfidence(1.5), "paddy", "Warangal");
        assert!(matches!(err, AgriError::InvalidConfig(_)));

        let err = p.model_error(
            ModelError::InsufficientData { observations: 4, required: 21 },
            "paddy",
            "Warangal",
        );
        match err {
            AgriError::InsufficientHistory { crop, district, observations, required } => {
                assert_eq!((crop.as_str(), district.as_str()), ("paddy", "Warangal"));
                assert_eq!((observations, required), (4, 21));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_forecast_async_reports_errors() {
        let p = pipeline_with(FULL, Vec::new(), ForecastConfig::default());
        let err = p.forecast_async("paddy", "warangal").await.unwrap_err();
        assert!(matches!(err, AgriError::InsufficientHistory { .. }));
    }

    #[test]
    fn test_forecast_dates_irregular_spacing() {
        let observed = vec![day(0), day(1), day(3)];
        assert_eq!(forecast_dates(&observed, 3), vec![None, None, None]);

        let duplicated = vec![day(0), day(0), day(1)];
        assert!(forecast_dates(&duplicated, 2).iter().all(Option::is_none));

        let weekly = vec![day(0), day(7), day(14)];
        assert_eq!(forecast_dates(&weekly, 2), vec![Some(day(21)), Some(day(28))]);
    }

    #[test]
    fn test_profit_curve() {
        let points = vec![
            ForecastPoint {
                day_index: 1,
                date: Some(day(0)),
                predicted_price: 2000.0,
                lower_bound: 1900.0,
                upper_bound: 2100.0,
            },
            ForecastPoint {
                day_index: 2,
                date: None,
                predicted_price: 2100.0,
                lower_bound: 1950.0,
                upper_bound: 2250.0,
            },
        ];
        let curve = profit_curve(&points, 20.0, 2.0, 50_000.0);
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].income, 80_000.0);
        assert_eq!(curve[0].profit, 30_000.0);
        assert_eq!(curve[0].date, "2024-05-01");
        assert_eq!(curve[1].profit, 84_000.0 - 50_000.0);
        assert_eq!(curve[1].date, "Day 2");
    }
}
