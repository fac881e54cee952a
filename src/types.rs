//! Shared types for FARMWISE.
//!
//! These types form the data model used across all modules.
//! Loader, engine, and strategy modules depend on them without
//! depending on each other.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// Where an observed price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// Historical district snapshot, loaded once at startup.
    Static,
    /// Live feed deposited by the external scraper.
    Scraped,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Static => write!(f, "static"),
            PriceSource::Scraped => write!(f, "scraped"),
        }
    }
}

/// One observed market price for a crop in a district.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub district: String,
    /// Normalized crop name (lower-case, qualifiers removed).
    pub crop: String,
    /// Modal price in currency per quintal.
    pub price: Decimal,
    pub date: NaiveDate,
    pub qn_per_acre: Decimal,
    pub source: PriceSource,
}

impl fmt::Display for PriceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}: {}/qtl on {} ({})",
            self.crop, self.district, self.price, self.date, self.source
        )
    }
}

/// Per-crop, per-season cultivation cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Lower-cased crop name.
    pub crop_type: String,
    /// Title-cased season name ("Kharif", "Rabi", ...).
    pub season: String,
    /// Currency per acre.
    pub total_expenditure: Decimal,
}

/// Row counts from normalizing one raw table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_dropped: usize,
}

impl LoadReport {
    pub fn rows_kept(&self) -> usize {
        self.rows_read - self.rows_dropped
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows read, {} kept, {} dropped",
            self.rows_read,
            self.rows_kept(),
            self.rows_dropped
        )
    }
}

// ---------------------------------------------------------------------------
// Engine outputs
// ---------------------------------------------------------------------------

/// How the per-acre cultivation cost is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CostMode {
    /// Look the cost up in the crop cost table.
    #[default]
    Recommended,
    /// Use the farmer's own figure verbatim.
    Custom { cost_per_acre: Decimal },
}

/// Realized financial outcome for a district/crop/season/acreage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub price: Decimal,
    pub price_source: PriceSource,
    pub cost_per_acre: Decimal,
    pub yield_per_acre: Decimal,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub balance: Decimal,
}

impl fmt::Display for FinancialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "price {}/qtl ({}) | cost {}/acre | income {} | expense {} | balance {}",
            self.price,
            self.price_source,
            self.cost_per_acre,
            self.total_income,
            self.total_expense,
            self.balance,
        )
    }
}

/// One projected day of the price forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-based position within the horizon.
    pub day_index: u32,
    pub date: Option<NaiveDate>,
    pub predicted_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl ForecastPoint {
    /// ISO date when known, otherwise "Day N".
    pub fn label(&self) -> String {
        match self.date {
            Some(d) => d.format("%Y-%m-%d").to_string(),
            None => format!("Day {}", self.day_index),
        }
    }
}

/// One day of the derived profit curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitPoint {
    pub day: u32,
    pub date: String,
    pub price: f64,
    pub income: f64,
    pub profit: f64,
}

/// A district worth selling into instead of the home market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageOpportunity {
    pub district: String,
    pub price: Decimal,
    /// Target price minus home price.
    pub price_diff: Decimal,
    pub distance_km: u32,
    pub transport_cost: Decimal,
    /// `price_diff - transport_cost`
    pub net_gain: Decimal,
}

impl fmt::Display for ArbitrageOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/qtl ({:+}) | {} km | transport {} | net {:+}",
            self.district,
            self.price,
            self.price_diff,
            self.distance_km,
            self.transport_cost,
            self.net_gain,
        )
    }
}

/// Ranked arbitrage result for a crop and home district.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageReport {
    pub home_district: String,
    pub home_price: Decimal,
    pub opportunities: Vec<ArbitrageOpportunity>,
}

/// Loan-eligibility tier derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditTier {
    Gold,
    Silver,
    HighRisk,
}

impl CreditTier {
    /// Tier for a composite score. Boundaries belong to the higher tier.
    pub fn for_score(score: u32) -> Self {
        if score >= 750 {
            CreditTier::Gold
        } else if score >= 500 {
            CreditTier::Silver
        } else {
            CreditTier::HighRisk
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CreditTier::Gold => "Gold Tier (Low Interest Loan Eligible)",
            CreditTier::Silver => "Silver Tier (Moderate Risk)",
            CreditTier::HighRisk => "High Risk Farmer",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            CreditTier::Gold => "green",
            CreditTier::Silver => "yellow",
            CreditTier::HighRisk => "red",
        }
    }
}

impl fmt::Display for CreditTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The three weighted components of a credit score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub profitability_score: u32,
    pub efficiency_score: u32,
    pub risk_score: u32,
}

/// Composite creditworthiness score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreditScoreResult {
    /// 0–1000
    pub score: u32,
    pub category: String,
    pub color: String,
    #[serde(skip)]
    pub tier: CreditTier,
    pub breakdown: ScoreBreakdown,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for FARMWISE.
#[derive(Debug, thiserror::Error)]
pub enum AgriError {
    #[error("Dataset unavailable ({dataset}): {message}")]
    DatasetUnavailable { dataset: String, message: String },

    #[error("Missing column `{column}` in {dataset}")]
    MissingColumn { dataset: String, column: String },

    #[error("No price found for {crop} in {district} in either the live feed or the history")]
    NoPriceData { crop: String, district: String },

    #[error("No price data for {crop} in {district}")]
    NoHomePrice { crop: String, district: String },

    #[error("No data found for crop: {0}")]
    NoCropData(String),

    #[error("No cost entry for {crop} - {season}")]
    NoCostEntry { crop: String, season: String },

    #[error("Insufficient history for {crop} in {district}: {observations} observations, need {required}")]
    InsufficientHistory {
        crop: String,
        district: String,
        observations: usize,
        required: usize,
    },

    #[error("Model fit failed: {0}")]
    FitFailed(String),

    #[error("Forecast timed out after {0:?}")]
    ForecastTimeout(std::time::Duration),

    #[error("Expense cannot be zero")]
    ZeroExpense,

    #[error("Configuration error: {0}")]
    InvalidConfig(String),
}

impl AgriError {
    /// Errors the caller can fix by asking for a supported crop/district
    /// or different inputs.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            AgriError::NoPriceData { .. }
                | AgriError::NoHomePrice { .. }
                | AgriError::NoCropData(_)
                | AgriError::NoCostEntry { .. }
                | AgriError::InsufficientHistory { .. }
                | AgriError::ZeroExpense
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_source_display() {
        assert_eq!(format!("{}", PriceSource::Static), "static");
        assert_eq!(format!("{}", PriceSource::Scraped), "scraped");
    }

    #[test]
    fn test_price_source_serializes_lowercase() {
        let json = serde_json::to_string(&PriceSource::Scraped).unwrap();
        assert_eq!(json, "\"scraped\"");
    }

    #[test]
    fn test_forecast_point_label() {
        let mut p = ForecastPoint {
            day_index: 4,
            date: None,
            predicted_price: 2100.0,
            lower_bound: 2000.0,
            upper_bound: 2200.0,
        };
        assert_eq!(p.label(), "Day 4");

        p.date = NaiveDate::from_ymd_opt(2024, 3, 9);
        assert_eq!(p.label(), "2024-03-09");
    }

    #[test]
    fn test_tier_boundaries_inclusive_of_higher_tier() {
        assert_eq!(CreditTier::for_score(1000), CreditTier::Gold);
        assert_eq!(CreditTier::for_score(750), CreditTier::Gold);
        assert_eq!(CreditTier::for_score(749), CreditTier::Silver);
        assert_eq!(CreditTier::for_score(500), CreditTier::Silver);
        assert_eq!(CreditTier::for_score(499), CreditTier::HighRisk);
        assert_eq!(CreditTier::for_score(0), CreditTier::HighRisk);
    }

    #[test]
    fn test_tier_colors() {
        assert_eq!(CreditTier::Gold.color(), "green");
        assert_eq!(CreditTier::Silver.color(), "yellow");
        assert_eq!(CreditTier::HighRisk.color(), "red");
    }

    #[test]
    fn test_cost_mode_deserialize() {
        let m: CostMode = serde_json::from_str(r#"{"mode":"recommended"}"#).unwrap();
        assert_eq!(m, CostMode::Recommended);

        let m: CostMode =
            serde_json::from_str(r#"{"mode":"custom","cost_per_acre":18500.5}"#).unwrap();
        assert_eq!(m, CostMode::Custom { cost_per_acre: dec!(18500.5) });
    }

    #[test]
    fn test_load_report_display() {
        let r = LoadReport { rows_read: 10, rows_dropped: 3 };
        assert_eq!(r.rows_kept(), 7);
        assert_eq!(format!("{r}"), "10 rows read, 7 kept, 3 dropped");
    }

    #[test]
    fn test_error_display() {
        let e = AgriError::NoCostEntry {
            crop: "paddy".into(),
            season: "Rabi".into(),
        };
        assert_eq!(format!("{e}"), "No cost entry for paddy - Rabi");
        assert_eq!(format!("{}", AgriError::ZeroExpense), "Expense cannot be zero");
    }

    #[test]
    fn test_caller_errors() {
        assert!(AgriError::NoCropData("wheat".into()).is_caller_error());
        assert!(AgriError::ZeroExpense.is_caller_error());
        assert!(!AgriError::FitFailed("nan".into()).is_caller_error());
        assert!(!AgriError::DatasetUnavailable {
            dataset: "x".into(),
            message: "y".into()
        }
        .is_caller_error());
    }
}
