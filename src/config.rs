//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Engine tunables fall back to their defaults when a section is omitted;
//! dataset locations and the report request must be given.

use anyhow::{Context, Result};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::data::DatasetPaths;
use crate::engine::{FinancialQuery, ForecastConfig};
use crate::strategy::ArbitrageConfig;
use crate::types::{AgriError, CostMode};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub datasets: DatasetsConfig,
    #[serde(default)]
    pub forecast: ForecastSettings,
    #[serde(default)]
    pub arbitrage: ArbitrageSettings,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetsConfig {
    pub price_history: PathBuf,
    pub crop_costs: PathBuf,
    pub live_prices: PathBuf,
    pub live_prices_backup: PathBuf,
    /// Forecast audit snapshot; omitted means no snapshot is written.
    #[serde(default)]
    pub forecast_snapshot: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ForecastSettings {
    pub confidence: f64,
    pub fit_timeout_secs: u64,
    pub max_iterations: usize,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        let defaults = ForecastConfig::default();
        Self {
            confidence: defaults.confidence,
            fit_timeout_secs: defaults.fit_timeout.as_secs(),
            max_iterations: defaults.max_iterations,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArbitrageSettings {
    pub transport_rate_per_km: f64,
    pub default_distance_km: u32,
    pub max_opportunities: usize,
}

impl Default for ArbitrageSettings {
    fn default() -> Self {
        Self {
            transport_rate_per_km: 8.0,
            default_distance_km: 150,
            max_opportunities: 3,
        }
    }
}

/// The planting the binary reports on.
#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    pub district: String,
    pub crop: String,
    pub season: String,
    pub acres: f64,
    /// "recommended" or "custom".
    #[serde(default = "default_cost_mode")]
    pub cost_mode: String,
    #[serde(default)]
    pub custom_cost_per_acre: Option<f64>,
}

fn default_cost_mode() -> String {
    "recommended".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {path}"))?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Reject settings the engines cannot run with.
    pub fn validate(&self) -> Result<(), AgriError> {
        if !(self.forecast.confidence > 0.0 && self.forecast.confidence < 1.0) {
            return Err(AgriError::InvalidConfig(format!(
                "forecast.confidence must be in (0, 1), got {}",
                self.forecast.confidence
            )));
        }
        if self.forecast.fit_timeout_secs == 0 {
            return Err(AgriError::InvalidConfig("forecast.fit_timeout_secs must be > 0".into()));
        }
        if !self.arbitrage.transport_rate_per_km.is_finite()
            || self.arbitrage.transport_rate_per_km < 0.0
        {
            return Err(AgriError::InvalidConfig(
                "arbitrage.transport_rate_per_km must be a non-negative number".into(),
            ));
        }
        self.report.query()?;
        Ok(())
    }

    pub fn dataset_paths(&self) -> DatasetPaths {
        DatasetPaths {
            price_history: self.datasets.price_history.clone(),
            crop_costs: self.datasets.crop_costs.clone(),
            live_prices: self.datasets.live_prices.clone(),
            live_prices_backup: self.datasets.live_prices_backup.clone(),
        }
    }

    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            confidence: self.forecast.confidence,
            fit_timeout: Duration::from_secs(self.forecast.fit_timeout_secs),
            max_iterations: self.forecast.max_iterations,
            snapshot_path: self.datasets.forecast_snapshot.clone(),
        }
    }

    pub fn arbitrage_config(&self) -> Result<ArbitrageConfig, AgriError> {
        Ok(ArbitrageConfig {
            transport_rate_per_km: to_decimal(
                self.arbitrage.transport_rate_per_km,
                "arbitrage.transport_rate_per_km",
            )?,
            default_distance_km: self.arbitrage.default_distance_km,
            max_opportunities: self.arbitrage.max_opportunities,
        })
    }
}

impl ReportConfig {
    /// The financial query this report describes.
    pub fn query(&self) -> Result<FinancialQuery, AgriError> {
        let cost_mode = match self.cost_mode.trim().to_lowercase().as_str() {
            "recommended" => CostMode::Recommended,
            "custom" => {
                let cost = self.custom_cost_per_acre.ok_or_else(|| {
                    AgriError::InvalidConfig(
                        "report.custom_cost_per_acre is required when cost_mode = \"custom\"".into(),
                    )
                })?;
                CostMode::Custom {
                    cost_per_acre: to_decimal(cost, "report.custom_cost_per_acre")?,
                }
            }
            other => {
                return Err(AgriError::InvalidConfig(format!(
                    "unknown report.cost_mode: {other}"
                )))
            }
        };

        if self.acres < 0.0 {
            return Err(AgriError::InvalidConfig("report.acres must be >= 0".into()));
        }

        Ok(FinancialQuery {
            district: self.district.clone(),
            crop: self.crop.clone(),
            season: self.season.clone(),
            acres: to_decimal(self.acres, "report.acres")?,
            cost_mode,
        })
    }
}

fn to_decimal(value: f64, field: &str) -> Result<Decimal, AgriError> {
    Decimal::from_f64(value)
        .ok_or_else(|| AgriError::InvalidConfig(format!("{field} is not a valid number: {value}")))
}
