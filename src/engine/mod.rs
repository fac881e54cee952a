//! Core engines: financial summary and price forecasting.

pub mod financial;
pub mod forecast;

pub use financial::{FinancialCalculator, FinancialQuery};
pub use forecast::{profit_curve, ForecastConfig, ForecastPipeline, FORECAST_HORIZON_DAYS};
