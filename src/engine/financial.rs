//! Financial calculator: income, expense and balance for a planting.
//!
//! Price comes from the live feed when it quotes the exact crop and
//! district, otherwise from the static history. Cost is either the
//! recommended figure from the cost table or the farmer's own.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::normalize::MatchStrategy;
use crate::data::MarketDataStore;
use crate::types::{AgriError, CostMode, FinancialSummary, PriceSource};

/// Inputs for one calculation.
#[derive(Debug, Clone)]
pub struct FinancialQuery {
    pub district: String,
    pub crop: String,
    pub season: String,
    pub acres: Decimal,
    pub cost_mode: CostMode,
}

pub struct FinancialCalculator {
    store: Arc<MarketDataStore>,
}

impl FinancialCalculator {
    pub fn new(store: Arc<MarketDataStore>) -> Self {
        Self { store }
    }

    /// Compute the financial summary. No rounding is applied.
    pub fn compute(&self, query: &FinancialQuery) -> Result<FinancialSummary, AgriError> {
        let (price, price_source) = self.resolve_price(&query.crop, &query.district)?;
        let cost_per_acre = self.resolve_cost(&query.crop, &query.season, query.cost_mode)?;
        let yield_per_acre = self.store.reference().yields.yield_per_acre(&query.crop);

        let total_income = price * yield_per_acre * query.acres;
        let total_expense = cost_per_acre * query.acres;
        let balance = total_income - total_expense;

        let summary = FinancialSummary {
            price,
            price_source,
            cost_per_acre,
            yield_per_acre,
            total_income,
            total_expense,
            balance,
        };

        info!(
            crop = %query.crop,
            district = %query.district,
            season = %query.season,
            acres = %query.acres,
            price = %summary.price,
            source = %summary.price_source,
            balance = %summary.balance,
            "Financials computed"
        );
        Ok(summary)
    }

    /// Live feed first (exact crop and district match), then the history.
    pub fn resolve_price(
        &self,
        crop: &str,
        district: &str,
    ) -> Result<(Decimal, PriceSource), AgriError> {
        let snapshot = self.store.live_snapshot()?;
        let scraped = snapshot.rows.iter().find_map(|row| {
            let commodity = row.commodity.as_deref()?;
            let row_district = row.district.as_deref()?;
            if MatchStrategy::Exact.matches(commodity, crop)
                && MatchStrategy::Exact.matches(row_district, district)
            {
                row.modal_price
            } else {
                None
            }
        });

        if let Some(price) = scraped {
            debug!(crop, district, %price, "Using live feed price");
            return Ok((price, PriceSource::Scraped));
        }

        warn!(crop, district, "No live price, falling back to static history");
        self.store
            .price_for(crop, district)
            .map(|record| (record.price, PriceSource::Static))
            .ok_or_else(|| AgriError::NoPriceData {
                crop: crop.to_string(),
                district: district.to_string(),
            })
    }

    fn resolve_cost(
        &self,
        crop: &str,
        season: &str,
        mode: CostMode,
    ) -> Result<Decimal, AgriError> {
        match mode {
            CostMode::Custom { cost_per_acre } => {
                debug!(%cost_per_acre, "Using custom cost per acre");
                Ok(cost_per_acre)
            }
            CostMode::Recommended => self
                .store
                .cost_for(crop, season)
                .map(|c| c.total_expenditure)
                .ok_or_else(|| AgriError::NoCostEntry {
                    crop: crop.to_string(),
                    season: season.to_string(),
                }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
