//! Market arbitrage.
//!
//! Ranks other districts by what a quintal would net after trucking it
//! there from the home market.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::data::MarketDataStore;
use crate::types::{AgriError, ArbitrageOpportunity, ArbitrageReport, PriceRecord};

// ---------------------------------------------------------------------------
// Configuration (defaults, overridden by config.toml at runtime)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ArbitrageConfig {
    /// Transport cost per km per quintal.
    pub transport_rate_per_km: Decimal,
    /// Used for district pairs missing from the distance table.
    pub default_distance_km: u32,
    pub max_opportunities: usize,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            transport_rate_per_km: dec!(8),
            default_distance_km: 150,
            max_opportunities: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

pub struct ArbitrageRecommender {
    store: Arc<MarketDataStore>,
    config: ArbitrageConfig,
}

impl ArbitrageRecommender {
    pub fn new(store: Arc<MarketDataStore>, config: ArbitrageConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ArbitrageConfig {
        &self.config
    }

    /// Best districts to sell `crop` in, relative to `home_district`.
    ///
    /// Every other district with history for the crop is a candidate at its
    /// first listed price. Opportunities are ranked by net gain, best first;
    /// negative gains are kept so the caller sees the full picture.
    pub fn recommend(&self, crop: &str, home_district: &str) -> Result<ArbitrageReport, AgriError> {
        let rows = self.store.crop_prices(crop);
        if rows.is_empty() {
            return Err(AgriError::NoCropData(crop.to_string()));
        }

        let home = self
            .store
            .price_for(crop, home_district)
            .ok_or_else(|| AgriError::NoHomePrice {
                crop: crop.to_string(),
                district: home_district.to_string(),
            })?;
        let home_key = home_district.trim().to_lowercase();

        // One candidate per district: its first row in file order, the same
        // rule that picks the home price.
        let mut seen: HashSet<String> = HashSet::new();
        let mut opportunities: Vec<ArbitrageOpportunity> = rows
            .into_iter()
            .filter(|row| {
                let key = row.district.trim().to_lowercase();
                key != home_key && seen.insert(key)
            })
            .map(|target| self.evaluate(home, target))
            .collect();
        let candidates = opportunities.len();

        opportunities.sort_by(|a, b| b.net_gain.cmp(&a.net_gain));
        opportunities.truncate(self.config.max_opportunities);

        for opp in &opportunities {
            debug!(crop, opportunity = %opp, "Arbitrage candidate");
        }
        info!(
            crop,
            home = %home.district,
            home_price = %home.price,
            candidates,
            best = ?opportunities.first().map(|o| o.district.as_str()),
            "Arbitrage ranked"
        );

        Ok(ArbitrageReport {
            home_district: home.district.clone(),
            home_price: home.price,
            opportunities,
        })
    }

    fn evaluate(&self, home: &PriceRecord, target: &PriceRecord) -> ArbitrageOpportunity {
        let distance_km = self
            .store
            .reference()
            .distances
            .known_distance(&home.district, &target.district)
            .unwrap_or(self.config.default_distance_km);
        let transport_cost = Decimal::from(distance_km) * self.config.transport_rate_per_km;
        let price_diff = target.price - home.price;

        ArbitrageOpportunity {
            district: target.district.clone(),
            price: target.price,
            price_diff,
            distance_km,
            transport_cost,
            net_gain: price_diff - transport_cost,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
