//! Market data store.
//!
//! Holds the immutable tables every engine reads: the district price
//! history, the crop cost table and the reference tables. The live feed is
//! reached through the [`PriceFeed`] trait and re-read on every query.
//! A store is built once at startup and shared behind an `Arc`.

pub mod feed;
pub mod history;
pub mod normalize;
pub mod reference;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::types::{AgriError, CostRecord, LoadReport, PriceRecord};
use feed::{CsvPriceFeed, FeedSnapshot, PriceFeed};
use normalize::MatchStrategy;
use reference::ReferenceTables;

/// File locations of the raw snapshots.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    pub price_history: PathBuf,
    pub crop_costs: PathBuf,
    pub live_prices: PathBuf,
    pub live_prices_backup: PathBuf,
}

/// Per-table normalization counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreLoadReport {
    pub price_history: LoadReport,
    pub crop_costs: LoadReport,
}

/// Read-only market and cost data shared by all engines.
pub struct MarketDataStore {
    history: Vec<PriceRecord>,
    costs: Vec<CostRecord>,
    feed: Arc<dyn PriceFeed>,
    reference: ReferenceTables,
    load_report: StoreLoadReport,
}

impl fmt::Debug for MarketDataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The feed is an opaque trait object.
        f.debug_struct("MarketDataStore")
            .field("history_rows", &self.history.len())
            .field("cost_rows", &self.costs.len())
            .field("reference", &self.reference)
            .field("load_report", &self.load_report)
            .finish_non_exhaustive()
    }
}

impl MarketDataStore {
    /// Load both static snapshots from disk and wire up the live feed.
    pub fn load(paths: &DatasetPaths) -> Result<Self, AgriError> {
        let (history, history_report) = history::load_price_history(&paths.price_history)?;
        let (costs, cost_report) = history::load_cost_table(&paths.crop_costs)?;
        let feed = CsvPriceFeed::new(&paths.live_prices, &paths.live_prices_backup);

        let store = Self::from_parts(history, costs, Arc::new(feed), ReferenceTables::default())
            .with_load_report(StoreLoadReport {
                price_history: history_report,
                crop_costs: cost_report,
            });

        info!(
            price_rows = store.history.len(),
            cost_rows = store.costs.len(),
            districts = store.districts().len(),
            crops = store.crops().len(),
            "Market data store ready"
        );
        Ok(store)
    }

    /// Assemble a store from already-normalized tables.
    pub fn from_parts(
        history: Vec<PriceRecord>,
        costs: Vec<CostRecord>,
        feed: Arc<dyn PriceFeed>,
        reference: ReferenceTables,
    ) -> Self {
        Self {
            history,
            costs,
            feed,
            reference,
            load_report: StoreLoadReport::default(),
        }
    }

    fn with_load_report(mut self, report: StoreLoadReport) -> Self {
        self.load_report = report;
        self
    }

    // -- Accessors ---------------------------------------------------------

    pub fn history(&self) -> &[PriceRecord] {
        &self.history
    }

    pub fn costs(&self) -> &[CostRecord] {
        &self.costs
    }

    pub fn reference(&self) -> &ReferenceTables {
        &self.reference
    }

    pub fn load_report(&self) -> StoreLoadReport {
        self.load_report
    }

    /// Fresh read of the live feed.
    pub fn live_snapshot(&self) -> Result<FeedSnapshot, AgriError> {
        self.feed.snapshot()
    }

    // -- Queries -----------------------------------------------------------

    /// All history rows for a crop, in file order.
    pub fn crop_prices(&self, crop: &str) -> Vec<&PriceRecord> {
        self.history
            .iter()
            .filter(|r| MatchStrategy::Exact.matches(&r.crop, crop))
            .collect()
    }

    /// Reference history row for a crop in a district: the first match in
    /// file order.
    pub fn price_for(&self, crop: &str, district: &str) -> Option<&PriceRecord> {
        self.crop_prices(crop)
            .into_iter()
            .find(|r| MatchStrategy::Exact.matches(&r.district, district))
    }

    /// Cost row for a crop and season.
    pub fn cost_for(&self, crop: &str, season: &str) -> Option<&CostRecord> {
        self.costs.iter().find(|c| {
            MatchStrategy::Exact.matches(&c.crop_type, crop)
                && MatchStrategy::Exact.matches(&c.season, season)
        })
    }

    /// Sorted unique district names in the price history.
    pub fn districts(&self) -> Vec<String> {
        unique_sorted(self.history.iter().map(|r| r.district.as_str()))
    }

    /// Sorted unique (normalized) crop names in the price history.
    pub fn crops(&self) -> Vec<String> {
        unique_sorted(self.history.iter().map(|r| r.crop.as_str()))
    }

    /// Sorted unique seasons in the cost table.
    pub fn seasons(&self) -> Vec<String> {
        unique_sorted(self.costs.iter().map(|c| c.season.as_str()))
    }
}

fn unique_sorted<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
