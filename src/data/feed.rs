//! Live price feed.
//!
//! The external scraper overwrites a CSV snapshot on its own schedule.
//! Every call to [`PriceFeed::snapshot`] re-reads it, so freshness is
//! bounded only by the scraper's write cadence. If the primary file is
//! unreadable the backup snapshot is used instead.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::normalize::{normalize_header, parse_amount, parse_feed_date};
use crate::types::AgriError;

pub const COMMODITY: &str = "Commodity";
pub const DISTRICT: &str = "District";
pub const MODAL_PRICE: &str = "Modal_Price";
pub const DATE: &str = "Date";

const FEED_DATASET: &str = "live price feed";

/// One row of the live feed. Every field is optional because the feed
/// schema belongs to the scraper, not to us.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRow {
    pub commodity: Option<String>,
    pub district: Option<String>,
    pub modal_price: Option<Decimal>,
    pub date: Option<NaiveDate>,
}

/// Which file a snapshot was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrigin {
    Primary,
    Backup,
}

/// One read of the live price feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    /// Normalized column names, in file order.
    pub columns: Vec<String>,
    pub rows: Vec<FeedRow>,
    pub origin: FeedOrigin,
    /// Rows whose price or date was present but did not parse.
    pub dropped_rows: usize,
}

impl FeedSnapshot {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Parse a snapshot from CSV text.
    pub fn from_reader<R: Read>(source: R, origin: FeedOrigin) -> Result<Self, AgriError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let headers = rdr.headers().map_err(|e| AgriError::DatasetUnavailable {
            dataset: FEED_DATASET.to_string(),
            message: format!("unreadable header row: {e}"),
        })?;
        let columns = canonical_columns(headers.iter().map(normalize_header).collect());

        let index_of = |name: &str| columns.iter().position(|c| c == name);
        let commodity_idx = index_of(COMMODITY);
        let district_idx = index_of(DISTRICT);
        let price_idx = index_of(MODAL_PRICE);
        let date_idx = index_of(DATE);

        let mut rows = Vec::new();
        let mut dropped_rows = 0usize;

        for result in rdr.records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    debug!(error = %e, "Unreadable feed row");
                    dropped_rows += 1;
                    continue;
                }
            };
            let text = |idx: Option<usize>| {
                idx.and_then(|i| record.get(i))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
            };

            let raw_price = text(price_idx);
            let raw_date = text(date_idx);
            let modal_price = raw_price.and_then(parse_amount);
            let date = raw_date.and_then(parse_feed_date);

            if (raw_price.is_some() && modal_price.is_none())
                || (raw_date.is_some() && date.is_none())
            {
                dropped_rows += 1;
                continue;
            }

            rows.push(FeedRow {
                commodity: text(commodity_idx).map(str::to_string),
                district: text(district_idx).map(str::to_string),
                modal_price,
                date,
            });
        }

        Ok(Self {
            columns,
            rows,
            origin,
            dropped_rows,
        })
    }
}

/// If no column is literally `Modal_Price`, rename the first column whose
/// name mentions "modal" to it.
fn canonical_columns(mut columns: Vec<String>) -> Vec<String> {
    if columns.iter().any(|c| c == MODAL_PRICE) {
        return columns;
    }
    if let Some(col) = columns
        .iter_mut()
        .find(|c| c.to_lowercase().contains("modal"))
    {
        debug!(from = %col, to = MODAL_PRICE, "Renaming modal price column");
        *col = MODAL_PRICE.to_string();
    }
    columns
}

/// Source of live price snapshots.
#[cfg_attr(test, mockall::automock)]
pub trait PriceFeed: Send + Sync {
    /// Read the current snapshot. Never cached.
    fn snapshot(&self) -> Result<FeedSnapshot, AgriError>;
}

/// File-backed feed with a backup snapshot.
#[derive(Debug, Clone)]
pub struct CsvPriceFeed {
    primary: PathBuf,
    backup: PathBuf,
}

impl CsvPriceFeed {
    pub fn new(primary: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            backup: backup.into(),
        }
    }

    fn read(path: &Path, origin: FeedOrigin) -> Result<FeedSnapshot, AgriError> {
        let file = std::fs::File::open(path).map_err(|e| AgriError::DatasetUnavailable {
            dataset: FEED_DATASET.to_string(),
            message: format!("{}: {e}", path.display()),
        })?;
        FeedSnapshot::from_reader(file, origin)
    }
}

impl PriceFeed for CsvPriceFeed {
    fn snapshot(&self) -> Result<FeedSnapshot, AgriError> {
        let snapshot = match Self::read(&self.primary, FeedOrigin::Primary) {
            Ok(s) => s,
            Err(primary_err) => {
                warn!(
                    path = %self.primary.display(),
                    error = %primary_err,
                    "Primary price feed unreadable, using backup"
                );
                Self::read(&self.backup, FeedOrigin::Backup).map_err(|backup_err| {
                    AgriError::DatasetUnavailable {
                        dataset: FEED_DATASET.to_string(),
                        message: format!("primary: {primary_err}; backup: {backup_err}"),
                    }
                })?
            }
        };

        debug!(
            origin = ?snapshot.origin,
            rows = snapshot.rows.len(),
            dropped = snapshot.dropped_rows,
            "Price feed read"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn temp_path(tag: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("farmwise_feed_{tag}_{}.csv", uuid::Uuid::new_v4()));
        p
    }

    const FEED_CSV: &str = "\
Market,Commodity,District,Modal Price,Date
Enumamula,Paddy,Warangal,\"2,310\",2024-06-01
Kesamudram,Paddy,Warangal,2290,2024-06-02
Jammikunta,Paddy,Karimnagar,N/A,2024-06-02
";

    #[test]
    fn test_modal_column_renamed() {
        let snap = FeedSnapshot::from_reader(FEED_CSV.as_bytes(), FeedOrigin::Primary).unwrap();
        assert!(snap.has_column(MODAL_PRICE));
        assert!(!snap.has_column("Modal Price"));
        assert_eq!(snap.rows.len(), 2);
        assert_eq!(snap.dropped_rows, 1);
        assert_eq!(snap.rows[0].modal_price, Some(dec!(2310)));
        assert_eq!(snap.rows[0].district.as_deref(), Some("Warangal"));
    }

    #[test]
    fn test_near_variant_modal_column() {
        let csv = "Commodity,District,modal_price_rs,Date\nPaddy,Warangal,2100,2024-06-01\n";
        let snap = FeedSnapshot::from_reader(csv.as_bytes(), FeedOrigin::Primary).unwrap();
        assert_eq!(snap.columns[2], MODAL_PRICE);
        assert_eq!(snap.rows[0].modal_price, Some(dec!(2100)));
    }

    #[test]
    fn test_backup_used_when_primary_missing() {
        let backup = temp_path("backup");
        std::fs::write(&backup, FEED_CSV).unwrap();

        let feed = CsvPriceFeed::new(temp_path("missing"), &backup);
        let snap = feed.snapshot().unwrap();
        assert_eq!(snap.origin, FeedOrigin::Backup);
        assert_eq!(snap.rows.len(), 2);

        std::fs::remove_file(&backup).unwrap();
    }

    #[test]
    fn test_feed_reread_on_every_call() {
        let primary = temp_path("primary");
        std::fs::write(&primary, FEED_CSV).unwrap();
        let feed = CsvPriceFeed::new(&primary, temp_path("unused"));
        assert_eq!(feed.snapshot().unwrap().rows.len(), 2);

        std::fs::write(&primary, "Commodity,District,Modal_Price,Date\n").unwrap();
        let snap = feed.snapshot().unwrap();
        assert_eq!(snap.origin, FeedOrigin::Primary);
        assert!(snap.rows.is_empty());

        std::fs::remove_file(&primary).unwrap();
    }

    #[test]
    fn test_both_files_missing_is_unavailable() {
        let feed = CsvPriceFeed::new(temp_path("a"), temp_path("b"));
        let err = feed.snapshot().unwrap_err();
        assert!(matches!(err, AgriError::DatasetUnavailable { .. }));
    }
}
