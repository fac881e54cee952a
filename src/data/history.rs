//! Static snapshot loaders: district price history and crop cultivation cost.
//!
//! Both tables are read once at startup. Rows whose price, cost or date
//! fails to parse are skipped and counted in the returned `LoadReport`;
//! a missing file or a missing required column fails the whole load.

use csv::StringRecord;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use super::normalize::{normalize_crop, parse_amount, parse_dmy_date, title_case};
use crate::types::{AgriError, CostRecord, LoadReport, PriceRecord, PriceSource};

const HISTORY_DATASET: &str = "district price history";
const COST_DATASET: &str = "crop cost table";

// Raw header -> canonical name.
const HISTORY_COLUMNS: &[(&str, &str)] = &[
    ("District Name", "District"),
    ("Commodity", "Crop"),
    ("Modal Price (Rs./Quintal)", "Price"),
    ("Price Date", "Date"),
    ("qn_per_acre", "qn_per_acre"),
];

const COST_COLUMNS: &[&str] = &["Crop_Type", "Season", "Total_Expenditure"];

/// Map canonical column name -> index, renaming raw headers on the way.
fn header_map(headers: &StringRecord, renames: &[(&str, &str)]) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, raw)| {
            let name = raw.trim().trim_start_matches('\u{feff}').trim();
            let canonical = renames
                .iter()
                .find(|(from, _)| *from == name)
                .map(|(_, to)| (*to).to_string())
                .unwrap_or_else(|| name.to_string());
            (canonical, idx)
        })
        .collect()
}

fn require(
    map: &HashMap<String, usize>,
    column: &str,
    dataset: &str,
) -> Result<usize, AgriError> {
    map.get(column).copied().ok_or_else(|| AgriError::MissingColumn {
        dataset: dataset.to_string(),
        column: column.to_string(),
    })
}

fn open(path: &Path, dataset: &str) -> Result<std::fs::File, AgriError> {
    std::fs::File::open(path).map_err(|e| AgriError::DatasetUnavailable {
        dataset: dataset.to_string(),
        message: format!("{}: {e}", path.display()),
    })
}

fn reader<R: Read>(source: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source)
}

// ---------------------------------------------------------------------------
// District price history
// ---------------------------------------------------------------------------

/// Load the district price history from a CSV file.
pub fn load_price_history(path: &Path) -> Result<(Vec<PriceRecord>, LoadReport), AgriError> {
    let file = open(path, HISTORY_DATASET)?;
    let (records, report) = read_price_history(file)?;
    info!(
        path = %path.display(),
        rows = report.rows_read,
        kept = report.rows_kept(),
        dropped = report.rows_dropped,
        "District price history loaded"
    );
    Ok((records, report))
}

/// Parse the district price history from any reader.
pub fn read_price_history<R: Read>(
    source: R,
) -> Result<(Vec<PriceRecord>, LoadReport), AgriError> {
    let mut rdr = reader(source);
    let headers = rdr
        .headers()
        .map_err(|e| AgriError::DatasetUnavailable {
            dataset: HISTORY_DATASET.to_string(),
            message: format!("unreadable header row: {e}"),
        })?
        .clone();

    let map = header_map(&headers, HISTORY_COLUMNS);
    let district_idx = require(&map, "District", HISTORY_DATASET)?;
    let crop_idx = require(&map, "Crop", HISTORY_DATASET)?;
    let price_idx = require(&map, "Price", HISTORY_DATASET)?;
    let date_idx = require(&map, "Date", HISTORY_DATASET)?;
    let yield_idx = require(&map, "qn_per_acre", HISTORY_DATASET)?;

    let mut records = Vec::new();
    let mut report = LoadReport::default();

    for (idx, result) in rdr.records().enumerate() {
        report.rows_read += 1;
        let line = idx + 2;

        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(line, error = %e, "Unreadable history row");
                report.rows_dropped += 1;
                continue;
            }
        };

        let field = |i: usize| row.get(i).unwrap_or("");
        let parsed = (
            parse_dmy_date(field(date_idx)),
            parse_amount(field(price_idx)),
            parse_amount(field(yield_idx)),
        );

        match parsed {
            (Some(date), Some(price), Some(qn_per_acre)) => records.push(PriceRecord {
                district: field(district_idx).to_string(),
                crop: normalize_crop(field(crop_idx)),
                price,
                date,
                qn_per_acre,
                source: PriceSource::Static,
            }),
            _ => {
                debug!(line, "History row dropped: date, price or qn_per_acre did not parse");
                report.rows_dropped += 1;
            }
        }
    }

    if report.rows_dropped > 0 {
        warn!(
            dataset = HISTORY_DATASET,
            dropped = report.rows_dropped,
            "Rows dropped during normalization"
        );
    }

    Ok((records, report))
}

// ---------------------------------------------------------------------------
// Crop cost table
// ---------------------------------------------------------------------------

/// Load the crop cultivation cost table from a CSV file.
pub fn load_cost_table(path: &Path) -> Result<(Vec<CostRecord>, LoadReport), AgriError> {
    let file = open(path, COST_DATASET)?;
    let (records, report) = read_cost_table(file)?;
    info!(
        path = %path.display(),
        rows = report.rows_read,
        kept = report.rows_kept(),
        dropped = report.rows_dropped,
        "Crop cost table loaded"
    );
    Ok((records, report))
}

/// Parse the crop cost table from any reader.
pub fn read_cost_table<R: Read>(source: R) -> Result<(Vec<CostRecord>, LoadReport), AgriError> {
    let mut rdr = reader(source);
    let headers = rdr
        .headers()
        .map_err(|e| AgriError::DatasetUnavailable {
            dataset: COST_DATASET.to_string(),
            message: format!("unreadable header row: {e}"),
        })?
        .clone();

    let map = header_map(&headers, &[]);
    let indices: Vec<usize> = COST_COLUMNS
        .iter()
        .map(|c| require(&map, c, COST_DATASET))
        .collect::<Result<_, _>>()?;
    let (crop_idx, season_idx, cost_idx) = (indices[0], indices[1], indices[2]);

    let mut records = Vec::new();
    let mut report = LoadReport::default();

    for result in rdr.records() {
        report.rows_read += 1;
        let Ok(row) = result else {
            report.rows_dropped += 1;
            continue;
        };

        let field = |i: usize| row.get(i).unwrap_or("");
        match parse_amount(field(cost_idx)) {
            Some(total_expenditure) => records.push(CostRecord {
                crop_type: field(crop_idx).trim().to_lowercase(),
                season: title_case(field(season_idx)),
                total_expenditure,
            }),
            None => report.rows_dropped += 1,
        }
    }

    if report.rows_dropped > 0 {
        warn!(
            dataset = COST_DATASET,
            dropped = report.rows_dropped,
            "Rows dropped during normalization"
        );
    }

    Ok((records, report))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
