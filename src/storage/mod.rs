//! Persistence layer.
//!
//! Each successful forecast run overwrites a CSV snapshot of its points
//! for auditing. The snapshot is never read back by the engines.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::types::ForecastPoint;

/// Write forecast points to a CSV file, replacing any previous snapshot.
pub fn save_forecast(points: &[ForecastPoint], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open {} for writing", path.display()))?;
    for point in points {
        writer
            .serialize(point)
            .context("Failed to serialise forecast point")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;

    debug!(path = %path.display(), points = points.len(), "Forecast snapshot saved");
    Ok(())
}

/// Load a forecast snapshot.
/// Returns an empty list if the file doesn't exist.
pub fn load_forecast(path: &Path) -> Result<Vec<ForecastPoint>> {
    if !path.exists() {
        info!(path = %path.display(), "No forecast snapshot found");
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let points = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ForecastPoint>, _>>()
        .with_context(|| format!("Failed to parse forecast snapshot {}", path.display()))?;

    Ok(points)
}

/// Delete the snapshot file (for testing or reset).
pub fn delete_forecast(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("farmwise_test_forecast_{}.csv", uuid::Uuid::new_v4()));
        p
    }

    fn point(day_index: u32, date: Option<NaiveDate>, price: f64) -> ForecastPoint {
        ForecastPoint {
            day_index,
            date,
            predicted_price: price,
            lower_bound: price - 50.0,
            upper_bound: price + 50.0,
        }
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path();
        let points = vec![
            point(1, NaiveDate::from_ymd_opt(2024, 6, 1), 2150.5),
            point(2, NaiveDate::from_ymd_opt(2024, 6, 2), 2162.25),
        ];
        save_forecast(&points, &path).unwrap();

        let loaded = load_forecast(&path).unwrap();
        assert_eq!(loaded, points);

        delete_forecast(&path).unwrap();
    }

    #[test]
    fn test_undated_points_survive() {
        let path = temp_path();
        let points = vec![point(1, None, 1900.0), point(2, None, 1910.0)];
        save_forecast(&points, &path).unwrap();

        let loaded = load_forecast(&path).unwrap();
        assert_eq!(loaded[1].date, None);
        assert_eq!(loaded[1].label(), "Day 2");

        delete_forecast(&path).unwrap();
    }

    #[test]
    fn test_save_overwrites_previous() {
        let path = temp_path();
        save_forecast(&[point(1, None, 1.0), point(2, None, 2.0)], &path).unwrap();
        save_forecast(&[point(1, None, 3.0)], &path).unwrap();

        let loaded = load_forecast(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].predicted_price, 3.0);

        delete_forecast(&path).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let path = Path::new("/tmp/farmwise_nonexistent_forecast_12345.csv");
        assert!(load_forecast(path).unwrap().is_empty());
    }

    #[test]
    fn test_delete_nonexistent_ok() {
        let result = delete_forecast(Path::new("/tmp/farmwise_does_not_exist_xyz.csv"));
        assert!(result.is_ok());
    }
}
