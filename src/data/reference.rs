//! Fixed reference tables: yield per acre and inter-district distances.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Yield table
// ---------------------------------------------------------------------------

/// Quintals per acre for crops we have agronomic figures for.
const STANDARD_YIELDS: &[(&str, Decimal)] = &[
    ("paddy", dec!(20)),
    ("maize", dec!(18)),
    ("wheat", dec!(12)),
    ("cotton", dec!(15)),
    ("groundnut", dec!(8)),
    ("chilli", dec!(10)),
];

/// Yield used for crops absent from the table.
pub const DEFAULT_YIELD_PER_ACRE: Decimal = dec!(10);

/// Crop name -> quintals per acre, with a default for unknown crops.
#[derive(Debug, Clone)]
pub struct YieldTable {
    yields: HashMap<String, Decimal>,
    default: Decimal,
}

impl YieldTable {
    pub fn new(entries: &[(&str, Decimal)], default: Decimal) -> Self {
        Self {
            yields: entries
                .iter()
                .map(|(crop, y)| (crop.trim().to_lowercase(), *y))
                .collect(),
            default,
        }
    }

    /// The built-in table.
    pub fn standard() -> Self {
        Self::new(STANDARD_YIELDS, DEFAULT_YIELD_PER_ACRE)
    }

    /// Quintals per acre for a crop (case-insensitive).
    pub fn yield_per_acre(&self, crop: &str) -> Decimal {
        self.yields
            .get(&crop.trim().to_lowercase())
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for YieldTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Distance table
// ---------------------------------------------------------------------------

/// Known road distances in km. Order within a pair does not matter.
const STANDARD_DISTANCES: &[(&str, &str, u32)] = &[
    ("Warangal", "Karimnagar", 70),
    ("Warangal", "Nalgonda", 110),
    ("Warangal", "Adilabad", 200),
    ("Adilabad", "Karimnagar", 170),
];

/// Distance used for pairs absent from the table.
pub const DEFAULT_DISTANCE_KM: u32 = 150;

/// Symmetric district-pair distance lookup.
#[derive(Debug, Clone)]
pub struct DistanceTable {
    distances: HashMap<(String, String), u32>,
    default_km: u32,
}

impl DistanceTable {
    pub fn new(entries: &[(&str, &str, u32)], default_km: u32) -> Self {
        Self {
            distances: entries
                .iter()
                .map(|(a, b, km)| (Self::key(a, b), *km))
                .collect(),
            default_km,
        }
    }

    pub fn standard() -> Self {
        Self::new(STANDARD_DISTANCES, DEFAULT_DISTANCE_KM)
    }

    /// Same table with a different fallback distance.
    pub fn with_default(mut self, default_km: u32) -> Self {
        self.default_km = default_km;
        self
    }

    fn key(a: &str, b: &str) -> (String, String) {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Distance in km between two districts. Zero for the same district.
    pub fn distance_km(&self, from: &str, to: &str) -> u32 {
        self.known_distance(from, to).unwrap_or(self.default_km)
    }

    /// Tabulated distance only, without the fallback.
    pub fn known_distance(&self, from: &str, to: &str) -> Option<u32> {
        let key = Self::key(from, to);
        if key.0 == key.1 {
            return Some(0);
        }
        self.distances.get(&key).copied()
    }
}

impl Default for DistanceTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// Process-lifetime reference data handed to the engines.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub yields: YieldTable,
    pub distances: DistanceTable,
}
