//! Farmer credit scoring.
//!
//! Composite 0–1000 score from three components:
//!   - profitability (40%): net margin, 50% margin scores full marks
//!   - efficiency (30%): income/expense ratio, 2.0 scores full marks
//!   - risk (30%): price stability of the crop across the history

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::Statistics;
use std::sync::Arc;
use tracing::{debug, info};

use crate::data::MarketDataStore;
use crate::types::{AgriError, CreditScoreResult, CreditTier, ScoreBreakdown};

const MAX_SCORE: f64 = 1000.0;
const NEUTRAL_RISK_SCORE: f64 = 500.0;

const PROFITABILITY_WEIGHT: f64 = 0.4;
const EFFICIENCY_WEIGHT: f64 = 0.3;
const RISK_WEIGHT: f64 = 0.3;

/// Margin that earns a full profitability score.
const FULL_MARGIN: f64 = 0.5;
/// Income/expense ratio that earns a full efficiency score.
const FULL_EFFICIENCY: f64 = 2.0;

pub struct CreditScorer {
    store: Arc<MarketDataStore>,
}

impl CreditScorer {
    pub fn new(store: Arc<MarketDataStore>) -> Self {
        Self { store }
    }

    /// Score a planting from its projected income and expense.
    pub fn score(
        &self,
        income: Decimal,
        expense: Decimal,
        crop: &str,
    ) -> Result<CreditScoreResult, AgriError> {
        if expense.is_zero() {
            return Err(AgriError::ZeroExpense);
        }
        let income_f = income.to_f64().unwrap_or(0.0);
        let expense_f = expense.to_f64().unwrap_or(f64::NAN);

        let margin = (income_f - expense_f) / expense_f;
        let profitability = clamp_score(margin / FULL_MARGIN * MAX_SCORE);

        let efficiency_ratio = income_f / expense_f;
        let efficiency = clamp_score(efficiency_ratio / FULL_EFFICIENCY * MAX_SCORE);

        let risk = self.risk_score(crop);

        let composite = PROFITABILITY_WEIGHT * profitability
            + EFFICIENCY_WEIGHT * efficiency
            + RISK_WEIGHT * risk;
        let score = composite as u32;
        let tier = CreditTier::for_score(score);

        let result = CreditScoreResult {
            score,
            category: tier.label().to_string(),
            color: tier.color().to_string(),
            tier,
            breakdown: ScoreBreakdown {
                profitability_score: profitability as u32,
                efficiency_score: efficiency as u32,
                risk_score: risk as u32,
            },
        };

        info!(
            crop,
            score,
            tier = ?tier,
            profitability = result.breakdown.profitability_score,
            efficiency = result.breakdown.efficiency_score,
            risk = result.breakdown.risk_score,
            "Credit score computed"
        );
        Ok(result)
    }

    /// `1000 × (1 − cv)` over every history price for the crop, using the
    /// sample standard deviation. Neutral when there is too little data.
    fn risk_score(&self, crop: &str) -> f64 {
        let prices: Vec<f64> = self
            .store
            .crop_prices(crop)
            .iter()
            .filter_map(|r| r.price.to_f64())
            .collect();

        if prices.len() < 2 {
            debug!(crop, observations = prices.len(), "Too few prices for risk, using neutral");
            return NEUTRAL_RISK_SCORE;
        }

        let mean = prices.iter().mean();
        if mean == 0.0 || !mean.is_finite() {
            return NEUTRAL_RISK_SCORE;
        }
        let cv = prices.iter().std_dev() / mean;
        debug!(crop, mean, cv, "Price volatility");

        clamp_score(MAX_SCORE * (1.0 - cv))
    }
}

fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return 0.0;
    }
    raw.clamp(0.0, MAX_SCORE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reference::ReferenceTables;
    use crate::data::tests::{empty_feed, record};
    use crate::types::PriceRecord;
    use rust_decimal_macros::dec;

    fn scorer(rows: Vec<PriceRecord>) -> CreditScorer {
        let store = MarketDataStore::from_parts(rows, Vec::new(), empty_feed(), ReferenceTables::default());
        CreditScorer::new(Arc::new(store))
    }

    fn stable_paddy() -> Vec<PriceRecord> {
        vec![
            record("Warangal", "paddy", dec!(2000), 1),
            record("Warangal", "paddy", dec!(2000), 2),
            record("Karimnagar", "paddy", dec!(2000), 3),
        ]
    }

    #[test]
    fn test_half_margin_is_full_profitability() {
        let s = scorer(Vec::new());
        let r = s.score(dec!(150000), dec!(100000), "paddy").unwrap();
        assert_eq!(r.breakdown.profitability_score, 1000);
        assert_eq!(r.breakdown.efficiency_score, 750);
        assert_eq!(r.breakdown.risk_score, 500);
    }

    #[test]
    fn test_quarter_margin_is_half_profitability() {
        let s = scorer(Vec::new());
        let r = s.score(dec!(125), dec!(100), "paddy").unwrap();
        assert_eq!(r.breakdown.profitability_score, 500);
    }

    #[test]
    fn test_losses_clamp_to_zero() {
        let s = scorer(Vec::new());
        let r = s.score(dec!(0), dec!(50000), "paddy").unwrap();
        assert_eq!(r.breakdown.profitability_score, 0);
        assert_eq!(r.breakdown.efficiency_score, 0);
        // 0.3 * 500 neutral risk
        assert_eq!(r.score, 150);
        assert_eq!(r.tier, CreditTier::HighRisk);
        assert_eq!(r.category, "High Risk Farmer");
        assert_eq!(r.color, "red");
    }

    #[test]
    fn test_composite_and_tier() {
        let s = scorer(Vec::new());
        // margin 1.0 and ratio 2.0 both max out; risk neutral.
        let r = s.score(dec!(200000), dec!(100000), "paddy").unwrap();
        assert_eq!(r.score, 850);
        assert_eq!(r.tier, CreditTier::Gold);
        assert_eq!(r.category, "Gold Tier (Low Interest Loan Eligible)");
        assert_eq!(r.color, "green");
    }

    #[test]
    fn test_stable_prices_score_full_risk() {
        let s = scorer(stable_paddy());
        let r = s.score(dec!(200000), dec!(100000), "Paddy").unwrap();
        assert_eq!(r.breakdown.risk_score, 1000);
        assert_eq!(r.score, 1000);
    }

    #[test]
    fn test_volatile_prices_lower_risk_score() {
        // mean 2000, sample std 1000 -> cv 0.5
        let s = scorer(vec![
            record("Warangal", "chilli", dec!(1000), 1),
            record("Warangal", "chilli", dec!(2000), 2),
            record("Warangal", "chilli", dec!(3000), 3),
        ]);
        let r = s.score(dec!(100), dec!(100), "chilli").unwrap();
        assert_eq!(r.breakdown.risk_score, 500);
    }

    #[test]
    fn test_single_price_is_neutral_risk() {
        let s = scorer(vec![record("Warangal", "maize", dec!(1900), 1)]);
        let r = s.score(dec!(100), dec!(100), "maize").unwrap();
        assert_eq!(r.breakdown.risk_score, 500);
    }

    #[test]
    fn test_zero_mean_is_neutral_risk() {
        let s = scorer(vec![
            record("Warangal", "maize", dec!(0), 1),
            record("Warangal", "maize", dec!(0), 2),
        ]);
        let r = s.score(dec!(100), dec!(100), "maize").unwrap();
        assert_eq!(r.breakdown.risk_score, 500);
    }

    #[test]
    fn test_zero_expense_rejected() {
        let s = scorer(Vec::new());
        let err = s.score(dec!(1000), dec!(0), "paddy").unwrap_err();
        assert!(matches!(err, AgriError::ZeroExpense));
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_silver_tier_boundary() {
        assert_eq!(CreditTier::for_score(500), CreditTier::Silver);
        assert_eq!(CreditTier::for_score(749), CreditTier::Silver);
        assert_eq!(CreditTier::for_score(750), CreditTier::Gold);
        assert_eq!(CreditTier::for_score(499), CreditTier::HighRisk);
    }
}
