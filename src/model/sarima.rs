//! Seasonal ARIMA: SARIMA(p,d,q)(P,D,Q,s).
//!
//! Coefficients are fitted by conditional sum of squares: residuals are
//! computed recursively with pre-sample errors set to zero and the squared
//! sum is minimized with Nelder–Mead. No stationarity or invertibility
//! constraint is imposed on the coefficients.
//!
//! Notation, with B the backshift operator:
//!
//! ```text
//! φ(B) Φ(B^s) (1-B)^d (1-B^s)^D y_t = θ(B) Θ(B^s) e_t
//! ```
//!
//! The left-hand side is expanded into a single polynomial `c(B)`, so both
//! residuals and forecasts are computed directly on the undifferenced series.

use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

use super::optimizer::{minimize, NelderMeadConfig};
use super::ModelError;

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Model orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    /// Season length in periods.
    pub period: usize,
}

impl SarimaOrder {
    /// (1,1,1)x(1,1,1,7): daily data with weekly seasonality.
    pub const WEEKLY: SarimaOrder = SarimaOrder {
        p: 1,
        d: 1,
        q: 1,
        seasonal_p: 1,
        seasonal_d: 1,
        seasonal_q: 1,
        period: 7,
    };

    pub fn param_count(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Lags consumed before the first residual can be computed.
    pub fn max_lag(&self) -> usize {
        self.p + self.d + self.period * (self.seasonal_p + self.seasonal_d)
    }

    /// Shortest series that leaves more residuals than coefficients.
    pub fn min_observations(&self) -> usize {
        self.max_lag() + self.param_count() + 1
    }
}

impl fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

// ---------------------------------------------------------------------------
// Polynomials
// ---------------------------------------------------------------------------

/// Coefficients of a polynomial in B, constant term first.
type Poly = Vec<f64>;

fn poly_mul(a: &[f64], b: &[f64]) -> Poly {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign * (c1 B^stride + c2 B^(2 stride) + ...)`
fn lag_poly(coefs: &[f64], stride: usize, sign: f64) -> Poly {
    let mut out = vec![0.0; coefs.len() * stride + 1];
    out[0] = 1.0;
    for (k, c) in coefs.iter().enumerate() {
        out[(k + 1) * stride] = sign * c;
    }
    out
}

/// `(1 - B^stride)^power`
fn difference_poly(stride: usize, power: usize) -> Poly {
    let step = lag_poly(&[1.0], stride, -1.0);
    (0..power).fold(vec![1.0], |acc, _| poly_mul(&acc, &step))
}

/// Coefficient vector laid out as [φ.., θ.., Φ.., Θ..].
#[derive(Debug, Clone, PartialEq)]
pub struct SarimaParams {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
}

impl SarimaParams {
    fn from_slice(order: &SarimaOrder, x: &[f64]) -> Self {
        let (ar, rest) = x.split_at(order.p);
        let (ma, rest) = rest.split_at(order.q);
        let (seasonal_ar, seasonal_ma) = rest.split_at(order.seasonal_p);
        Self {
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            seasonal_ar: seasonal_ar.to_vec(),
            seasonal_ma: seasonal_ma.to_vec(),
        }
    }

    /// Full left-hand polynomial c(B), including differencing.
    fn ar_poly(&self, order: &SarimaOrder) -> Poly {
        let ar = lag_poly(&self.ar, 1, -1.0);
        let seasonal_ar = lag_poly(&self.seasonal_ar, order.period, -1.0);
        let diff = difference_poly(1, order.d);
        let seasonal_diff = difference_poly(order.period, order.seasonal_d);
        poly_mul(&poly_mul(&ar, &seasonal_ar), &poly_mul(&diff, &seasonal_diff))
    }

    /// Right-hand polynomial m(B).
    fn ma_poly(&self, order: &SarimaOrder) -> Poly {
        poly_mul(
            &lag_poly(&self.ma, 1, 1.0),
            &lag_poly(&self.seasonal_ma, order.period, 1.0),
        )
    }
}

/// Residuals of `series` under polynomials `c` and `m`. Entries before the
/// first computable index are zero.
fn residuals(series: &[f64], c: &[f64], m: &[f64]) -> Vec<f64> {
    let start = c.len() - 1;
    let mut e = vec![0.0; series.len()];
    for t in start..series.len() {
        let ar: f64 = c.iter().enumerate().map(|(i, ci)| ci * series[t - i]).sum();
        let ma: f64 = m
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(j, _)| *j <= t)
            .map(|(j, mj)| mj * e[t - j])
            .sum();
        e[t] = ar - ma;
    }
    e
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Unfitted model specification.
#[derive(Debug, Clone)]
pub struct Sarima {
    order: SarimaOrder,
    optimizer: NelderMeadConfig,
}

impl Sarima {
    pub fn new(order: SarimaOrder) -> Self {
        Self {
            order,
            optimizer: NelderMeadConfig::default(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.optimizer.max_iterations = max_iterations;
        self
    }

    /// Stop fitting when `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.optimizer.cancel = Some(flag);
        self
    }

    pub fn order(&self) -> SarimaOrder {
        self.order
    }

    /// Fit coefficients to an evenly spaced series.
    pub fn fit(&self, series: &[f64]) -> Result<FittedSarima, ModelError> {
        let order = self.order;
        let required = order.min_observations();
        if series.len() < required {
            return Err(ModelError::InsufficientData {
                observations: series.len(),
                required,
            });
        }
        if series.iter().any(|y| !y.is_finite()) {
            return Err(ModelError::NonFinite("series contains NaN or infinite values".into()));
        }

        // Coefficients are scale-free; fit on a unit-scaled copy so the
        // simplex step means the same thing at any price level.
        let scale = series.iter().map(|y| y.abs()).fold(0.0, f64::max).max(1.0);
        let scaled: Vec<f64> = series.iter().map(|y| y / scale).collect();
        let start = order.max_lag();
        let n_resid = (series.len() - start) as f64;

        let objective = |x: &[f64]| {
            let params = SarimaParams::from_slice(&order, x);
            let e = residuals(&scaled, &params.ar_poly(&order), &params.ma_poly(&order));
            e[start..].iter().map(|v| v * v).sum::<f64>()
        };

        let initial = vec![0.0; order.param_count()];
        let minimum = minimize(objective, &initial, &self.optimizer);
        if minimum.cancelled {
            return Err(ModelError::Cancelled);
        }
        if !minimum.value.is_finite() {
            return Err(ModelError::NonFinite("sum of squares diverged".into()));
        }

        let params = SarimaParams::from_slice(&order, &minimum.point);
        let ar_poly = params.ar_poly(&order);
        let ma_poly = params.ma_poly(&order);
        let resid = residuals(series, &ar_poly, &ma_poly);
        let sigma2 = resid[start..].iter().map(|v| v * v).sum::<f64>() / n_resid;
        if !sigma2.is_finite() {
            return Err(ModelError::NonFinite("residual variance".into()));
        }

        debug!(
            order = %order,
            iterations = minimum.iterations,
            converged = minimum.converged,
            sigma2,
            "SARIMA fitted"
        );

        Ok(FittedSarima {
            order,
            params,
            sigma2,
            history: series.to_vec(),
            residuals: resid,
            ar_poly,
            ma_poly,
        })
    }
}

/// One step of a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A fitted model, ready to forecast.
#[derive(Debug, Clone)]
pub struct FittedSarima {
    order: SarimaOrder,
    params: SarimaParams,
    sigma2: f64,
    history: Vec<f64>,
    residuals: Vec<f64>,
    ar_poly: Poly,
    ma_poly: Poly,
}

impl FittedSarima {
    pub fn order(&self) -> SarimaOrder {
        self.order
    }

    pub fn params(&self) -> &SarimaParams {
        &self.params
    }

    /// Innovation variance estimate.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Project `steps` periods ahead with a two-sided `confidence` interval.
    pub fn forecast(&self, steps: usize, confidence: f64) -> Result<Vec<Prediction>, ModelError> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(ModelError::InvalidConfidence(confidence));
        }
        let normal = Normal::new(0.0, 1.0).map_err(|e| ModelError::NonFinite(e.to_string()))?;
        let z = normal.inverse_cdf(0.5 + confidence / 2.0);

        let c = &self.ar_poly;
        let m = &self.ma_poly;
        let n = self.history.len();

        let mut y = self.history.clone();
        let mut e = self.residuals.clone();
        y.reserve(steps);
        e.resize(n + steps, 0.0);

        for t in n..n + steps {
            let ar: f64 = c
                .iter()
                .enumerate()
                .skip(1)
                .map(|(i, ci)| ci * y[t - i])
                .sum();
            let ma: f64 = m
                .iter()
                .enumerate()
                .skip(1)
                .map(|(j, mj)| mj * e[t - j])
                .sum();
            y.push(ma - ar);
        }

        let psi = self.psi_weights(steps);
        let mut cumulative = 0.0;
        let mut out = Vec::with_capacity(steps);
        for h in 0..steps {
            cumulative += psi[h] * psi[h];
            let half_width = z * (self.sigma2 * cumulative).sqrt();
            let mean = y[n + h];
            if !mean.is_finite() || !half_width.is_finite() {
                return Err(ModelError::NonFinite(format!("forecast step {}", h + 1)));
            }
            out.push(Prediction {
                mean,
                lower: mean - half_width,
                upper: mean + half_width,
            });
        }
        Ok(out)
    }

    /// MA(∞) weights ψ of the full (integrated) model: c(B) ψ(B) = m(B).
    fn psi_weights(&self, count: usize) -> Vec<f64> {
        let c = &self.ar_poly;
        let m = &self.ma_poly;
        let mut psi = Vec::with_capacity(count);
        for j in 0..count {
            let mj = m.get(j).copied().unwrap_or(0.0);
            let feedback: f64 = (1..=j.min(c.len() - 1)).map(|i| c[i] * psi[j - i]).sum();
            psi.push(mj - feedback);
        }
        psi
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
