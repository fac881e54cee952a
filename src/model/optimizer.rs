//! Derivative-free minimization (Nelder–Mead simplex).
//!
//! Used to fit model coefficients where the objective is cheap to evaluate
//! but has no convenient gradient.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Optimizer settings.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iterations: usize,
    /// Stop when the spread of simplex values falls below this.
    pub tolerance: f64,
    /// Offset of the initial simplex vertices from the start point.
    pub initial_step: f64,
    /// Checked once per iteration; when set the search stops early.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-10,
            initial_step: 0.1,
            cancel: None,
        }
    }
}

/// Result of a minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
    pub cancelled: bool,
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimize `f` starting from `start`.
///
/// Non-finite objective values are treated as +inf, so the search backs
/// away from regions where the objective blows up.
pub fn minimize<F>(f: F, start: &[f64], config: &NelderMeadConfig) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let n = start.len();
    if n == 0 {
        return Minimum {
            point: Vec::new(),
            value: eval(start),
            iterations: 0,
            converged: true,
            cancelled: false,
        };
    }

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.to_vec());
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] += config.initial_step;
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;
    let mut cancelled = false;

    while iterations < config.max_iterations {
        if let Some(flag) = &config.cancel {
            if flag.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
        }

        order(&mut simplex, &mut values);
        let best = values[0];
        let worst = values[n];
        if worst.is_finite() && (worst - best).abs() <= config.tolerance * (1.0 + best.abs()) {
            converged = true;
            break;
        }
        iterations += 1;

        // Centroid of every vertex but the worst.
        let mut centroid = vec![0.0; n];
        for vertex in &simplex[..n] {
            for (c, x) in centroid.iter_mut().zip(vertex) {
                *c += x / n as f64;
            }
        }

        let along = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n])
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = along(-REFLECTION);
        let reflected_value = eval(&reflected);

        if reflected_value < values[0] {
            let expanded = along(-EXPANSION);
            let expanded_value = eval(&expanded);
            if expanded_value < reflected_value {
                simplex[n] = expanded;
                values[n] = expanded_value;
            } else {
                simplex[n] = reflected;
                values[n] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[n - 1] {
            simplex[n] = reflected;
            values[n] = reflected_value;
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < values[n] {
            let outside = along(-CONTRACTION);
            let v = eval(&outside);
            (outside, v)
        } else {
            let inside = along(CONTRACTION);
            let v = eval(&inside);
            (inside, v)
        };

        if contracted_value < values[n].min(reflected_value) {
            simplex[n] = contracted;
            values[n] = contracted_value;
            continue;
        }

        // Shrink toward the best vertex.
        let best_vertex = simplex[0].clone();
        for i in 1..=n {
            for (x, b) in simplex[i].iter_mut().zip(&best_vertex) {
                *x = b + SHRINK * (*x - b);
            }
            values[i] = eval(&simplex[i]);
        }
    }

    order(&mut simplex, &mut values);
    Minimum {
        point: simplex.swap_remove(0),
        value: values[0],
        iterations,
        converged,
        cancelled,
    }
}

/// Sort vertices by objective value, best first.
fn order(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = idx.iter().map(|&i| simplex[i].clone()).collect();
    *values = idx.iter().map(|&i| values[i]).collect();
}
