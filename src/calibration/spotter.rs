//! Spotter calibration (4.C.4), derived from "Spotter: A Model-Based Active
//! Geolocation Service" (INFOCOM 2011): fit mean and standard deviation of
//! distance as cubic functions of RTT, then model a single RTT's distance as
//! Gaussian.

use crate::ellipsoid::DIST_LIMIT;
use crate::error::{Error, Result};

use super::cubic_fit::{fit_cubic_constrained_scaled, ScaledCubic};
use super::curve::{discard_infeasible, percentile};
use super::CalibrationAlgo;

const NKNOTS: usize = 800;

/// `np.percentile(rtts, .25)` in the source material asks for the *0.25th*
/// percentile, not the 25th — numpy's percentile argument is always a
/// fraction of 100, so `.25` means "0.25%". This is very likely a decimal
/// slip in the original (see the crate-level discussion of Spotter's open
/// question). We use the true 25th percentile and note the deviation here
/// rather than reproduce the probable bug.
const REPRESENTATIVE_RTT_PERCENTILE: f64 = 25.0;

const SIGMA_MULTIPLE: f64 = 5.0;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Spotter {
    mu: ScaledCubic,
    sigma: ScaledCubic,
    converged: bool,
}

impl Spotter {
    /// `observations` is `(distance_m, rtt_ms)` pairs.
    pub fn fit(observations: &[(f64, f64)]) -> Result<Self> {
        let feasible = discard_infeasible(observations);
        if feasible.is_empty() {
            return Err(Error::BadObservation(
                "no feasible observations".to_string(),
            ));
        }

        let rtts: Vec<f64> = feasible.iter().map(|&(_, r)| r).collect();
        let dists: Vec<f64> = feasible.iter().map(|&(d, _)| d).collect();

        let (knots, mut mean, mut stdev) = windowed_moments(&rtts, &dists, NKNOTS);
        fill_gaps(&knots, &mut mean);
        fill_gaps(&knots, &mut stdev);

        let (mu, mu_ok) = fit_cubic_constrained_scaled(&knots, &mean);
        let (sigma, sigma_ok) = fit_cubic_constrained_scaled(&knots, &stdev);

        Ok(Spotter {
            mu,
            sigma,
            converged: mu_ok && sigma_ok,
        })
    }
}

/// For `nknots` evenly spaced knots over `[xs.min(), xs.max()]`, compute the
/// mean and (population) standard deviation of the `ys` whose `xs` fall in a
/// 4-edge-wide window centered on that knot. Windows with no data get NaN,
/// filled in later by [`fill_gaps`].
fn windowed_moments(xs: &[f64], ys: &[f64], nknots: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut order: Vec<usize> = (0..xs.len()).collect();
    order.sort_by(|&i, &j| xs[i].partial_cmp(&xs[j]).unwrap());
    let xs_sorted: Vec<f64> = order.iter().map(|&i| xs[i]).collect();
    let ys_sorted: Vec<f64> = order.iter().map(|&i| ys[i]).collect();

    let lo = xs_sorted[0];
    let hi = *xs_sorted.last().unwrap();
    let n_edges = nknots + 4;
    let edges: Vec<f64> = (0..n_edges)
        .map(|i| lo + (hi - lo) * (i as f64) / (n_edges as f64 - 1.0))
        .collect();

    let knots: Vec<f64> = edges[2..n_edges - 2].to_vec();
    let mut mu = vec![f64::NAN; nknots];
    let mut sigma = vec![f64::NAN; nknots];

    for i in 0..nknots {
        let window_lo = edges[i];
        let window_hi = edges[i + 4];
        let lo_idx = xs_sorted.partition_point(|&x| x < window_lo);
        let hi_idx = xs_sorted.partition_point(|&x| x <= window_hi);
        if hi_idx > lo_idx {
            let block = &ys_sorted[lo_idx..hi_idx];
            let mean = block.iter().sum::<f64>() / block.len() as f64;
            let var = block.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / block.len() as f64;
            mu[i] = mean;
            sigma[i] = var.sqrt();
        }
    }

    (knots, mu, sigma)
}

/// Linearly interpolate across `NaN` runs in `values` (indexed by the
/// parallel, strictly increasing `knots`). Leading/trailing NaNs are filled
/// with the nearest known value.
fn fill_gaps(knots: &[f64], values: &mut [f64]) {
    let n = values.len();
    let known: Vec<usize> = (0..n).filter(|&i| !values[i].is_nan()).collect();
    if known.is_empty() {
        // Nothing to anchor to; leave as a flat zero curve rather than NaN.
        for v in values.iter_mut() {
            *v = 0.0;
        }
        return;
    }

    for i in 0..known[0] {
        values[i] = values[known[0]];
    }
    for i in *known.last().unwrap() + 1..n {
        values[i] = values[*known.last().unwrap()];
    }

    for w in known.windows(2) {
        let (lo, hi) = (w[0], w[1]);
        if hi - lo <= 1 {
            continue;
        }
        let (x1, y1) = (knots[lo], values[lo]);
        let (x2, y2) = (knots[hi], values[hi]);
        for i in lo + 1..hi {
            let t = (knots[i] - x1) / (x2 - x1);
            values[i] = y1 + (y2 - y1) * t;
        }
    }
}

impl CalibrationAlgo for Spotter {
    fn distance_range(&self, rtts: &[f64]) -> (f64, f64) {
        let representative = percentile(rtts, REPRESENTATIVE_RTT_PERCENTILE);
        let mean = self.mu.eval(representative);
        let spread = self.sigma.eval(representative) * SIGMA_MULTIPLE;
        (
            (mean - spread).max(0.0).min(DIST_LIMIT),
            (mean + spread).max(0.0).min(DIST_LIMIT),
        )
    }

    fn converged(&self) -> bool {
        self.converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_a_noisy_linear_relationship() {
        let obs: Vec<(f64, f64)> = (1..2000)
            .map(|i| {
                let rtt = i as f64 * 0.1;
                let dist = rtt * 150_000.0;
                (dist, rtt)
            })
            .collect();
        let cal = Spotter::fit(&obs).expect("fit should succeed");
        let (min_d, max_d) = cal.distance_range(&[50.0]);
        assert!(min_d <= max_d);
        assert!(max_d > 0.0);
    }
}
