//! CBG ("bestline") calibration (4.C.2), from "Constraint-based Geolocation
//! of Internet Hosts" (IMC 2004): fit the line closest to, but below, every
//! calibration point, then invert it.

use good_lp::{constraint, variable, variables, Solution, SolverModel};

use crate::ellipsoid::DIST_LIMIT;
use crate::error::{Error, Result};

use super::curve::discard_infeasible;
use super::physical::{Mode, PhysicalLimitsOnly};
use super::CalibrationAlgo;

/// Empirical "slowest plausible" time, in ms, to cross half of Earth's
/// circumference — used as an artificial data point so the bestline can
/// never be tilted by a satellite-link outlier.
const ARTIFICIAL_RTT_MS: f64 = 237.16;

const N_EDGES: usize = 804;

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
enum Fit {
    Converged { m: f64, b: f64 },
    Fallback,
}

/// Constraint-based bestline calibration. Falls back to
/// [`PhysicalLimitsOnly::Empirical`](PhysicalLimitsOnly) if the underlying
/// linear program fails to find a feasible bestline; [`Cbg::converged`]
/// reports which happened.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Cbg {
    fit: Fit,
}

impl Cbg {
    /// `observations` is `(distance_m, rtt_ms)` pairs.
    pub fn fit(observations: &[(f64, f64)]) -> Result<Self> {
        if observations.is_empty() {
            return Err(Error::BadObservation("no observations supplied".into()));
        }

        let feasible: Vec<(f64, f64)> = discard_infeasible(observations)
            .into_iter()
            .filter(|&(d, _)| d >= 1_000.0)
            .collect();
        if feasible.is_empty() {
            return Err(Error::BadObservation(
                "no feasible observations at distance >= 1000m".into(),
            ));
        }

        let (dists, minrtts) = bin_observations(&feasible);

        let fit = match solve_bestline(&dists, &minrtts) {
            Some((m, b)) => Fit::Converged { m, b },
            None => Fit::Fallback,
        };

        Ok(Cbg { fit })
    }
}

/// Bin feasible observations into ~804 edges spanning their distance range,
/// taking the minimum RTT per bin; empty bins borrow the next higher bin's
/// value, or the artificial sentinel if there is no higher bin.
fn bin_observations(feasible: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    let lo = feasible.first().unwrap().0;
    let hi = feasible.last().unwrap().0;

    let edges: Vec<f64> = (0..N_EDGES)
        .map(|i| lo + (hi - lo) * (i as f64) / (N_EDGES as f64 - 1.0))
        .collect();
    let nbins = N_EDGES - 1;

    let mut dists = vec![0.0; nbins];
    let mut minrtts = vec![0.0; nbins];
    for i in (0..nbins).rev() {
        dists[i] = (edges[i] + edges[i + 1]) / 2.0;
        let last = i == nbins - 1;
        let min_in_bin = feasible
            .iter()
            .filter(|&&(d, _)| d >= edges[i] && (d < edges[i + 1] || last))
            .map(|&(_, r)| r)
            .fold(f64::INFINITY, f64::min);

        minrtts[i] = if min_in_bin.is_finite() {
            min_in_bin
        } else if i + 1 < nbins {
            minrtts[i + 1]
        } else {
            ARTIFICIAL_RTT_MS
        };
    }
    (dists, minrtts)
}

/// Solve for `(m, b)` minimizing `sum(minrtts) - m*sum(dists) - b*n` subject
/// to `m*dist_i + b <= rtt_i` for every bin (plus the artificial
/// half-circumference point), `m >= 1/100000`, `0 <= b <= min(rtt)`.
fn solve_bestline(dists: &[f64], minrtts: &[f64]) -> Option<(f64, f64)> {
    let n = dists.len() as f64;
    let sum_dists: f64 = dists.iter().sum();
    let min_rtt = minrtts
        .iter()
        .copied()
        .chain(std::iter::once(ARTIFICIAL_RTT_MS))
        .fold(f64::INFINITY, f64::min);

    let mut vars = variables!();
    let m = vars.add(variable().min(1.0 / 100_000.0));
    let b = vars.add(variable().min(0.0).max(min_rtt));

    let mut model = vars
        .maximise(sum_dists * m + n * b)
        .using(good_lp::microlp);

    for (&d, &r) in dists.iter().zip(minrtts.iter()) {
        model = model.with(constraint!(m * d + b <= r));
    }
    model = model.with(constraint!(m * DIST_LIMIT + b <= ARTIFICIAL_RTT_MS));

    let solution = model.solve().ok()?;
    Some((solution.value(m), solution.value(b)))
}

impl CalibrationAlgo for Cbg {
    fn distance_range(&self, rtts: &[f64]) -> (f64, f64) {
        match self.fit {
            Fit::Converged { m, b } => {
                let min_rtt = rtts.iter().copied().fold(f64::INFINITY, f64::min);
                let max_d = ((min_rtt - b) / m).clamp(0.0, DIST_LIMIT);
                (0.0, max_d)
            }
            Fit::Fallback => PhysicalLimitsOnly::new(Mode::Empirical).distance_range(rtts),
        }
    }

    fn converged(&self) -> bool {
        matches!(self.fit, Fit::Converged { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_bestline_recovers_plausible_speed() {
        let obs = [
            (1_000_000.0, 15.0),
            (5_000_000.0, 40.0),
            (10_000_000.0, 72.0),
        ];
        let cal = Cbg::fit(&obs).expect("fit should succeed");
        assert!(cal.converged());
        let (_, max_d) = cal.distance_range(&[10.0]);
        assert!((max_d - 1_000_000.0).abs() / 1_000_000.0 < 0.05);
    }

    #[test]
    fn empty_observations_rejected() {
        assert!(Cbg::fit(&[]).is_err());
    }
}
