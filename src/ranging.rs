//! Ranging functions (component D): turn one RTT observation plus a
//! calibration curve into an unnormalized probability-mass function over
//! distance.

use crate::calibration::{Calibration, CalibrationAlgo, PhysicalLimitsOnly, PhysicalMode};
use crate::ellipsoid::DIST_LIMIT;

/// The capability every ranging function provides.
pub trait RangingFn {
    /// The largest distance at which this ranging function can be nonzero.
    fn distance_bound(&self) -> f64;

    /// Vectorized evaluation: probability mass (unnormalized) at each given
    /// distance. Always `0.0` beyond [`distance_bound`](Self::distance_bound).
    fn unnormalized_pvals(&self, distances: &[f64]) -> Vec<f64>;
}

/// MinMax with soft skirt: combine the calibration-provided, empirical
/// physical, and absolute physical distance ranges for a set of RTTs into a
/// single piecewise-linear plausibility curve. The six range endpoints,
/// sorted, become knots with values `[0, 0.75, 1, 1, 0.75, 0]` — a plateau at
/// the calibration-accepted band, with linear fall-offs out to the hard
/// physical limit.
#[derive(Clone, Copy, Debug)]
pub struct MinMaxSoftSkirt {
    knots: [f64; 6],
}

const KNOT_VALUES: [f64; 6] = [0.0, 0.75, 1.0, 1.0, 0.75, 0.0];

impl MinMaxSoftSkirt {
    #[must_use]
    pub fn new(calibration: &Calibration, rtts: &[f64]) -> Self {
        let (cal_min, cal_max) = calibration.distance_range(rtts);
        let (emp_min, emp_max) =
            PhysicalLimitsOnly::new(PhysicalMode::Empirical).distance_range(rtts);
        let (phys_min, phys_max) =
            PhysicalLimitsOnly::new(PhysicalMode::Physical).distance_range(rtts);

        let mut knots = [cal_min, cal_max, emp_min, emp_max, phys_min, phys_max];
        for k in &mut knots {
            *k = k.clamp(0.0, DIST_LIMIT);
        }
        knots.sort_by(|a, b| a.partial_cmp(b).unwrap());

        MinMaxSoftSkirt { knots }
    }

    fn eval_one(&self, d: f64) -> f64 {
        if d < self.knots[0] || d > self.knots[5] {
            return 0.0;
        }
        let i = self.knots.partition_point(|&k| k <= d);
        if i == 0 {
            return KNOT_VALUES[0];
        }
        if i >= self.knots.len() {
            return KNOT_VALUES[5];
        }
        let (x1, y1) = (self.knots[i - 1], KNOT_VALUES[i - 1]);
        let (x2, y2) = (self.knots[i], KNOT_VALUES[i]);
        if (x2 - x1).abs() < 1e-12 {
            return y2;
        }
        y1 + (y2 - y1) * (d - x1) / (x2 - x1)
    }
}

impl RangingFn for MinMaxSoftSkirt {
    fn distance_bound(&self) -> f64 {
        self.knots[5]
    }

    fn unnormalized_pvals(&self, distances: &[f64]) -> Vec<f64> {
        distances.iter().map(|&d| self.eval_one(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::PhysicalLimitsOnly as PLO;

    #[test]
    fn zero_beyond_distance_bound() {
        let cal: Calibration = PLO::new(PhysicalMode::Empirical).into();
        let rf = MinMaxSoftSkirt::new(&cal, &[20.0]);
        let bound = rf.distance_bound();
        let vals = rf.unnormalized_pvals(&[bound + 1.0, bound * 2.0]);
        assert!(vals.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn s4_empirical_minmax_bound() {
        // distance_bound is the combined range's outer knot, the absolute
        // physical max (100_000 * 20 = 2_000_000m), not the tighter
        // empirical max (76_500 * 20 = 1_530_000m) the calibration itself
        // contributes as an inner knot.
        let cal: Calibration = PLO::new(PhysicalMode::Empirical).into();
        let rf = MinMaxSoftSkirt::new(&cal, &[20.0]);
        assert!((rf.distance_bound() - 2_000_000.0).abs() < 1.0);
    }
}
