//! Physical-limits-only calibration (4.C.1): no training data, two hardwired
//! modes.

use crate::ellipsoid::DIST_LIMIT;

use super::curve::Line;
use super::CalibrationAlgo;

/// Which pair of propagation-speed limits to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    /// 200 000 km/s fastest, 0 slowest: the true physical ceiling.
    Physical,
    /// 153 000 km/s fastest, 110 000 km/s (plus 55ms fixed delay) slowest:
    /// tighter bounds that exclude satellite-link outliers in practice.
    Empirical,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct PhysicalLimitsOnly {
    max_line: Line,
    min_line: Line,
}

impl PhysicalLimitsOnly {
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        // Slopes are meters per millisecond; each is half the quoted
        // propagation speed because RTT, not one-way time, is the input.
        let (max_line, min_line) = match mode {
            Mode::Physical => (Line::new(100_000.0, 0.0), Line::new(0.0, 0.0)),
            Mode::Empirical => (
                Line::new(76_500.0, 0.0),
                Line::new(55_000.0, -55.0 * 55_000.0),
            ),
        };
        PhysicalLimitsOnly { max_line, min_line }
    }
}

impl CalibrationAlgo for PhysicalLimitsOnly {
    fn distance_range(&self, rtts: &[f64]) -> (f64, f64) {
        let min_rtt = rtts.iter().copied().fold(f64::INFINITY, f64::min);
        let min_d = self.min_line.eval(min_rtt).max(0.0);
        let max_d = self.max_line.eval(min_rtt).max(0.0);
        (min_d.min(DIST_LIMIT), max_d.min(DIST_LIMIT))
    }

    fn converged(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empirical_s1() {
        let c = PhysicalLimitsOnly::new(Mode::Empirical);
        let (min_d, max_d) = c.distance_range(&[10.0]);
        assert_eq!(min_d, 0.0);
        assert!((max_d - 765_000.0).abs() < 1e-6);
    }

    #[test]
    fn physical_s2() {
        let c = PhysicalLimitsOnly::new(Mode::Physical);
        let (min_d, max_d) = c.distance_range(&[10.0]);
        assert_eq!(min_d, 0.0);
        assert!((max_d - 1_000_000.0).abs() < 1e-6);
    }
}
