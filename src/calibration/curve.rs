//! Shared curve primitives used by the calibration algorithms: a straight
//! line, a piecewise-linear polyline with extrapolation at both ends, and
//! the observation-filtering/percentile helpers every algorithm needs.

/// `y = m*x + b`.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Line {
    pub m: f64,
    pub b: f64,
}

impl Line {
    #[must_use]
    pub fn new(m: f64, b: f64) -> Self {
        Line { m, b }
    }

    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        self.m * x + self.b
    }
}

/// A polyline defined by points sorted ascending by x. Evaluating beyond
/// either end extrapolates along the nearest segment's slope, matching the
/// source algorithm's `_interp_segments`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PolyLine {
    points: Vec<(f64, f64)>,
}

impl PolyLine {
    #[must_use]
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        PolyLine { points }
    }

    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        let pts = &self.points;
        let n = pts.len();
        debug_assert!(n >= 2, "PolyLine needs at least two points");
        let i = pts.partition_point(|&(px, _)| px < x);

        let (x1, y1, x2, y2) = if i < n && (pts[i].0 - x).abs() < f64::EPSILON {
            return pts[i].1;
        } else if i == n {
            (pts[n - 2].0, pts[n - 2].1, pts[n - 1].0, pts[n - 1].1)
        } else if i == 0 {
            (pts[0].0, pts[0].1, pts[1].0, pts[1].1)
        } else {
            (pts[i - 1].0, pts[i - 1].1, pts[i].0, pts[i].1)
        };

        let dx = if (x2 - x1).abs() < 1e-12 { 1e-6 } else { x2 - x1 };
        y1 + (y2 - y1) * (x - x1) / dx
    }
}

/// Drop observations implying a propagation speed faster than 200 000 km/s,
/// or slower than 110 000 km/s after a 55ms fixed-delay allowance. Rows are
/// `(distance_m, rtt_ms)`; the result is sorted ascending by distance, then
/// by RTT.
#[must_use]
pub fn discard_infeasible(obs: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = obs
        .iter()
        .copied()
        .filter(|&(d, r)| r * 100_000.0 >= d && (r - 55.0) * 55_000.0 <= d)
        .collect();
    out.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap()
            .then(a.1.partial_cmp(&b.1).unwrap())
    });
    out
}

/// Linear-interpolation percentile, matching numpy's default `'linear'`
/// method. `p` is in `[0, 100]`.
#[must_use]
pub fn percentile(xs: &[f64], p: f64) -> f64 {
    let mut v = xs.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = v.len();
    if n == 1 {
        return v[0];
    }
    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return v[lo];
    }
    let frac = rank - lo as f64;
    v[lo] + (v[hi] - v[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_eval() {
        let l = Line::new(2.0, 1.0);
        assert_eq!(l.eval(3.0), 7.0);
    }

    #[test]
    fn polyline_interpolates_and_extrapolates() {
        let pl = PolyLine::new(vec![(0.0, 0.0), (10.0, 10.0), (20.0, 40.0)]);
        assert!((pl.eval(5.0) - 5.0).abs() < 1e-9);
        assert!((pl.eval(30.0) - 70.0).abs() < 1e-9);
        assert!((pl.eval(-10.0) - (-10.0)).abs() < 1e-9);
    }

    #[test]
    fn discard_infeasible_keeps_physically_plausible() {
        let obs = [(1_000_000.0, 15.0), (1_000_000.0, 1.0), (1_000_000.0, 1000.0)];
        let feasible = discard_infeasible(&obs);
        assert_eq!(feasible.len(), 1);
        assert_eq!(feasible[0], (1_000_000.0, 15.0));
    }

    #[test]
    fn percentile_median() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&xs, 50.0) - 2.5).abs() < 1e-9);
    }
}
