//! Quasi-Octant calibration (4.C.3), derived from "Octant: A Comprehensive
//! Framework for the Geolocalization of Internet Hosts" (NSDI 2007): the
//! convex hull of (RTT, distance) observations, split into an upper
//! (fastest-propagation) and lower (slowest-propagation) polyline.

use geo::{ConvexHull, Coord, MultiPoint};

use crate::ellipsoid::DIST_LIMIT;
use crate::error::{Error, Result};

use super::curve::{discard_infeasible, percentile, PolyLine};
use super::CalibrationAlgo;

/// Which hull chain maps to the *greatest* plausible distance.
///
/// The source material swaps this orientation between worked variants with
/// no stated reason (see the crate-level discussion of Quasi-Octant's open
/// question); both orientations are kept available via this flag rather than
/// guessed at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HullOrientation {
    /// The upper chain (as walked from the leftmost hull vertex) bounds the
    /// greatest distance (fastest propagation); the lower chain bounds the
    /// least. This is the orientation spec.md's worked description assumes.
    UpperIsMax,
    /// The chains are swapped relative to [`UpperIsMax`](Self::UpperIsMax).
    LowerIsMax,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct QuasiOctant {
    max_curve: PolyLine,
    min_curve: PolyLine,
}

impl QuasiOctant {
    /// `observations` is `(distance_m, rtt_ms)` pairs.
    pub fn fit(observations: &[(f64, f64)], orientation: HullOrientation) -> Result<Self> {
        let feasible = discard_infeasible(observations);
        if feasible.is_empty() {
            return Err(Error::BadObservation(
                "no feasible observations".to_string(),
            ));
        }

        // Swap columns: we want RTT predicting distance, i.e. x=RTT, y=dist.
        let swapped: Vec<(f64, f64)> = feasible.iter().map(|&(d, r)| (r, d)).collect();
        let rtts: Vec<f64> = swapped.iter().map(|&(x, _)| x).collect();

        let points: MultiPoint<f64> = swapped
            .iter()
            .map(|&(x, y)| Coord { x, y })
            .collect::<Vec<_>>()
            .into();
        let hull = points.convex_hull();
        let ring = hull.exterior();
        let mut v: Vec<(f64, f64)> = ring.0.iter().map(|c| (c.x, c.y)).collect();
        if v.len() > 1 && v.first() == v.last() {
            v.pop();
        }
        if v.len() < 3 {
            return Err(Error::BadObservation(
                "convex hull degenerated to a line".to_string(),
            ));
        }

        let v = rotate_to_unique_start(v)?;
        let split = find_split(&v);
        if split < 2 || split > v.len() - 1 {
            return Err(Error::BadObservation(
                "hull split inappropriately".to_string(),
            ));
        }

        let upper = dedupe_monotonic_x(v[..split].to_vec());
        let lower = dedupe_monotonic_x(v[split - 1..].to_vec());
        if upper.len() <= 1 || lower.len() <= 1 {
            return Err(Error::BadObservation(
                "hull chain collapsed after deduplication".to_string(),
            ));
        }

        let upper_line = PolyLine::new(upper.clone());
        let lower_line = PolyLine::new(lower.clone());

        let cut50 = percentile(&rtts, 50.0);
        let cut75 = percentile(&rtts, 75.0);
        let upper_cut = (cut50, upper_line.eval(cut50));
        let lower_cut = (cut75, lower_line.eval(cut75));

        // Extrapolate each cut out to RTT=1000ms along the corresponding
        // empirical physical-limit slope, so the curve stays defined for
        // RTTs far beyond the calibration data.
        let upper_ext = extrapolate(upper_cut, 55_000.0, 1_000.0);
        let lower_ext = extrapolate(lower_cut, 100_000.0, 1_000.0);

        let mut upper_adjusted: Vec<(f64, f64)> =
            upper.into_iter().filter(|&(x, _)| x < upper_cut.0).collect();
        upper_adjusted.push(upper_cut);
        upper_adjusted.push(upper_ext);

        let mut lower_adjusted: Vec<(f64, f64)> =
            lower.into_iter().filter(|&(x, _)| x < lower_cut.0).collect();
        lower_adjusted.push(lower_cut);
        lower_adjusted.push(lower_ext);

        let (max_curve, min_curve) = match orientation {
            HullOrientation::UpperIsMax => (
                PolyLine::new(upper_adjusted),
                PolyLine::new(lower_adjusted),
            ),
            HullOrientation::LowerIsMax => (
                PolyLine::new(lower_adjusted),
                PolyLine::new(upper_adjusted),
            ),
        };

        Ok(QuasiOctant {
            max_curve,
            min_curve,
        })
    }
}

fn extrapolate(point: (f64, f64), slope: f64, intercept_x: f64) -> (f64, f64) {
    (intercept_x, point.1 + slope * (intercept_x - point.0))
}

/// Rotate `v` left until `v[0].0 != v[1].0`.
fn rotate_to_unique_start(mut v: Vec<(f64, f64)>) -> Result<Vec<(f64, f64)>> {
    let mut remaining = v.len();
    while v[0].0 == v[1].0 {
        v.rotate_left(1);
        remaining -= 1;
        if remaining == 0 {
            return Err(Error::BadObservation(
                "all hull vertices share one RTT value".to_string(),
            ));
        }
    }
    Ok(v)
}

/// Find the index at which the hull's x-coordinate stops moving
/// monotonically in its initial direction.
fn find_split(v: &[(f64, f64)]) -> usize {
    let descending = v[0].0 > v[1].0;
    for i in 0..v.len() {
        if i > 1 {
            let reversed = if descending {
                v[i - 1].0 < v[i].0
            } else {
                v[i - 1].0 > v[i].0
            };
            if reversed {
                return i;
            }
        }
    }
    v.len()
}

fn dedupe_monotonic_x(v: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::with_capacity(v.len());
    for p in v {
        if out.last().map_or(true, |&(x, _)| x != p.0) {
            out.push(p);
        }
    }
    out
}

impl CalibrationAlgo for QuasiOctant {
    fn distance_range(&self, rtts: &[f64]) -> (f64, f64) {
        let min_rtt = rtts.iter().copied().fold(f64::INFINITY, f64::min);
        let min_d = self.min_curve.eval(min_rtt).max(0.0).min(DIST_LIMIT);
        let max_d = self.max_curve.eval(min_rtt).max(0.0).min(DIST_LIMIT);
        (min_d, max_d)
    }

    fn converged(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_a_scattered_cloud() {
        let obs: Vec<(f64, f64)> = (1..200)
            .map(|i| {
                let d = i as f64 * 50_000.0;
                let rtt = d / 150_000.0 + (i % 7) as f64;
                (d, rtt)
            })
            .collect();
        let cal = QuasiOctant::fit(&obs, HullOrientation::UpperIsMax).expect("fit should succeed");
        let (min_d, max_d) = cal.distance_range(&[5.0]);
        assert!(min_d <= max_d);
    }
}
