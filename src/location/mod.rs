//! Location objects (component E): the PMF carrier shared by baseline maps,
//! observations, and the results of intersecting either with another
//! Location.
//!
//! A `Location`'s optional fields — its probability matrix, its bounding
//! polygon, its centroid, its covariance — are computed at most once, on
//! first access, and cached from then on ("Fresh → Bounded → Materialized →
//! Full" in the crate's lifecycle notes). The mechanism is one
//! [`once_cell::sync::OnceCell`] per field rather than interior mutation of
//! shared state, so a fully-materialized `Location` is `Sync` and safe to
//! share read-only across threads.

pub mod persist;

use geo::{BooleanOps, BoundingRect, Coord, LineString, Polygon};
use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::geodesy::{geocent_to_wgs, wgs_to_geocent};
use crate::grid::{Grid, Rect};
use crate::sparse::SparsePmf;

/// How a `Location`'s bounds and PMF are produced the first time they're
/// needed. `Map` loads both eagerly and exposes them through
/// [`MaterializedSource`]; `Observation` computes both lazily from a
/// landmark, ranging function, and calibration.
pub trait LocationSource: std::fmt::Debug + Send + Sync {
    /// The lon/lat region within which this Location's PMF can be nonzero.
    fn bounds(&self, grid: &Grid) -> Polygon<f64>;

    /// Evaluate this Location's PMF, restricted to the candidate index
    /// rectangle `rect` (already intersected with this source's bounds).
    fn probability_within(&self, grid: &Grid, rect: &Rect) -> SparsePmf;
}

/// A `LocationSource` for a PMF that has already been fully computed (a
/// baseline map, or the result of an intersection).
#[derive(Debug, Clone)]
pub struct MaterializedSource {
    p: SparsePmf,
    bounds: Polygon<f64>,
}

impl LocationSource for MaterializedSource {
    fn bounds(&self, _grid: &Grid) -> Polygon<f64> {
        self.bounds.clone()
    }

    fn probability_within(&self, grid: &Grid, rect: &Rect) -> SparsePmf {
        mask_and_renormalize(&self.p, grid, rect)
    }
}

#[derive(Debug)]
pub struct Location {
    grid: Grid,
    source: Box<dyn LocationSource>,
    p: OnceCell<SparsePmf>,
    vacuous: OnceCell<bool>,
    bounds: OnceCell<Polygon<f64>>,
    centroid: OnceCell<(f64, f64)>,
    covariance: OnceCell<[[f64; 3]; 3]>,
}

impl Location {
    /// Build a Location whose PMF is already known in full (a baseline map,
    /// or an intersection result).
    #[must_use]
    pub fn materialized(grid: Grid, p: SparsePmf) -> Self {
        let bounds = rect_to_polygon(&grid.bounds_rect());
        let source = Box::new(MaterializedSource {
            p: p.clone(),
            bounds: bounds.clone(),
        });
        Location {
            grid,
            source,
            p: OnceCell::from(p),
            vacuous: OnceCell::new(),
            bounds: OnceCell::from(bounds),
            centroid: OnceCell::new(),
            covariance: OnceCell::new(),
        }
    }

    /// Build a Location whose bounds and PMF are computed lazily, from
    /// `source`, the first time they're asked for.
    #[must_use]
    pub fn from_source(grid: Grid, source: impl LocationSource + 'static) -> Self {
        Location {
            grid,
            source: Box::new(source),
            p: OnceCell::new(),
            vacuous: OnceCell::new(),
            bounds: OnceCell::new(),
            centroid: OnceCell::new(),
            covariance: OnceCell::new(),
        }
    }

    /// Reconstruct a Location from persisted state (see [`persist`]), with
    /// its centroid and covariance already known so that a load-after-save
    /// round trip reproduces them exactly rather than recomputing.
    #[must_use]
    pub(crate) fn from_persisted(
        grid: Grid,
        p: SparsePmf,
        centroid: (f64, f64),
        covariance: [[f64; 3]; 3],
    ) -> Self {
        let loc = Location::materialized(grid, p);
        let _ = loc.centroid.set(centroid);
        let _ = loc.covariance.set(covariance);
        loc
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn bounds(&self) -> &Polygon<f64> {
        self.bounds.get_or_init(|| self.source.bounds(&self.grid))
    }

    #[must_use]
    pub fn probability(&self) -> &SparsePmf {
        self.p.get_or_init(|| {
            let rect = bounding_rect_of(self.bounds());
            self.source.probability_within(&self.grid, &rect)
        })
    }

    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        *self.vacuous.get_or_init(|| self.probability().sum() == 0.0)
    }

    /// `P(self AND other)`: require identical grids, intersect bounds, mask
    /// and renormalize each operand to the combined bounds, then take the
    /// normalized Hadamard product. Absorbing: if either operand's masked
    /// PMF is vacuous, the result is the zero matrix.
    pub fn intersection(&self, other: &Location) -> Result<Location> {
        if self.grid != other.grid {
            return Err(Error::GridMismatch(
                "locations do not share an identical grid".to_string(),
            ));
        }

        let combined = polygon_intersection(self.bounds(), other.bounds());
        let rect = bounding_rect_of(&combined);

        let p1 = mask_and_renormalize(self.probability(), &self.grid, &rect);
        let p2 = mask_and_renormalize(other.probability(), &self.grid, &rect);

        if p1.sum() == 0.0 || p2.sum() == 0.0 {
            return Ok(Location::materialized(
                self.grid.clone(),
                SparsePmf::zero(self.grid.ny(), self.grid.nx()),
            ));
        }

        let mut product = p1.hadamard(&p2);
        let total = product.normalize_in_place();
        if total == 0.0 {
            return Ok(Location::materialized(
                self.grid.clone(),
                SparsePmf::zero(self.grid.ny(), self.grid.nx()),
            ));
        }
        Ok(Location::materialized(self.grid.clone(), product))
    }

    /// The weighted centroid, in WGS84 `(lon, lat)` degrees.
    pub fn centroid(&self) -> Result<(f64, f64)> {
        if let Some(c) = self.centroid.get() {
            return Ok(*c);
        }
        let (centroid, covariance) = self.compute_centroid_and_covariance()?;
        let _ = self.centroid.set(centroid);
        let _ = self.covariance.set(covariance);
        Ok(centroid)
    }

    /// The 3x3 sample covariance, in uncentered geocentric Cartesian meters.
    pub fn covariance(&self) -> Result<[[f64; 3]; 3]> {
        if let Some(c) = self.covariance.get() {
            return Ok(*c);
        }
        let (centroid, covariance) = self.compute_centroid_and_covariance()?;
        let _ = self.centroid.set(centroid);
        let _ = self.covariance.set(covariance);
        Ok(covariance)
    }

    fn compute_centroid_and_covariance(&self) -> Result<((f64, f64), [[f64; 3]; 3])> {
        let p = self.probability();
        let mut weighted_sum = [0.0_f64; 3];
        let mut weighted_points: Vec<[f64; 3]> = Vec::with_capacity(p.nnz());

        for (row, col, v) in p.triplets() {
            if v == 0.0 {
                continue;
            }
            let lon = self.grid.longitudes[col];
            let lat = self.grid.latitudes[row];
            let (x, y, z) = wgs_to_geocent(lon, lat, 0.0);
            if !x.is_finite() || !y.is_finite() || !z.is_finite() {
                log::warn!("dropping non-finite geocentric point at ({lon}, {lat})");
                continue;
            }
            weighted_sum[0] += v * x;
            weighted_sum[1] += v * y;
            weighted_sum[2] += v * z;
            weighted_points.push([v * x, v * y, v * z]);
        }

        let (clon, clat, _) = geocent_to_wgs(weighted_sum[0], weighted_sum[1], weighted_sum[2]);
        if !clon.is_finite() || !clat.is_finite() {
            return Err(Error::DegenerateCentroid(
                "weighted geocentric sum inverted to a non-finite longitude/latitude".to_string(),
            ));
        }

        let covariance = sample_covariance(&weighted_points);
        Ok(((clon, clat), covariance))
    }
}

fn sample_covariance(points: &[[f64; 3]]) -> [[f64; 3]; 3] {
    let n = points.len() as f64;
    let mut mean = [0.0; 3];
    for p in points {
        for k in 0..3 {
            mean[k] += p[k];
        }
    }
    if n > 0.0 {
        for m in &mut mean {
            *m /= n;
        }
    }

    let mut cov = [[0.0; 3]; 3];
    if n > 1.0 {
        for p in points {
            for a in 0..3 {
                for b in 0..3 {
                    cov[a][b] += (p[a] - mean[a]) * (p[b] - mean[b]);
                }
            }
        }
        for row in &mut cov {
            for v in row.iter_mut() {
                *v /= n - 1.0;
            }
        }
    }
    cov
}

fn mask_and_renormalize(p: &SparsePmf, grid: &Grid, rect: &Rect) -> SparsePmf {
    let mask = SparsePmf::mask_matrix(rect, grid);
    let mut masked = p.hadamard(&mask);
    masked.normalize_in_place();
    masked
}

pub(crate) fn rect_to_polygon(rect: &Rect) -> Polygon<f64> {
    let coords = vec![
        Coord {
            x: rect.west,
            y: rect.south,
        },
        Coord {
            x: rect.east,
            y: rect.south,
        },
        Coord {
            x: rect.east,
            y: rect.north,
        },
        Coord {
            x: rect.west,
            y: rect.north,
        },
        Coord {
            x: rect.west,
            y: rect.south,
        },
    ];
    Polygon::new(LineString::new(coords), vec![])
}

fn bounding_rect_of(poly: &Polygon<f64>) -> Rect {
    match poly.bounding_rect() {
        Some(r) => Rect::new(r.min().x, r.min().y, r.max().x, r.max().y),
        None => Rect::new(0.0, 0.0, 0.0, 0.0),
    }
}

fn polygon_intersection(a: &Polygon<f64>, b: &Polygon<f64>) -> Polygon<f64> {
    let multi = a.intersection(b);
    multi
        .0
        .into_iter()
        .max_by(|p, q| area_of(p).partial_cmp(&area_of(q)).unwrap())
        .unwrap_or_else(|| Polygon::new(LineString::new(vec![]), vec![]))
}

fn area_of(poly: &Polygon<f64>) -> f64 {
    use geo::Area;
    poly.unsigned_area()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn flat_grid() -> Grid {
        Grid::new(100_000.0, 10_000.0, -10.0, -10.0, 10.0, 10.0)
    }

    #[test]
    fn intersection_requires_matching_grid() {
        let g1 = flat_grid();
        let g2 = Grid::new(50_000.0, 10_000.0, -10.0, -10.0, 10.0, 10.0);
        let l1 = Location::materialized(g1.clone(), SparsePmf::zero(g1.ny(), g1.nx()));
        let l2 = Location::materialized(g2.clone(), SparsePmf::zero(g2.ny(), g2.nx()));
        assert!(l1.intersection(&l2).is_err());
    }

    #[test]
    fn vacuity_absorbs() {
        let g = flat_grid();
        let zero = Location::materialized(g.clone(), SparsePmf::zero(g.ny(), g.nx()));
        let mut entries = Vec::new();
        entries.push((g.ny() / 2, g.nx() / 2, 1.0));
        let nonzero = Location::materialized(g.clone(), SparsePmf::from_triplets(g.ny(), g.nx(), entries));
        let result = nonzero.intersection(&zero).unwrap();
        assert!(result.is_vacuous());
    }

    #[test]
    fn centroid_of_single_cell_is_that_cell() {
        let g = flat_grid();
        let j = g.ny() / 2;
        let i = g.nx() / 2;
        let loc = Location::materialized(
            g.clone(),
            SparsePmf::from_triplets(g.ny(), g.nx(), vec![(j, i, 1.0)]),
        );
        let (lon, lat) = loc.centroid().unwrap();
        assert!((lon - g.longitudes[i]).abs() < 1e-6);
        assert!((lat - g.latitudes[j]).abs() < 1e-6);
    }
}
