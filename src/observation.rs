//! Observation (component F.2): a single landmark's timing measurements,
//! turned into a Location lazily, on demand.
//!
//! Bounds computation follows the azimuthal-equidistant back-projection
//! recipe used elsewhere in the wider system for rendering a geodesic disk
//! on the globe: back-project a planar circle, repair the two coordinate
//! singularities (the longitude ±180° seam, and near-antipodal radii whose
//! projected "disk" is actually the complement of the region it should
//! cover), and validate the result contains the reference point.

use geo::{BooleanOps, Contains};
use geo_types::{Coord, LineString, Point, Polygon};

use crate::calibration::Calibration;
use crate::error::{Error, Result};
use crate::geodesy::{azimuthal_equidistant_back_project, wgs84_inverse};
use crate::grid::{Grid, Rect};
use crate::location::{rect_to_polygon, Location, LocationSource};
use crate::ranging::{MinMaxSoftSkirt, RangingFn};
use crate::sparse::SparsePmf;

/// Floor applied to the back-projection radius to avoid numerical underflow
/// on a near-zero disk.
const MIN_RADIUS_M: f64 = 1_000.0;

/// Beyond this radius the AEQD back-projection becomes numerically
/// unreliable; the region is close enough to the whole planet that we just
/// call it the whole grid.
const GIVE_UP_RADIUS_M: f64 = 19_975_000.0;

const BACK_PROJECTION_VERTICES: usize = 64;

/// Build a Location for one landmark's RTT measurements against `basemap`'s
/// grid. Both `bounds` and the probability matrix are computed lazily.
pub fn observe(
    basemap: &Location,
    ref_lon: f64,
    ref_lat: f64,
    calibration: &Calibration,
    rtts: &[f64],
) -> Result<Location> {
    if rtts.is_empty() {
        return Err(Error::BadObservation(
            "no RTT measurements supplied".to_string(),
        ));
    }
    let ranging = MinMaxSoftSkirt::new(calibration, rtts);
    let source = ObservationSource {
        ref_lon,
        ref_lat,
        ranging,
    };
    Ok(Location::from_source(basemap.grid().clone(), source))
}

#[derive(Debug)]
struct ObservationSource {
    ref_lon: f64,
    ref_lat: f64,
    ranging: MinMaxSoftSkirt,
}

impl LocationSource for ObservationSource {
    fn bounds(&self, grid: &Grid) -> Polygon<f64> {
        bounds_for_radius(
            self.ref_lon,
            self.ref_lat,
            self.ranging.distance_bound(),
            grid,
        )
    }

    fn probability_within(&self, grid: &Grid, rect: &Rect) -> SparsePmf {
        let (icols, jrows) = grid.mask_indices(rect);
        let mut indices = Vec::with_capacity(icols.len() * jrows.len());
        let mut distances = Vec::with_capacity(icols.len() * jrows.len());
        for j in jrows.clone() {
            let lat = grid.latitudes[j];
            for i in icols.clone() {
                let lon = grid.longitudes[i];
                distances.push(wgs84_inverse(lon, lat, self.ref_lon, self.ref_lat));
                indices.push((j, i));
            }
        }

        let pvals = self.ranging.unnormalized_pvals(&distances);
        let triplets: Vec<(usize, usize, f64)> = indices
            .into_iter()
            .zip(pvals)
            .filter(|&(_, v)| v != 0.0)
            .map(|((j, i), v)| (j, i, v))
            .collect();

        let mut p = SparsePmf::from_triplets(grid.ny(), grid.nx(), triplets);
        p.normalize_in_place();
        p
    }
}

/// The bounds polygon for a geodesic disk of `radius_m` centered at
/// `(ref_lon, ref_lat)`, clipped to `grid`'s rectangle.
fn bounds_for_radius(ref_lon: f64, ref_lat: f64, radius_m: f64, grid: &Grid) -> Polygon<f64> {
    let radius = radius_m.max(MIN_RADIUS_M);
    if radius > GIVE_UP_RADIUS_M {
        return rect_to_polygon(&grid.bounds_rect());
    }

    let raw = azimuthal_equidistant_back_project(
        ref_lon,
        ref_lat,
        radius,
        BACK_PROJECTION_VERTICES,
    );
    let repaired = repair_antimeridian(raw.exterior().0.clone());
    let healed = heal_self_intersections(repaired);

    let origin = Point::new(ref_lon, ref_lat);
    if healed.contains(&origin) {
        healed
    } else {
        let whole = rect_to_polygon(&grid.bounds_rect());
        polygon_difference(&whole, &healed)
    }
}

/// Walk consecutive vertices; whenever the longitude jumps by more than
/// 180°, the boundary has crossed the ±180° seam, so splice in four
/// auxiliary vertices that route the boundary through the nearer pole
/// instead, preserving the area the disk should enclose.
fn repair_antimeridian(mut coords: Vec<Coord<f64>>) -> Vec<Coord<f64>> {
    let mut i = 0;
    while i + 1 < coords.len() {
        let a = coords[i];
        let b = coords[i + 1];
        if (b.x - a.x).abs() > 180.0 {
            let pole = if a.y < 0.0 { -90.0 } else { 90.0 };
            let west = if a.x < 0.0 { -180.0 } else { 180.0 };
            let east = if a.x < 0.0 { 180.0 } else { -180.0 };
            let insert = [
                Coord { x: west, y: a.y },
                Coord { x: west, y: pole },
                Coord { x: east, y: pole },
                Coord { x: east, y: b.y },
            ];
            coords.splice(i + 1..i + 1, insert);
            i += 5;
        } else {
            i += 1;
        }
    }
    coords
}

/// Two antimeridian excursions inserted on the same side of the equator can
/// coincide and make the ring self-intersecting; unioning the polygon with
/// itself is this crate's `buffer(0)`-equivalent repair.
fn heal_self_intersections(coords: Vec<Coord<f64>>) -> Polygon<f64> {
    let poly = Polygon::new(LineString::new(coords), vec![]);
    let healed = poly.union(&poly);
    largest_polygon(healed).unwrap_or(poly)
}

fn polygon_difference(a: &Polygon<f64>, b: &Polygon<f64>) -> Polygon<f64> {
    let result = a.difference(b);
    largest_polygon(result).unwrap_or_else(|| Polygon::new(LineString::new(vec![]), vec![]))
}

fn largest_polygon(multi: geo_types::MultiPolygon<f64>) -> Option<Polygon<f64>> {
    use geo::Area;
    multi
        .0
        .into_iter()
        .max_by(|p, q| p.unsigned_area().partial_cmp(&q.unsigned_area()).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Calibration, PhysicalLimitsOnly, PhysicalMode};
    use crate::grid::Grid;

    fn world_grid() -> Grid {
        Grid::new(50_000.0, 10_000.0, -180.0, -90.0, 180.0, 90.0)
    }

    #[test]
    fn s4_observation_bounds_match_minmax_skirt() {
        let grid = world_grid();
        let baseline = Location::materialized(
            grid.clone(),
            SparsePmf::from_triplets(
                grid.ny(),
                grid.nx(),
                (0..grid.ny()).flat_map(|j| (0..grid.nx()).map(move |i| (j, i, 1.0))),
            ),
        );
        let cal: Calibration = PhysicalLimitsOnly::new(PhysicalMode::Empirical).into();
        let ranging = MinMaxSoftSkirt::new(&cal, &[20.0]);
        let loc = observe(&baseline, 0.0, 0.0, &cal, &[20.0]).unwrap();
        let p = loc.probability();
        for (row, col, v) in p.triplets() {
            if v == 0.0 {
                continue;
            }
            let d = wgs84_inverse(grid.longitudes[col], grid.latitudes[row], 0.0, 0.0);
            // The soft skirt extends nonzero mass out to the combined
            // range's outermost knot (the absolute physical max), not just
            // the tighter empirical band.
            assert!(d <= ranging.distance_bound() + grid.fuzz_m + 1.0);
        }
    }

    #[test]
    fn antimeridian_disk_contains_far_side_point() {
        let poly = bounds_for_radius(179.0, 0.0, 500_000.0, &world_grid());
        assert!(poly.contains(&Point::new(-179.5, 0.0)));
    }

    #[test]
    fn antipodal_radius_excludes_antipode() {
        let poly = bounds_for_radius(0.0, 0.0, 19_990_000.0, &world_grid());
        assert!(!poly.contains(&Point::new(180.0, 0.0)));
    }
}
