//! Region carving (component F.3): restrict a baseline map's PMF to a
//! country, continent, or other named region, with a fuzz margin to absorb
//! coastline/boundary uncertainty.

use geo::{Buffer, BoundingRect};
use geo_types::Polygon;

use crate::error::Result;
use crate::grid::Rect;
use crate::location::Location;
use crate::sparse::SparsePmf;

/// Restrict `baseline`'s PMF to the cells inside `region`, buffered outward
/// by `fuzz_deg` (decimal degrees), then renormalize. The result is eagerly
/// materialized: region carving is a one-shot batch operation, not something
/// that benefits from deferring work past the call that asked for it.
pub fn carve_region(baseline: &Location, region: &Polygon<f64>, fuzz_deg: f64) -> Result<Location> {
    let grid = baseline.grid();
    let buffered = largest(region.buffer(fuzz_deg)).unwrap_or_else(|| region.clone());

    let candidate_rect = bounding_rect_of(&buffered);
    let (icols, jrows) = grid.mask_indices(&candidate_rect);

    let mut triplets = Vec::new();
    for j in jrows.clone() {
        let lat = grid.latitudes[j];
        for i in icols.clone() {
            let lon = grid.longitudes[i];
            if polygon_contains(&buffered, lon, lat) {
                if let Some(v) = baseline.probability().get(j, i) {
                    if v != 0.0 {
                        triplets.push((j, i, v));
                    }
                }
            }
        }
    }

    let mut carved = SparsePmf::from_triplets(grid.ny(), grid.nx(), triplets);
    carved.normalize_in_place();

    Ok(Location::materialized(grid.clone(), carved))
}

fn polygon_contains(poly: &Polygon<f64>, lon: f64, lat: f64) -> bool {
    use geo::Contains;
    poly.contains(&geo_types::Point::new(lon, lat))
}

fn largest(multi: geo_types::MultiPolygon<f64>) -> Option<Polygon<f64>> {
    use geo::Area;
    multi
        .0
        .into_iter()
        .max_by(|p, q| p.unsigned_area().partial_cmp(&q.unsigned_area()).unwrap())
}

fn bounding_rect_of(poly: &Polygon<f64>) -> Rect {
    match poly.bounding_rect() {
        Some(r) => Rect::new(r.min().x, r.min().y, r.max().x, r.max().y),
        None => Rect::new(0.0, 0.0, 0.0, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use geo_types::{Coord, LineString};

    #[test]
    fn carving_keeps_only_interior_mass() {
        let grid = Grid::new(50_000.0, 10_000.0, -10.0, -10.0, 10.0, 10.0);
        let all_ones: Vec<(usize, usize, f64)> = (0..grid.ny())
            .flat_map(|j| (0..grid.nx()).map(move |i| (j, i, 1.0)))
            .collect();
        let baseline = Location::materialized(
            grid.clone(),
            SparsePmf::from_triplets(grid.ny(), grid.nx(), all_ones),
        );

        let region = Polygon::new(
            LineString::new(vec![
                Coord { x: -1.0, y: -1.0 },
                Coord { x: 1.0, y: -1.0 },
                Coord { x: 1.0, y: 1.0 },
                Coord { x: -1.0, y: 1.0 },
                Coord { x: -1.0, y: -1.0 },
            ]),
            vec![],
        );

        let carved = carve_region(&baseline, &region, 0.1).unwrap();
        assert!(carved.probability().nnz() > 0);
        for (row, col, v) in carved.probability().triplets() {
            if v == 0.0 {
                continue;
            }
            assert!(grid.longitudes[col].abs() <= 1.1);
            assert!(grid.latitudes[row].abs() <= 1.1);
        }
    }
}
