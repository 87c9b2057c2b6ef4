//! End-to-end scenarios S5 and S6: the two scenarios that need more than
//! one module in isolation (filesystem round-trip, and a full Map/Observation
//! intersection). S1–S4 are covered as unit tests colocated with the
//! calibration, ranging, and observation code they exercise.

use ageo::calibration::{Calibration, PhysicalLimitsOnly, PhysicalMode};
use ageo::grid::Grid;
use ageo::location::{persist, Location};
use ageo::observation::observe;
use ageo::sparse::SparsePmf;

fn synthetic_map(grid: &Grid) -> Location {
    let mut triplets = Vec::with_capacity(1_000);
    let mut n = 0usize;
    'outer: for j in 0..grid.ny() {
        for i in 0..grid.nx() {
            if (i + j * 7) % 11 == 0 {
                triplets.push((j, i, 1.0 + (i + j) as f64));
                n += 1;
                if n >= 1_000 {
                    break 'outer;
                }
            }
        }
    }
    Location::materialized(grid.clone(), SparsePmf::from_triplets(grid.ny(), grid.nx(), triplets))
}

/// S5: save then load a ~1000-nonzero Location; the round trip preserves
/// grid scalars exactly, the PMF to within 1 ulp of f32, and the
/// centroid/covariance attributes byte-identically.
#[test]
fn s5_save_load_round_trip() {
    let grid = Grid::new(100_000.0, 10_000.0, -20.0, -20.0, 20.0, 20.0);
    let loc = synthetic_map(&grid);
    assert!(loc.probability().nnz() >= 500);

    let centroid = loc.centroid().unwrap();
    let covariance = loc.covariance().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("location.h5");
    persist::save(&loc, &path).unwrap();
    let loaded = persist::load(&path).unwrap();

    assert_eq!(loc.grid(), loaded.grid());

    let original: std::collections::HashMap<(usize, usize), f64> =
        loc.probability().triplets().map(|(r, c, v)| ((r, c), v)).collect();
    let round_tripped: std::collections::HashMap<(usize, usize), f64> =
        loaded.probability().triplets().map(|(r, c, v)| ((r, c), v)).collect();
    assert_eq!(original.len(), round_tripped.len());
    for (key, v) in &original {
        let v2 = round_tripped.get(key).expect("round-tripped cell missing");
        assert!(
            ((*v as f32) - (*v2 as f32)).abs() <= f32::EPSILON,
            "cell {key:?}: {v} vs {v2}"
        );
    }

    assert_eq!(centroid, loaded.centroid().unwrap());
    assert_eq!(covariance, loaded.covariance().unwrap());
}

/// S6: a Map intersected with an Observation centered on the map's own
/// centroid, whose ranging function collapses to a zero-width band at
/// RTT=0, is vacuous.
#[test]
fn s6_zero_radius_observation_is_vacuous() {
    let grid = Grid::new(100_000.0, 10_000.0, -20.0, -20.0, 20.0, 20.0);
    let map = synthetic_map(&grid);
    let (clon, clat) = map.centroid().unwrap();

    let calibration: Calibration = PhysicalLimitsOnly::new(PhysicalMode::Empirical).into();
    let obs = observe(&map, clon, clat, &calibration, &[0.0]).unwrap();
    assert!(obs.is_vacuous());

    let result = map.intersection(&obs).unwrap();
    assert!(result.is_vacuous());
}
