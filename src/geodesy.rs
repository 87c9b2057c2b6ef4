//! Geodesy primitives (component A): WGS84 forward/inverse distance,
//! geographic ⇄ geocentric conversion, and azimuthal-equidistant
//! back-projection.
//!
//! The inverse/forward geodesic problems are delegated to
//! [`geographiclib_rs`], which implements Karney's algorithm and is exact to
//! machine precision everywhere, including the near-antipodal cases where a
//! hand-rolled Vincenty iteration can fail to converge. This satisfies the
//! ≤1cm precision contract without us having to re-derive or retest it.

use geographiclib_rs::{DirectGeodesic, Geodesic, InverseGeodesic};
use geo_types::{Coord, LineString, Polygon};

use crate::ellipsoid::Ellipsoid;

/// Geodesic distance, in meters, between two points on the WGS84 ellipsoid.
/// `lon`/`lat` are in decimal degrees.
#[must_use]
pub fn wgs84_inverse(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let geod = Geodesic::wgs84();
    let (s12, _azi1, _azi2) = geod.inverse(lat1, lon1, lat2, lon2);
    s12
}

/// Walk `distance_m` along `azimuth_deg` from `(lon, lat)` on the WGS84
/// ellipsoid, returning the destination `(lon, lat)` in decimal degrees.
#[must_use]
pub fn wgs84_forward(lon: f64, lat: f64, azimuth_deg: f64, distance_m: f64) -> (f64, f64) {
    let geod = Geodesic::wgs84();
    let (lat2, lon2, _azi2) = geod.direct(lat, lon, azimuth_deg, distance_m);
    (lon2, lat2)
}

/// Convert geographic `(lon, lat, h)`, in degrees and meters, to geocentric
/// Cartesian `(x, y, z)`, in meters, on the WGS84 ellipsoid.
#[must_use]
pub fn wgs_to_geocent(lon_deg: f64, lat_deg: f64, h_m: f64) -> (f64, f64, f64) {
    Ellipsoid::wgs84().geographic_to_geocentric(lon_deg, lat_deg, h_m)
}

/// The inverse of [`wgs_to_geocent`].
#[must_use]
pub fn geocent_to_wgs(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    Ellipsoid::wgs84().geocentric_to_geographic(x, y, z)
}

/// Back-project a geodesic disk of `radius_m` centered at `(lon0, lat0)` onto
/// the WGS84 ellipsoid, returning its boundary as a closed polygon ring with
/// `n_vertices` vertices plus closing point.
///
/// An azimuthal-equidistant chart centered at `(lon0, lat0)` preserves
/// geodesic distance from the center along every azimuth, so the boundary of
/// a planar circle of radius `radius_m` back-projects to exactly the set of
/// points at geodesic distance `radius_m` from the center — i.e. walking the
/// forward geodesic problem around the full circle of azimuths, without ever
/// constructing the chart explicitly.
///
/// The caller is responsible for antimeridian/antipodal repair of the
/// resulting polygon (see `observation::bounds_for_radius`).
#[must_use]
pub fn azimuthal_equidistant_back_project(
    lon0: f64,
    lat0: f64,
    radius_m: f64,
    n_vertices: usize,
) -> Polygon<f64> {
    let n = n_vertices.max(3);
    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let azimuth = 360.0 * (i as f64) / (n as f64);
        let (lon, lat) = wgs84_forward(lon0, lat0, azimuth, radius_m);
        coords.push(Coord { x: lon, y: lat });
    }
    coords.push(coords[0]);
    Polygon::new(LineString::new(coords), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copenhagen_paris() {
        // Expected value from Karney's GeodSolve, also used by the teacher
        // crate's own geodesics test.
        let d = wgs84_inverse(12.0, 55.0, 2.0, 49.0);
        assert!((d - 956_066.231_959).abs() < 1e-2);
    }

    #[test]
    fn forward_inverse_round_trip() {
        let (lon2, lat2) = wgs84_forward(12.0, 55.0, 45.0, 100_000.0);
        let d = wgs84_inverse(12.0, 55.0, lon2, lat2);
        assert!((d - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn aeqd_back_project_is_centered() {
        let poly = azimuthal_equidistant_back_project(0.0, 0.0, 500_000.0, 64);
        assert_eq!(poly.exterior().0.len(), 65);
        for c in poly.exterior().0.iter() {
            let d = wgs84_inverse(0.0, 0.0, c.x, c.y);
            assert!((d - 500_000.0).abs() < 1.0);
        }
    }
}
