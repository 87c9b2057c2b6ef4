//! The WGS84 reference ellipsoid and the geocentric ⇄ geographic conversions
//! built on it.
//!
//! Modeled on the `Ellipsoid` type used throughout the teacher geodesy
//! crate's `ellipsoids` module: a small value type carrying the two defining
//! constants (semi-major axis and flattening) plus the handful of derived
//! quantities every other geodesy routine in the crate needs.

use std::f64::consts::PI;

/// WGS84 equatorial semi-major axis, in meters.
pub const WGS84_A: f64 = 6_378_137.0;

/// WGS84 flattening, `1/298.257_223_563`.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Half of the equatorial circumference of the Earth, in meters. No distance
/// produced by this crate may exceed this value.
pub const DIST_LIMIT: f64 = 20_037_508.0;

/// A reference ellipsoid, defined by its semi-major axis and flattening.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipsoid {
    a: f64,
    f: f64,
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl Ellipsoid {
    /// A user-defined ellipsoid.
    #[must_use]
    pub fn new(semimajor_axis: f64, flattening: f64) -> Self {
        Ellipsoid {
            a: semimajor_axis,
            f: flattening,
        }
    }

    /// The WGS84 ellipsoid.
    #[must_use]
    pub fn wgs84() -> Self {
        Ellipsoid {
            a: WGS84_A,
            f: WGS84_F,
        }
    }

    #[must_use]
    pub fn semimajor_axis(&self) -> f64 {
        self.a
    }

    #[must_use]
    pub fn flattening(&self) -> f64 {
        self.f
    }

    #[must_use]
    pub fn semiminor_axis(&self) -> f64 {
        self.a * (1.0 - self.f)
    }

    /// The squared eccentricity, *e² = f(2 − f)*.
    #[must_use]
    pub fn eccentricity_squared(&self) -> f64 {
        self.f * (2.0 - self.f)
    }

    #[must_use]
    pub fn eccentricity(&self) -> f64 {
        self.eccentricity_squared().sqrt()
    }

    /// The squared second eccentricity, *e'² = e² / (1 − e²)*.
    #[must_use]
    pub fn second_eccentricity_squared(&self) -> f64 {
        let es = self.eccentricity_squared();
        es / (1.0 - es)
    }

    /// The radius of curvature in the prime vertical at the given
    /// geographic latitude (radians).
    #[must_use]
    pub fn prime_vertical_radius_of_curvature(&self, lat_rad: f64) -> f64 {
        let es = self.eccentricity_squared();
        let sin_lat = lat_rad.sin();
        self.a / (1.0 - es * sin_lat * sin_lat).sqrt()
    }

    /// Convert geographic (longitude, latitude, height), in degrees and
    /// meters, to geocentric Cartesian (x, y, z), in meters.
    #[must_use]
    pub fn geographic_to_geocentric(&self, lon_deg: f64, lat_deg: f64, h_m: f64) -> (f64, f64, f64) {
        let lon = lon_deg.to_radians();
        let lat = lat_deg.to_radians();
        let es = self.eccentricity_squared();
        let n = self.prime_vertical_radius_of_curvature(lat);
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let x = (n + h_m) * cos_lat * cos_lon;
        let y = (n + h_m) * cos_lat * sin_lon;
        let z = (n * (1.0 - es) + h_m) * sin_lat;
        (x, y, z)
    }

    /// Convert geocentric Cartesian (x, y, z), in meters, to geographic
    /// (longitude, latitude, height), in degrees and meters, using Bowring's
    /// closed-form approximation followed by one Newton refinement step.
    #[must_use]
    pub fn geocentric_to_geographic(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let a = self.a;
        let b = self.semiminor_axis();
        let es = self.eccentricity_squared();
        let eps = self.second_eccentricity_squared();

        let lon = y.atan2(x);
        let p = x.hypot(y);

        if p < 1e-9 {
            // On (or very near) the polar axis: longitude is meaningless.
            let lat = if z >= 0.0 { PI / 2.0 } else { -PI / 2.0 };
            return (0.0, lat.to_degrees(), z.abs() - b);
        }

        let theta = (z * a).atan2(p * b);
        let (sin_theta, cos_theta) = theta.sin_cos();

        let num = z + eps * b * sin_theta.powi(3);
        let den = p - es * a * cos_theta.powi(3);
        let lat = num.atan2(den);

        let n = self.prime_vertical_radius_of_curvature(lat);
        let h = p / lat.cos() - n;

        (lon.to_degrees(), lat.to_degrees(), h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_geocentric() {
        let e = Ellipsoid::wgs84();
        let (x, y, z) = e.geographic_to_geocentric(12.0, 55.0, 100.0);
        let (lon, lat, h) = e.geocentric_to_geographic(x, y, z);
        assert!((lon - 12.0).abs() < 1e-9);
        assert!((lat - 55.0).abs() < 1e-9);
        assert!((h - 100.0).abs() < 1e-6);
    }

    #[test]
    fn equator_prime_meridian() {
        let e = Ellipsoid::wgs84();
        let (x, y, z) = e.geographic_to_geocentric(0.0, 0.0, 0.0);
        assert!((x - WGS84_A).abs() < 1e-6);
        assert!(y.abs() < 1e-6);
        assert!(z.abs() < 1e-6);
    }

    #[test]
    fn flattening_matches_semiminor_axis() {
        let e = Ellipsoid::wgs84();
        // b = a(1-f); WGS84 b is ~6356752.314245
        assert!((e.semiminor_axis() - 6_356_752.314_245).abs() < 1e-3);
    }
}
