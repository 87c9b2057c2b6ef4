//! Grid & sparse PMF support (component B): the rectangular lon/lat grid,
//! and the index/mask helpers used to restrict a [`SparsePmf`](crate::sparse::SparsePmf)
//! to a rectangle.

use std::f64::consts::PI;

use crate::ellipsoid::Ellipsoid;

/// An axis-aligned rectangle in lon/lat space: west/south inclusive,
/// east/north exclusive, matching `bisect_left`/`bisect_right` semantics on
/// the sorted grid axis vectors.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rect {
    #[must_use]
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Rect {
            west,
            south,
            east,
            north,
        }
    }
}

/// The immutable rectangular lon/lat grid shared by every [`Location`]
/// derived from the same baseline map. Two Locations may only be combined
/// when their grids are equal by value.
#[derive(Clone, Debug)]
pub struct Grid {
    pub resolution_m: f64,
    pub fuzz_m: f64,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub lon_spacing_deg: f64,
    pub lat_spacing_deg: f64,
    pub longitudes: Vec<f64>,
    pub latitudes: Vec<f64>,
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.resolution_m == other.resolution_m
            && self.fuzz_m == other.fuzz_m
            && self.north == other.north
            && self.south == other.south
            && self.east == other.east
            && self.west == other.west
            && self.lon_spacing_deg == other.lon_spacing_deg
            && self.lat_spacing_deg == other.lat_spacing_deg
    }
}

impl Grid {
    /// Build a grid covering `[west, east] x [south, north]` at
    /// approximately `resolution_m` meters per cell, derived from the WGS84
    /// ellipsoid. The longitude axis never wraps: if `east - west == 360`,
    /// the easternmost column (which would duplicate the westernmost one) is
    /// dropped.
    #[must_use]
    pub fn new(
        resolution_m: f64,
        fuzz_m: f64,
        west: f64,
        south: f64,
        east: f64,
        north: f64,
    ) -> Self {
        let ellps = Ellipsoid::wgs84();
        let a = ellps.semimajor_axis();
        let es = ellps.eccentricity_squared();

        // Meters per degree of latitude/longitude at the equator: the
        // meridional radius of curvature, and the prime-vertical radius
        // (cos(0) = 1), respectively. Using the equator keeps the grid
        // spacing uniform across the whole rectangle.
        let meridional_radius_at_equator = a * (1.0 - es);
        let meters_per_deg_lat = (PI / 180.0) * meridional_radius_at_equator;
        let meters_per_deg_lon = (PI / 180.0) * a;

        let lat_spacing_deg = resolution_m / meters_per_deg_lat;
        let lon_spacing_deg = resolution_m / meters_per_deg_lon;

        let mut longitudes = axis(west, east, lon_spacing_deg);
        if (east - west - 360.0).abs() < 1e-9 && longitudes.len() > 1 {
            longitudes.pop();
        }
        let latitudes = axis(south, north, lat_spacing_deg);

        Grid {
            resolution_m,
            fuzz_m,
            north,
            south,
            east,
            west,
            lon_spacing_deg,
            lat_spacing_deg,
            longitudes,
            latitudes,
        }
    }

    /// Build a grid directly from its eight scalars and axis vectors,
    /// without rederiving anything — used when loading a baseline map file,
    /// whose axes are authoritative on disk.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        resolution_m: f64,
        fuzz_m: f64,
        north: f64,
        south: f64,
        east: f64,
        west: f64,
        lon_spacing_deg: f64,
        lat_spacing_deg: f64,
        longitudes: Vec<f64>,
        latitudes: Vec<f64>,
    ) -> Self {
        Grid {
            resolution_m,
            fuzz_m,
            north,
            south,
            east,
            west,
            lon_spacing_deg,
            lat_spacing_deg,
            longitudes,
            latitudes,
        }
    }

    #[must_use]
    pub fn nx(&self) -> usize {
        self.longitudes.len()
    }

    #[must_use]
    pub fn ny(&self) -> usize {
        self.latitudes.len()
    }

    #[must_use]
    pub fn bounds_rect(&self) -> Rect {
        Rect::new(self.west, self.south, self.east, self.north)
    }

    /// Column/row index ranges of grid points whose coordinates fall within
    /// `rect`: west/south inclusive, east/north exclusive.
    #[must_use]
    pub fn mask_indices(&self, rect: &Rect) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let i_lo = self.longitudes.partition_point(|&x| x < rect.west);
        let i_hi = self.longitudes.partition_point(|&x| x < rect.east);
        let j_lo = self.latitudes.partition_point(|&y| y < rect.south);
        let j_hi = self.latitudes.partition_point(|&y| y < rect.north);
        (i_lo..i_hi.max(i_lo), j_lo..j_hi.max(j_lo))
    }
}

/// Build a sorted axis vector covering `[lo, hi]` with the given spacing,
/// inclusive of both endpoints (the final step is clamped so the axis never
/// overshoots `hi`).
fn axis(lo: f64, hi: f64, spacing: f64) -> Vec<f64> {
    if spacing <= 0.0 || hi <= lo {
        return vec![lo];
    }
    let n = ((hi - lo) / spacing).round() as usize + 1;
    (0..=n.max(1))
        .map(|i| (lo + spacing * i as f64).min(hi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitude_axis_never_wraps() {
        let g = Grid::new(50_000.0, 10_000.0, -180.0, -90.0, 180.0, 90.0);
        assert!((g.longitudes.last().unwrap() - 180.0).abs() > 1e-6);
    }

    #[test]
    fn mask_indices_half_open() {
        let g = Grid::new(100_000.0, 10_000.0, 0.0, 0.0, 10.0, 10.0);
        let rect = Rect::new(0.0, 0.0, 5.0, 5.0);
        let (i, j) = g.mask_indices(&rect);
        assert!(i.start == 0);
        assert!(g.longitudes[i.end - 1] < 5.0);
        assert!(j.start == 0);
        assert!(g.latitudes[j.end - 1] < 5.0);
    }

    #[test]
    fn grids_compare_by_value() {
        let a = Grid::new(50_000.0, 1_000.0, -10.0, -10.0, 10.0, 10.0);
        let b = Grid::new(50_000.0, 1_000.0, -10.0, -10.0, 10.0, 10.0);
        assert_eq!(a, b);
        let c = Grid::new(50_000.0, 2_000.0, -10.0, -10.0, 10.0, 10.0);
        assert_ne!(a, c);
    }
}
