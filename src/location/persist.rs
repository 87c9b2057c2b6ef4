//! Location file persistence: a hierarchical binary container with one
//! compound dataset of nonzero `(grid_x, grid_y, longitude, latitude,
//! prob_mass)` rows plus attributes mirroring the grid scalars, following
//! the pytables layout of the original implementation.

use std::path::Path;

use hdf5::types::VarLenAscii;
use hdf5::H5Type;

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::sparse::SparsePmf;

use super::Location;

#[repr(C)]
#[derive(Clone, Copy, Debug, H5Type)]
struct LocationRow {
    grid_x: u32,
    grid_y: u32,
    longitude: f64,
    latitude: f64,
    prob_mass: f32,
}

fn bad_file(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::BadFile {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Write `loc` to `path`. Forces computation of the centroid/covariance so
/// they can be stored alongside the grid, matching the Location file
/// format's `centroid[2]`/`covariance[3,3]` attributes.
pub fn save(loc: &Location, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let grid = loc.grid();
    let p = loc.probability();
    let (clon, clat) = loc.centroid()?;
    let covariance = loc.covariance()?;

    let file = hdf5::File::create(path).map_err(|e| bad_file(path, e))?;
    file.new_attr::<VarLenAscii>()
        .create("TITLE")
        .and_then(|a| a.write_scalar(&VarLenAscii::from_ascii("location").unwrap()))
        .map_err(|e| bad_file(path, e))?;

    write_scalar_attr(&file, path, "resolution", grid.resolution_m)?;
    write_scalar_attr(&file, path, "fuzz", grid.fuzz_m)?;
    write_scalar_attr(&file, path, "north", grid.north)?;
    write_scalar_attr(&file, path, "south", grid.south)?;
    write_scalar_attr(&file, path, "east", grid.east)?;
    write_scalar_attr(&file, path, "west", grid.west)?;
    write_scalar_attr(&file, path, "lon_spacing", grid.lon_spacing_deg)?;
    write_scalar_attr(&file, path, "lat_spacing", grid.lat_spacing_deg)?;
    write_scalar_attr(&file, path, "lon_count", grid.nx() as u64)?;
    write_scalar_attr(&file, path, "lat_count", grid.ny() as u64)?;

    file.new_dataset::<f64>()
        .shape(2)
        .create("centroid")
        .and_then(|ds| ds.write(&[clon, clat]))
        .map_err(|e| bad_file(path, e))?;

    let cov_flat: Vec<f64> = covariance.iter().flatten().copied().collect();
    file.new_dataset::<f64>()
        .shape((3, 3))
        .create("covariance")
        .and_then(|ds| ds.write_raw(&cov_flat))
        .map_err(|e| bad_file(path, e))?;

    let rows: Vec<LocationRow> = p
        .triplets()
        .filter(|&(_, _, v)| v != 0.0)
        .map(|(row, col, v)| LocationRow {
            grid_x: col as u32,
            grid_y: row as u32,
            longitude: grid.longitudes[col],
            latitude: grid.latitudes[row],
            prob_mass: v as f32,
        })
        .collect();

    file.new_dataset_builder()
        .with_data(&rows)
        .create("location")
        .map_err(|e| bad_file(path, e))?;

    Ok(())
}

fn write_scalar_attr<T: H5Type>(
    file: &hdf5::File,
    path: &Path,
    name: &str,
    value: T,
) -> Result<()> {
    file.new_attr::<T>()
        .create(name)
        .and_then(|a| a.write_scalar(&value))
        .map_err(|e| bad_file(path, e))
}

fn read_scalar_attr<T: H5Type + Copy>(
    file: &hdf5::File,
    path: &Path,
    name: &str,
) -> Result<T> {
    file.attr(name)
        .and_then(|a| a.read_scalar::<T>())
        .map_err(|e| bad_file(path, e))
}

/// Read a Location file written by [`save`]. The centroid/covariance stored
/// in the file are trusted rather than recomputed, so a `load(save(L))`
/// round trip reproduces them byte-for-byte.
pub fn load(path: impl AsRef<Path>) -> Result<Location> {
    let path = path.as_ref();
    let file = hdf5::File::open(path).map_err(|e| bad_file(path, e))?;

    let resolution_m: f64 = read_scalar_attr(&file, path, "resolution")?;
    let fuzz_m: f64 = read_scalar_attr(&file, path, "fuzz")?;
    let north: f64 = read_scalar_attr(&file, path, "north")?;
    let south: f64 = read_scalar_attr(&file, path, "south")?;
    let east: f64 = read_scalar_attr(&file, path, "east")?;
    let west: f64 = read_scalar_attr(&file, path, "west")?;
    let lon_count: u64 = read_scalar_attr(&file, path, "lon_count")?;
    let lat_count: u64 = read_scalar_attr(&file, path, "lat_count")?;

    let grid = Grid::new(resolution_m, fuzz_m, west, south, east, north);
    if grid.nx() as u64 != lon_count || grid.ny() as u64 != lat_count {
        return Err(bad_file(
            path,
            "stored lon_count/lat_count do not match the grid reconstructed from its scalars",
        ));
    }

    let centroid_ds = file.dataset("centroid").map_err(|e| bad_file(path, e))?;
    let centroid_raw: Vec<f64> = centroid_ds.read_raw().map_err(|e| bad_file(path, e))?;
    if centroid_raw.len() != 2 {
        return Err(bad_file(path, "centroid dataset is not length 2"));
    }

    let covariance_ds = file.dataset("covariance").map_err(|e| bad_file(path, e))?;
    let covariance_raw: Vec<f64> = covariance_ds.read_raw().map_err(|e| bad_file(path, e))?;
    if covariance_raw.len() != 9 {
        return Err(bad_file(path, "covariance dataset is not shape [3,3]"));
    }
    let mut covariance = [[0.0; 3]; 3];
    for (idx, v) in covariance_raw.into_iter().enumerate() {
        covariance[idx / 3][idx % 3] = v;
    }

    let rows_ds = file.dataset("location").map_err(|e| bad_file(path, e))?;
    let rows: Vec<LocationRow> = rows_ds.read_raw().map_err(|e| bad_file(path, e))?;

    let triplets = rows
        .iter()
        .map(|r| (r.grid_y as usize, r.grid_x as usize, r.prob_mass as f64));
    let p = SparsePmf::from_triplets(grid.ny(), grid.nx(), triplets);

    Ok(Location::from_persisted(
        grid,
        p,
        (centroid_raw[0], centroid_raw[1]),
        covariance,
    ))
}

#[cfg(test)]
mod tests {
    // Exercised by the `tests/round_trip.rs` integration test, which
    // actually touches the filesystem; this module holds only the row
    // layout the persisted format depends on.
    use super::*;

    #[test]
    fn row_layout_matches_field_widths_plus_trailing_pad() {
        // Two u32 (8 bytes), two f64 (16 bytes), one f32 (4 bytes), then
        // padded up to the struct's 8-byte alignment.
        assert_eq!(std::mem::size_of::<LocationRow>(), 32);
    }
}
