//! Baseline map (component F.1): the Bayesian prior over where a host can
//! plausibly be — land vs. ocean, populated vs. unpopulated — loaded
//! read-only from a file built by an external geodata pipeline.

use std::path::Path;

use hdf5::types::VarLenAscii;
use hdf5::H5Type;

use crate::error::{Error, Result};
use crate::grid::Grid;
use crate::location::Location;
use crate::sparse::SparsePmf;

fn bad_file(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::BadFile {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn read_scalar_attr<T: H5Type + Copy>(file: &hdf5::File, path: &Path, name: &str) -> Result<T> {
    file.attr(name)
        .and_then(|a| a.read_scalar::<T>())
        .map_err(|e| bad_file(path, e))
}

fn read_vec_attr(file: &hdf5::File, path: &Path, name: &str) -> Result<Vec<f64>> {
    file.attr(name)
        .and_then(|a| a.read_raw::<f64>())
        .map_err(|e| bad_file(path, e))
}

/// Load a baseline map from `path`: an `Nlat x Nlon` float32 matrix dataset
/// named `baseline`, plus attributes for every grid scalar and axis. The
/// matrix is normalized to sum 1 on load, regardless of what it summed to on
/// disk.
pub fn load_map(path: impl AsRef<Path>) -> Result<Location> {
    let path = path.as_ref();
    let file = hdf5::File::open(path).map_err(|e| bad_file(path, e))?;
    let dataset = file.dataset("baseline").map_err(|e| bad_file(path, e))?;

    let resolution: f64 = read_scalar_attr(&file, path, "resolution")?;
    let fuzz: f64 = read_scalar_attr(&file, path, "fuzz")?;
    let north: f64 = read_scalar_attr(&file, path, "north")?;
    let south: f64 = read_scalar_attr(&file, path, "south")?;
    let east: f64 = read_scalar_attr(&file, path, "east")?;
    let west: f64 = read_scalar_attr(&file, path, "west")?;
    let lon_spacing: f64 = read_scalar_attr(&file, path, "lon_spacing")?;
    let lat_spacing: f64 = read_scalar_attr(&file, path, "lat_spacing")?;
    let longitudes = read_vec_attr(&file, path, "longitudes")?;
    let latitudes = read_vec_attr(&file, path, "latitudes")?;

    let shape = dataset.shape();
    if shape.len() != 2 {
        return Err(bad_file(path, "baseline dataset is not 2-dimensional"));
    }
    let (nlat, nlon) = (shape[0], shape[1]);
    if nlat != latitudes.len() || nlon != longitudes.len() {
        return Err(bad_file(
            path,
            "baseline matrix shape is inconsistent with its longitude/latitude attributes",
        ));
    }

    let values: Vec<f32> = dataset.read_raw().map_err(|e| bad_file(path, e))?;

    let grid = Grid::from_parts(
        resolution,
        fuzz,
        north,
        south,
        east,
        west,
        lon_spacing,
        lat_spacing,
        longitudes,
        latitudes,
    );

    let triplets = values
        .into_iter()
        .enumerate()
        .filter(|&(_, v)| v != 0.0)
        .map(|(idx, v)| (idx / nlon, idx % nlon, v as f64));
    let mut baseline = SparsePmf::from_triplets(nlat, nlon, triplets);
    let sum = baseline.normalize_in_place();
    if sum == 0.0 {
        return Err(bad_file(path, "baseline matrix is entirely zero"));
    }

    Ok(Location::materialized(grid, baseline))
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

/// Write a baseline map file for `grid`/`pmf`, in the same layout
/// [`load_map`] reads: used by `ageo-cli build-map` to assemble a Map from
/// an already-gridded matrix, since ingesting raw raster/vector geodata is
/// out of scope for this crate.
pub fn save_map(grid: &Grid, pmf: &SparsePmf, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let (ny, nx) = pmf.shape();
    if ny != grid.ny() || nx != grid.nx() {
        return Err(Error::GridMismatch(
            "baseline matrix shape does not match the grid's axis lengths".to_string(),
        ));
    }

    let file = hdf5::File::create(path).map_err(|e| bad_file(path, e))?;
    file.new_attr::<VarLenAscii>()
        .create("TITLE")
        .and_then(|a| a.write_scalar(&VarLenAscii::from_ascii("baseline").unwrap()))
        .map_err(|e| bad_file(path, e))?;

    write_scalar_attr(&file, path, "resolution", grid.resolution_m)?;
    write_scalar_attr(&file, path, "fuzz", grid.fuzz_m)?;
    write_scalar_attr(&file, path, "north", grid.north)?;
    write_scalar_attr(&file, path, "south", grid.south)?;
    write_scalar_attr(&file, path, "east", grid.east)?;
    write_scalar_attr(&file, path, "west", grid.west)?;
    write_scalar_attr(&file, path, "lon_spacing", grid.lon_spacing_deg)?;
    write_scalar_attr(&file, path, "lat_spacing", grid.lat_spacing_deg)?;

    file.new_attr::<f64>()
        .shape(grid.longitudes.len())
        .create("longitudes")
        .and_then(|a| a.write_raw(&grid.longitudes))
        .map_err(|e| bad_file(path, e))?;
    file.new_attr::<f64>()
        .shape(grid.latitudes.len())
        .create("latitudes")
        .and_then(|a| a.write_raw(&grid.latitudes))
        .map_err(|e| bad_file(path, e))?;

    let mut dense = vec![0.0_f32; ny * nx];
    for (row, col, v) in pmf.triplets() {
        dense[row * nx + col] = v as f32;
    }
    file.new_dataset::<f32>()
        .shape((ny, nx))
        .create("baseline")
        .and_then(|ds| ds.write_raw(&dense))
        .map_err(|e| bad_file(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    // `load_map` is exercised by the `tests/` integration suite against a
    // fixture file; there is no in-process HDF5 file to construct here
    // without touching the filesystem from a unit test.
}
