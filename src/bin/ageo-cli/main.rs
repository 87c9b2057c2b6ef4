//! `ageo-cli` — the thin demonstration CLI around the `ageo` library: one
//! subcommand per pipeline stage (build a baseline map, carve regions out of
//! it, fit a calibration curve, geolocate a landmark's observations).

mod cli;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use serde::Deserialize;

use ageo::calibration::{Calibration, CalibrationAlgo, Cbg, HullOrientation, PhysicalLimitsOnly, PhysicalMode, QuasiOctant, Spotter};
use ageo::{grid::Grid, location, map, observation, region, sparse::SparsePmf, Error};

use cli::{Algorithm, Cli, Commands};

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("logger already initialized");

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<Error>() {
            return match e {
                Error::GridMismatch(_) => 2,
                Error::DegenerateGeometry(_) | Error::DegenerateCentroid(_) => 3,
                Error::BadFile { .. } | Error::BadObservation(_) | Error::CalibrationFailed(_) => 1,
            };
        }
    }
    1
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::BuildMap {
            raster,
            resolution_m,
            fuzz_m,
            west,
            south,
            east,
            north,
            out,
        } => build_map(&raster, resolution_m, fuzz_m, west, south, east, north, &out),
        Commands::CarveRegions {
            map,
            regions,
            fuzz_deg,
            out_dir,
        } => carve_regions(&map, &regions, fuzz_deg, &out_dir),
        Commands::Calibrate {
            algorithm,
            data,
            out,
        } => calibrate(algorithm, &data, &out),
        Commands::Geolocate {
            map,
            observations,
            out,
        } => geolocate(&map, &observations, &out),
    }
}

/// A `(lon, lat, weight)` row of an already-gridded raster dump.
#[derive(Debug, Deserialize)]
struct RasterRow {
    lon: f64,
    lat: f64,
    weight: f64,
}

#[allow(clippy::too_many_arguments)]
fn build_map(
    raster: &str,
    resolution_m: f64,
    fuzz_m: f64,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
    out: &str,
) -> Result<()> {
    let grid = Grid::new(resolution_m, fuzz_m, west, south, east, north);

    let mut reader =
        csv::Reader::from_path(raster).with_context(|| format!("reading raster CSV {raster}"))?;
    let mut triplets = Vec::new();
    for row in reader.deserialize() {
        let row: RasterRow = row.with_context(|| format!("parsing a row of {raster}"))?;
        if row.weight == 0.0 {
            continue;
        }
        let col = grid
            .longitudes
            .partition_point(|&x| x < row.lon)
            .min(grid.nx().saturating_sub(1));
        let rowi = grid
            .latitudes
            .partition_point(|&y| y < row.lat)
            .min(grid.ny().saturating_sub(1));
        triplets.push((rowi, col, row.weight));
    }

    let baseline = SparsePmf::from_triplets(grid.ny(), grid.nx(), triplets);
    map::save_map(&grid, &baseline, out).with_context(|| format!("writing baseline map {out}"))?;
    log::info!("wrote baseline map with {} nonzero cells to {out}", baseline.nnz());
    Ok(())
}

fn carve_regions(map_path: &str, regions_path: &str, fuzz_deg: f64, out_dir: &str) -> Result<()> {
    let baseline = map::load_map(map_path).with_context(|| format!("loading map {map_path}"))?;

    let text = std::fs::read_to_string(regions_path)
        .with_context(|| format!("reading region collection {regions_path}"))?;
    let collection: geojson::GeoJson = text
        .parse()
        .with_context(|| format!("parsing GeoJSON in {regions_path}"))?;
    let features = match collection {
        geojson::GeoJson::FeatureCollection(fc) => fc.features,
        geojson::GeoJson::Feature(f) => vec![f],
        geojson::GeoJson::Geometry(g) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {out_dir}"))?;

    for (idx, feature) in features.iter().enumerate() {
        let name = feature
            .properties
            .as_ref()
            .and_then(|props| props.get("name"))
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("region_{idx}"));

        let geometry = feature
            .geometry
            .clone()
            .ok_or_else(|| anyhow::anyhow!("feature '{name}' has no geometry"))?;
        let polygon = largest_polygon(geometry)
            .with_context(|| format!("feature '{name}' has no polygonal geometry"))?;

        let carved = region::carve_region(&baseline, &polygon, fuzz_deg)
            .with_context(|| format!("carving region '{name}'"))?;
        let out_path = Path::new(out_dir).join(format!("{name}.h5"));
        location::persist::save(&carved, &out_path)
            .with_context(|| format!("writing carved region to {}", out_path.display()))?;
        log::info!("carved region '{name}' -> {}", out_path.display());
    }
    Ok(())
}

fn largest_polygon(geometry: geojson::Geometry) -> Result<geo_types::Polygon<f64>> {
    use geo::Area;
    let geom: geo_types::Geometry<f64> = geometry
        .try_into()
        .context("converting GeoJSON geometry to a polygon")?;
    match geom {
        geo_types::Geometry::Polygon(p) => Ok(p),
        geo_types::Geometry::MultiPolygon(mp) => mp
            .0
            .into_iter()
            .max_by(|a, b| a.unsigned_area().partial_cmp(&b.unsigned_area()).unwrap())
            .ok_or_else(|| anyhow::anyhow!("empty MultiPolygon")),
        other => Err(anyhow::anyhow!("expected a Polygon or MultiPolygon, got {other:?}")),
    }
}

fn calibrate(algorithm: Algorithm, data: &str, out: &str) -> Result<()> {
    let mut reader =
        csv::Reader::from_path(data).with_context(|| format!("reading calibration CSV {data}"))?;
    let mut observations = Vec::new();
    for row in reader.deserialize() {
        let (distance_m, rtt_ms): (f64, f64) =
            row.with_context(|| format!("parsing a row of {data}"))?;
        observations.push((distance_m, rtt_ms));
    }

    let calibration: Calibration = match algorithm {
        Algorithm::Physical => PhysicalLimitsOnly::new(PhysicalMode::Physical).into(),
        Algorithm::Empirical => PhysicalLimitsOnly::new(PhysicalMode::Empirical).into(),
        Algorithm::Cbg => Cbg::fit(&observations)
            .context("fitting CBG bestline calibration")?
            .into(),
        Algorithm::Octant => QuasiOctant::fit(&observations, HullOrientation::UpperIsMax)
            .context("fitting Quasi-Octant calibration")?
            .into(),
        Algorithm::Spotter => Spotter::fit(&observations)
            .context("fitting Spotter calibration")?
            .into(),
    };
    if !calibration.converged() {
        log::warn!("calibration optimizer did not converge; falling back to a conservative curve");
    }

    let file = File::create(out).with_context(|| format!("creating {out}"))?;
    serde_json::to_writer_pretty(file, &calibration)
        .with_context(|| format!("writing calibration to {out}"))?;
    log::info!("wrote calibration to {out}");
    Ok(())
}

/// One landmark's RTT observations against a named calibration file,
/// matching the shape of `--observation` inputs to `geolocate`.
#[derive(Debug, Deserialize)]
struct ObservationFile {
    ref_lon: f64,
    ref_lat: f64,
    calibration_file: String,
    rtts: Vec<f64>,
}

fn geolocate(map_path: &str, observation_paths: &[String], out: &str) -> Result<()> {
    let baseline = map::load_map(map_path).with_context(|| format!("loading map {map_path}"))?;

    let locations: Vec<_> = observation_paths
        .par_iter()
        .map(|path| load_observation_location(&baseline, path))
        .collect::<Result<Vec<_>>>()?;

    let mut result = baseline;
    for loc in &locations {
        result = result.intersection(loc).context("intersecting observation into the map")?;
    }

    location::persist::save(&result, out).with_context(|| format!("writing result to {out}"))?;
    log::info!("wrote geolocation result to {out}");
    Ok(())
}

fn load_observation_location(
    baseline: &location::Location,
    path: &str,
) -> Result<location::Location> {
    let file = File::open(path).with_context(|| format!("opening observation file {path}"))?;
    let obs: ObservationFile = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing observation file {path}"))?;

    let cal_file = File::open(&obs.calibration_file)
        .with_context(|| format!("opening calibration file {}", obs.calibration_file))?;
    let calibration: Calibration = serde_json::from_reader(BufReader::new(cal_file))
        .with_context(|| format!("parsing calibration file {}", obs.calibration_file))?;

    observation::observe(baseline, obs.ref_lon, obs.ref_lat, &calibration, &obs.rtts)
        .with_context(|| format!("building observation from {path}"))
}
