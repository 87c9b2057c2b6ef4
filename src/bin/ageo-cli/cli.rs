use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ageo-cli",
    about = "Drive the active geolocation engine: assemble baseline maps, carve regions, fit calibration curves, and geolocate landmarks",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble a baseline map file from an already-gridded float matrix
    /// (raster ingestion itself is out of scope; this wraps an existing
    /// grid for testing the rest of the pipeline)
    BuildMap {
        /// CSV of (lon, lat, weight) rows describing the baseline matrix
        #[arg(long)]
        raster: String,
        #[arg(long = "resolution-m")]
        resolution_m: f64,
        #[arg(long = "fuzz-m")]
        fuzz_m: f64,
        #[arg(long)]
        west: f64,
        #[arg(long)]
        south: f64,
        #[arg(long)]
        east: f64,
        #[arg(long)]
        north: f64,
        #[arg(long)]
        out: String,
    },

    /// Carve one Location file per feature in a GeoJSON region collection
    CarveRegions {
        #[arg(long)]
        map: String,
        #[arg(long)]
        regions: String,
        #[arg(long = "fuzz-deg")]
        fuzz_deg: f64,
        #[arg(long = "out-dir")]
        out_dir: String,
    },

    /// Fit a calibration curve from an (distance_m, rtt_ms) CSV
    Calibrate {
        #[arg(long, value_enum)]
        algorithm: Algorithm,
        #[arg(long)]
        data: String,
        #[arg(long)]
        out: String,
    },

    /// Intersect a baseline map against one or more landmark observations
    /// and write the resulting Location
    Geolocate {
        #[arg(long)]
        map: String,
        /// Path to a JSON observation file; may be repeated, one per landmark
        #[arg(long = "observation")]
        observations: Vec<String>,
        #[arg(long)]
        out: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum Algorithm {
    Physical,
    Empirical,
    Cbg,
    Octant,
    Spotter,
}
