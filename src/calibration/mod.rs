//! Calibration curves (component C): fit RTT→(min, max)-distance models from
//! empirical training data, using one of four alternative algorithms.
//!
//! Dispatch is over a small closed set of variants (not an open trait
//! hierarchy), per the crate's design notes: a `Calibration` caller only ever
//! needs `distance_range` and `converged`, so a tagged enum plus one shared
//! trait covers every algorithm.

pub mod cbg;
pub mod cubic_fit;
pub mod curve;
pub mod octant;
pub mod physical;
pub mod spotter;

pub use cbg::Cbg;
pub use octant::{HullOrientation, QuasiOctant};
pub use physical::{Mode as PhysicalMode, PhysicalLimitsOnly};
pub use spotter::Spotter;

/// The capability every calibration algorithm provides.
pub trait CalibrationAlgo {
    /// Given RTTs in milliseconds, return `(min_dist_m, max_dist_m)`,
    /// clamped to `[0, DIST_LIMIT]`, using only the smallest RTT (least
    /// influenced by delays unrelated to distance).
    fn distance_range(&self, rtts: &[f64]) -> (f64, f64);

    /// Whether this calibration's internal optimizer (if any) converged.
    /// Calibrations that fail to converge remain queryable; they just fall
    /// back to a conservative curve.
    fn converged(&self) -> bool {
        true
    }
}

/// A calibration curve, dispatched over its concrete algorithm. Serializes
/// to an internally-tagged JSON object (`{"algorithm": "...", ...}`) so a
/// fitted calibration can be written by `ageo-cli calibrate` and read back
/// by `ageo-cli geolocate` without re-running the fit.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "algorithm")]
pub enum Calibration {
    PhysicalLimitsOnly(PhysicalLimitsOnly),
    Cbg(Box<Cbg>),
    QuasiOctant(QuasiOctant),
    Spotter(Spotter),
}

impl CalibrationAlgo for Calibration {
    fn distance_range(&self, rtts: &[f64]) -> (f64, f64) {
        match self {
            Calibration::PhysicalLimitsOnly(c) => c.distance_range(rtts),
            Calibration::Cbg(c) => c.distance_range(rtts),
            Calibration::QuasiOctant(c) => c.distance_range(rtts),
            Calibration::Spotter(c) => c.distance_range(rtts),
        }
    }

    fn converged(&self) -> bool {
        match self {
            Calibration::PhysicalLimitsOnly(c) => c.converged(),
            Calibration::Cbg(c) => c.converged(),
            Calibration::QuasiOctant(c) => c.converged(),
            Calibration::Spotter(c) => c.converged(),
        }
    }
}

impl From<PhysicalLimitsOnly> for Calibration {
    fn from(c: PhysicalLimitsOnly) -> Self {
        Calibration::PhysicalLimitsOnly(c)
    }
}

impl From<Cbg> for Calibration {
    fn from(c: Cbg) -> Self {
        Calibration::Cbg(Box::new(c))
    }
}

impl From<QuasiOctant> for Calibration {
    fn from(c: QuasiOctant) -> Self {
        Calibration::QuasiOctant(c)
    }
}

impl From<Spotter> for Calibration {
    fn from(c: Spotter) -> Self {
        Calibration::Spotter(c)
    }
}
