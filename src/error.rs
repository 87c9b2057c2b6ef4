//! Error kinds for the active geolocation engine.
//!
//! `CalibrationFailed` is recoverable: a `Calibration` value that failed to
//! converge stays queryable and reports its failure through
//! [`Calibration::converged`](crate::calibration::Calibration::converged); it
//! is never itself the cause of an `Err` return. Every other variant is
//! surfaced to the caller with enough context to diagnose the offending
//! input.

use thiserror::Error;

/// Errors produced by the geolocation engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Two [`Location`](crate::location::Location)s were combined whose eight
    /// grid scalars are not identical.
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    /// Calibration was fed an ill-formed (distance, RTT) matrix: wrong shape,
    /// every row infeasible, or too few unique distances to fit a curve.
    #[error("bad observation data: {0}")]
    BadObservation(String),

    /// A baseline map or location file lacked a required attribute, or its
    /// matrix shape was inconsistent with its longitude/latitude vectors.
    #[error("bad file {path}: {reason}")]
    BadFile { path: String, reason: String },

    /// A calibration curve's optimizer did not converge. Carried as an error
    /// variant only for contexts that choose to treat this as fatal (e.g. the
    /// CLI's `calibrate` subcommand with no fallback requested); library
    /// callers should instead consult `Calibration::converged`.
    #[error("calibration failed to converge: {0}")]
    CalibrationFailed(String),

    /// A bounds polygon failed to validate after antimeridian repair, or an
    /// observation polygon neither contains the reference point nor inverts
    /// to a polygon that does.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The weighted geocentric sum used to compute a centroid inverted to a
    /// non-finite longitude/latitude.
    #[error("degenerate centroid: {0}")]
    DegenerateCentroid(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
