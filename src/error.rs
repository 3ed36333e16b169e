//! Error types and the recoverable-default wrapper.
//!
//! Malformed input data (a bad `HH:MM` string, an unreachable distance
//! provider) never aborts a run: it is replaced by a permissive default and
//! reported as a [`DataWarning`]. Structural problems with a problem instance
//! are fatal and surface as [`ModelError`].

use thiserror::Error;

/// A value that was either read cleanly or replaced by a permissive default.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered<T> {
    Clean(T),
    Defaulted { value: T, warning: DataWarning },
}

impl<T> Recovered<T> {
    pub fn value(&self) -> &T {
        match self {
            Recovered::Clean(value) | Recovered::Defaulted { value, .. } => value,
        }
    }

    pub fn warning(&self) -> Option<&DataWarning> {
        match self {
            Recovered::Clean(_) => None,
            Recovered::Defaulted { warning, .. } => Some(warning),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Recovered::Defaulted { .. })
    }

    /// Split into the value and the warning (if a default was used).
    pub fn into_parts(self) -> (T, Option<DataWarning>) {
        match self {
            Recovered::Clean(value) => (value, None),
            Recovered::Defaulted { value, warning } => (value, Some(warning)),
        }
    }
}

/// Data-quality issue recovered by substituting a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataWarning {
    #[error(
        "stop {stop_id}: time window {start:?}-{end:?} could not be parsed, using the full shift"
    )]
    UnparseableWindow {
        stop_id: String,
        start: Option<String>,
        end: Option<String>,
    },
    #[error("stop {stop_id}: time window has no valid bounds, using the full shift")]
    MissingWindow { stop_id: String },
    #[error("stop {stop_id}: time window lies outside the shift, using the full shift")]
    WindowOutsideShift { stop_id: String },
    #[error("distance provider unavailable ({reason}), using great-circle estimates")]
    ProviderFallback { reason: String },
}

/// Fatal problems with a problem instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("no stops were provided")]
    NoStops,
    #[error("no depot stop found")]
    MissingDepot,
    #[error("found {0} depot stops, exactly one is required")]
    MultipleDepots(usize),
    #[error("stop {0} has no coordinates")]
    MissingCoordinate(String),
    #[error("{name} matrix must be {expected}x{expected}")]
    MatrixShape { name: &'static str, expected: usize },
    #[error("{name} matrix cell ({from}, {to}) is negative")]
    NegativeCell {
        name: &'static str,
        from: usize,
        to: usize,
    },
    #[error("{name} matrix diagonal at {index} is not zero")]
    NonZeroDiagonal { name: &'static str, index: usize },
    #[error("expected {expected} {name} entries, got {actual}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("stop at index {index} has an inverted time window {start}-{end}")]
    InvertedWindow { index: usize, start: i32, end: i32 },
    #[error("stop at index {index} has a time window outside the shift")]
    WindowOutsideShift { index: usize },
    #[error("shift {start}-{end} is not a valid interval within the day")]
    InvalidShift { start: i32, end: i32 },
    #[error("at least one vehicle is required")]
    NoVehicles,
}

/// Fatal problems raised while a solver runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("selected arcs do not form a single tour: {0}")]
    BrokenTour(String),
}

/// Errors from the end-to-end planning pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// Failures talking to the external distance-matrix service.
///
/// These never leave the provider: they trigger the great-circle fallback.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(String),
    #[error("provider response has {rows}x{cols} cells, expected {expected_rows}x{expected_cols}")]
    Shape {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
}
