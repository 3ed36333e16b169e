//! Core seams of the route planner.
//!
//! External collaborators (travel-time services) and routing strategies are
//! injected through these traits, so callers own their lifecycle.

use crate::error::SolveError;
use crate::model::ProblemInstance;
use crate::solution::SolverOutcome;

/// Where a pair of travel matrices came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixSource {
    /// The external travel-time service answered every batch.
    Provider,
    /// Great-circle estimate. `reason` is `None` when no provider was
    /// configured at all.
    Fallback { reason: Option<String> },
}

/// Pairwise distances (meters) and durations (seconds) for a set of
/// locations, indexed by the order the locations were given in.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelMatrices {
    pub distances: Vec<Vec<i32>>,
    pub durations: Vec<Vec<i32>>,
    pub source: MatrixSource,
}

impl TravelMatrices {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
}

/// Provides distance and duration matrices for a set of locations.
///
/// Implementations must not fail: when the underlying service is
/// unavailable they return same-shaped fallback matrices and say so in
/// [`TravelMatrices::source`].
pub trait DistanceMatrixProvider {
    fn matrices_for(&self, locations: &[(f64, f64)]) -> TravelMatrices;
}

/// A routing strategy. All strategies return the same outcome shape so
/// callers can swap them freely.
pub trait RouteSolver {
    /// Short strategy name, used in logs and run metrics.
    fn name(&self) -> &'static str;

    fn solve(&self, problem: &ProblemInstance) -> Result<SolverOutcome, SolveError>;
}
