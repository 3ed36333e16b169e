//! laundry-route-planner
//!
//! Plans pickup and delivery routes out of a single laundry depot. Stops
//! carry soft time windows, a service duration and an optional demand;
//! travel matrices come from an injected distance provider with a
//! great-circle fallback. Three interchangeable strategies share one
//! outcome type: guided local search, exact branch and bound, and
//! destroy-and-repair search.

pub mod builder;
pub mod cluster;
pub mod error;
pub mod exact;
pub mod haversine;
pub mod lns;
pub mod model;
pub mod planner;
pub mod provider;
pub mod solution;
pub mod solver;
pub mod traits;

pub use builder::{ProblemBuild, ProblemBuilder};
pub use cluster::{ClusterResult, cluster_stops};
pub use error::{DataWarning, ModelError, PlanError, Recovered, SolveError};
pub use model::{ProblemInstance, RoutingConfig, Stop, StopRecord, StopRole, TimeWindow};
pub use planner::{PlanReport, Planner, Strategy};
pub use solution::{RunMetrics, Solution, SolverOutcome};
pub use traits::{DistanceMatrixProvider, MatrixSource, RouteSolver, TravelMatrices};
