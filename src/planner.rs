//! End-to-end planning run: ingest, cluster, build, solve, report.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::builder::ProblemBuilder;
use crate::cluster::{ClusterResult, cluster_stops};
use crate::error::{DataWarning, ModelError, PlanError};
use crate::exact::ExactSolver;
use crate::lns::LnsSolver;
use crate::model::{ProblemInstance, RoutingConfig, Stop, StopRecord, StopRole};
use crate::solution::{RunMetrics, SolverOutcome};
use crate::solver::GuidedSolver;
use crate::traits::{DistanceMatrixProvider, MatrixSource, RouteSolver};

/// Which routing strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Cheapest insertion plus guided local search.
    #[default]
    Guided,
    /// Single-vehicle branch and bound.
    Exact,
    /// Destroy-and-repair search with forced coverage.
    Lns,
}

impl Strategy {
    /// A solver for this strategy with default options.
    pub fn solver(self) -> Box<dyn RouteSolver> {
        match self {
            Strategy::Guided => Box::new(GuidedSolver::default()),
            Strategy::Exact => Box::new(ExactSolver::default()),
            Strategy::Lns => Box::new(LnsSolver::default()),
        }
    }
}

/// Everything a caller needs to present one run.
#[derive(Debug, Clone)]
pub struct PlanReport {
    /// The instance that was solved; route indices point into its stops.
    pub problem: ProblemInstance,
    pub outcome: SolverOutcome,
    pub warnings: Vec<DataWarning>,
    pub source: MatrixSource,
    /// Present when the run clustered its stops.
    pub clusters: Option<ClusterResult>,
    /// Present when the run produced a plan.
    pub metrics: Option<RunMetrics>,
}

impl PlanReport {
    /// Stop ids of each vehicle's route, in visiting order.
    pub fn route_ids(&self) -> Vec<Vec<&str>> {
        let Some(solution) = self.outcome.solution() else {
            return Vec::new();
        };
        solution
            .routes
            .iter()
            .map(|route| {
                route
                    .stops
                    .iter()
                    .map(|&index| self.problem.stop(index).id.as_str())
                    .collect()
            })
            .collect()
    }
}

pub struct Planner {
    builder: ProblemBuilder,
    solver: Box<dyn RouteSolver>,
    cluster_radius: Option<f64>,
    date: String,
}

impl Planner {
    pub fn new(config: RoutingConfig, strategy: Strategy) -> Self {
        Self {
            builder: ProblemBuilder::new(config),
            solver: strategy.solver(),
            cluster_radius: None,
            date: String::new(),
        }
    }

    /// Use a custom-configured solver instead of the strategy default.
    pub fn with_solver(mut self, solver: Box<dyn RouteSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Merge customer stops closer than `radius_meters` before solving.
    pub fn with_cluster_radius(mut self, radius_meters: f64) -> Self {
        self.cluster_radius = Some(radius_meters);
        self
    }

    /// Service date recorded in the run metrics.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    pub fn config(&self) -> &RoutingConfig {
        self.builder.config()
    }

    pub fn plan<P>(&self, stops: &[Stop], provider: &P) -> Result<PlanReport, PlanError>
    where
        P: DistanceMatrixProvider + ?Sized,
    {
        let started = Instant::now();

        let clusters = self.cluster_radius.map(|radius| cluster_stops(stops, radius));
        let input = clusters.as_ref().map_or(stops, |result| result.stops.as_slice());

        let build = self.builder.build(input, provider)?;
        for warning in &build.warnings {
            warn!(%warning, "data quality");
        }

        let outcome = self.solver.solve(&build.problem)?;
        let elapsed = started.elapsed();

        let metrics = outcome.solution().map(|solution| {
            RunMetrics::new(
                self.solver.name(),
                self.date.clone(),
                solution,
                elapsed,
                build.problem.len() - 1,
            )
        });

        info!(
            strategy = self.solver.name(),
            outcome = outcome.label(),
            stops = build.problem.len(),
            clustered = clusters.is_some(),
            ?elapsed,
            "plan finished"
        );

        Ok(PlanReport {
            problem: build.problem,
            outcome,
            warnings: build.warnings,
            source: build.source,
            clusters,
            metrics,
        })
    }

    /// Plan straight from ingested records, keeping their warnings.
    pub fn plan_records<P>(
        &self,
        records: Vec<(StopRole, StopRecord)>,
        provider: &P,
    ) -> Result<PlanReport, PlanError>
    where
        P: DistanceMatrixProvider + ?Sized,
    {
        let (stops, mut warnings) = stops_from_records(records)?;
        let mut report = self.plan(&stops, provider)?;
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        Ok(report)
    }
}

/// Convert raw records into stops, collecting window warnings.
pub fn stops_from_records(
    records: Vec<(StopRole, StopRecord)>,
) -> Result<(Vec<Stop>, Vec<DataWarning>), ModelError> {
    let mut stops = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();
    for (index, (role, record)) in records.into_iter().enumerate() {
        let (stop, warning) = record.into_stop(index, role)?;
        if let Some(warning) = warning {
            warnings.push(warning);
        }
        stops.push(stop);
    }
    Ok((stops, warnings))
}
