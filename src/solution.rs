//! Solver output shared by every strategy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{DEPOT, ProblemInstance};

/// One vehicle's visiting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRoute {
    pub vehicle: usize,
    /// Stop indices, starting at the depot.
    pub stops: Vec<usize>,
    /// Arrival time (seconds since midnight) at each entry of `stops`.
    pub arrivals: Vec<i32>,
}

impl VehicleRoute {
    /// Stops other than the depot, in visiting order.
    pub fn visits(&self) -> impl Iterator<Item = usize> + '_ {
        self.stops.iter().copied().filter(|&stop| stop != DEPOT)
    }

    pub fn is_idle(&self) -> bool {
        self.visits().next().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Solution {
    pub routes: Vec<VehicleRoute>,
    /// Meters along the reported legs.
    pub total_distance: i64,
    /// Travel seconds along the reported legs (service time excluded).
    pub total_duration: i64,
    /// Objective value as the producing strategy defines it.
    pub objective: i64,
}

impl Solution {
    /// The "nothing found" sentinel: no routes, zero totals.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a solution from depot-first stop sequences.
    ///
    /// Arrivals follow the earliest feasible schedule: leave the depot at
    /// shift start, wait at a stop when arriving before its window opens.
    pub fn from_sequences(
        problem: &ProblemInstance,
        sequences: Vec<Vec<usize>>,
        objective: i64,
    ) -> Self {
        let mut total_distance = 0;
        let mut total_duration = 0;

        let routes = sequences
            .into_iter()
            .enumerate()
            .map(|(vehicle, stops)| {
                for leg in stops.windows(2) {
                    total_distance += i64::from(problem.distance(leg[0], leg[1]));
                    total_duration += i64::from(problem.duration(leg[0], leg[1]));
                }
                let arrivals = earliest_arrivals(problem, &stops);
                VehicleRoute {
                    vehicle,
                    stops,
                    arrivals,
                }
            })
            .collect();

        Self {
            routes,
            total_distance,
            total_duration,
            objective,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every non-depot stop visited, in route order.
    pub fn visited(&self) -> impl Iterator<Item = usize> + '_ {
        self.routes.iter().flat_map(VehicleRoute::visits)
    }

    /// Non-depot stops of `problem` that no route visits.
    pub fn missing_stops(&self, problem: &ProblemInstance) -> Vec<usize> {
        let mut seen = vec![false; problem.len()];
        for stop in self.visited() {
            if let Some(flag) = seen.get_mut(stop) {
                *flag = true;
            }
        }
        problem.customers().filter(|&stop| !seen[stop]).collect()
    }

    /// Whether every non-depot stop is visited exactly once.
    pub fn covers_exactly_once(&self, problem: &ProblemInstance) -> bool {
        let mut counts = vec![0usize; problem.len()];
        for stop in self.visited() {
            match counts.get_mut(stop) {
                Some(count) => *count += 1,
                None => return false,
            }
        }
        problem.customers().all(|stop| counts[stop] == 1)
    }
}

/// Earliest arrival at each entry of a depot-first sequence.
pub fn earliest_arrivals(problem: &ProblemInstance, stops: &[usize]) -> Vec<i32> {
    let mut arrivals = Vec::with_capacity(stops.len());
    let mut time = problem.shift().start;
    let mut previous: Option<usize> = None;

    for &stop in stops {
        if let Some(from) = previous {
            time += problem.arc_cost(from, stop);
            if stop != DEPOT {
                time = time.max(problem.window(stop).start);
            }
        }
        arrivals.push(time);
        previous = Some(stop);
    }
    arrivals
}

/// Result of running a routing strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    /// A plan that satisfies every hard constraint of the strategy.
    Solved(Solution),
    /// No feasible plan was found within the budget.
    Infeasible,
    /// The budget ran out or constraints were relaxed; the plan is usable
    /// but not proven optimal, or carries penalized violations.
    Exhausted(Solution),
}

impl SolverOutcome {
    pub fn solution(&self) -> Option<&Solution> {
        match self {
            SolverOutcome::Solved(solution) | SolverOutcome::Exhausted(solution) => Some(solution),
            SolverOutcome::Infeasible => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, SolverOutcome::Solved(_))
    }

    /// The solution, or the empty sentinel when none was found.
    pub fn into_solution_or_empty(self) -> Solution {
        match self {
            SolverOutcome::Solved(solution) | SolverOutcome::Exhausted(solution) => solution,
            SolverOutcome::Infeasible => Solution::empty(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SolverOutcome::Solved(_) => "solved",
            SolverOutcome::Infeasible => "infeasible",
            SolverOutcome::Exhausted(_) => "exhausted",
        }
    }
}

/// Flat per-run record kept for historical comparison of strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub algorithm: String,
    /// Service date, `YYYY-MM-DD`.
    pub date: String,
    pub distance_km: f64,
    pub time_min: f64,
    pub compute_seconds: f64,
    pub stop_count: usize,
}

impl RunMetrics {
    pub fn new(
        algorithm: impl Into<String>,
        date: impl Into<String>,
        solution: &Solution,
        elapsed: Duration,
        stop_count: usize,
    ) -> Self {
        Self {
            algorithm: algorithm.into(),
            date: date.into(),
            distance_km: solution.total_distance as f64 / 1000.0,
            time_min: solution.total_duration as f64 / 60.0,
            compute_seconds: elapsed.as_secs_f64(),
            stop_count,
        }
    }
}
