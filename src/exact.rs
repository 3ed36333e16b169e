//! Exact single-vehicle solver.
//!
//! Selects one incoming and one outgoing arc per stop so that the selected
//! arcs form a single tour through the depot, every arrival lies inside its
//! window, and the summed travel duration of the selected arcs is minimal.
//! Arrival times propagate along selected arcs only:
//! `t[j] >= t[i] + service(i) + duration(i, j)`. The return arc into the
//! depot carries no time constraint.
//!
//! The search is a depth-first branch and bound that proves optimality when
//! it finishes inside the budget. Capacity is not modelled.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::SolveError;
use crate::model::{DEPOT, ProblemInstance, SECONDS_PER_DAY};
use crate::solution::{Solution, SolverOutcome};
use crate::traits::RouteSolver;

/// How many search nodes to expand between clock checks.
const CLOCK_INTERVAL: u64 = 1024;

#[derive(Debug, Clone)]
pub struct ExactOptions {
    pub time_limit: Duration,
}

impl Default for ExactOptions {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExactSolver {
    options: ExactOptions,
}

impl ExactSolver {
    pub fn new(options: ExactOptions) -> Self {
        Self { options }
    }

    pub fn with_time_limit(time_limit: Duration) -> Self {
        Self::new(ExactOptions { time_limit })
    }
}

impl RouteSolver for ExactSolver {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn solve(&self, problem: &ProblemInstance) -> Result<SolverOutcome, SolveError> {
        if problem.vehicle_count() > 1 {
            warn!(
                vehicles = problem.vehicle_count(),
                "exact solver plans a single tour, extra vehicles are ignored"
            );
        }
        if problem.len() == 1 {
            return Ok(SolverOutcome::Solved(Solution::from_sequences(
                problem,
                vec![vec![DEPOT]],
                0,
            )));
        }

        let started = Instant::now();
        let mut search = TourSearch::new(problem, started + self.options.time_limit);
        search.run();

        info!(
            nodes = search.expanded,
            timed_out = search.timed_out,
            cost = search.best_cost,
            elapsed = ?started.elapsed(),
            "exact search finished"
        );

        let Some(successors) = search.best_successors else {
            return Ok(SolverOutcome::Infeasible);
        };
        let tour = reconstruct_tour(&successors, problem.len())?;
        let solution = Solution::from_sequences(problem, vec![tour], search.best_cost);

        Ok(if search.timed_out {
            SolverOutcome::Exhausted(solution)
        } else {
            SolverOutcome::Solved(solution)
        })
    }
}

/// Follow selected arcs from the depot back to the depot.
///
/// `successors[i]` is the stop reached by the arc leaving `i`. Fails when an
/// arc is missing, the walk closes early, or the tour misses stops.
pub fn reconstruct_tour(
    successors: &[Option<usize>],
    stop_count: usize,
) -> Result<Vec<usize>, SolveError> {
    if successors.len() != stop_count {
        return Err(SolveError::BrokenTour(format!(
            "{} arc selections for {} stops",
            successors.len(),
            stop_count
        )));
    }

    let mut tour = vec![DEPOT];
    let mut seen = vec![false; stop_count];
    seen[DEPOT] = true;
    let mut current = DEPOT;

    loop {
        let Some(next) = successors.get(current).copied().flatten() else {
            return Err(SolveError::BrokenTour(format!("stop {current} has no outgoing arc")));
        };
        tour.push(next);
        if next == DEPOT {
            break;
        }
        match seen.get_mut(next) {
            Some(flag) if !*flag => *flag = true,
            Some(_) => return Err(SolveError::BrokenTour(format!("stop {next} is entered twice"))),
            None => return Err(SolveError::BrokenTour(format!("arc to unknown stop {next}"))),
        }
        current = next;
    }

    let visited = tour.len() - 1;
    if visited != stop_count {
        return Err(SolveError::BrokenTour(format!(
            "tour closes after {visited} of {stop_count} stops"
        )));
    }
    Ok(tour)
}

struct TourSearch<'a> {
    problem: &'a ProblemInstance,
    deadline: Instant,
    /// Cheapest arc into each stop, for the lower bound.
    min_in: Vec<i64>,
    path: Vec<usize>,
    visited: Vec<bool>,
    expanded: u64,
    timed_out: bool,
    best_cost: i64,
    best_successors: Option<Vec<Option<usize>>>,
}

impl<'a> TourSearch<'a> {
    fn new(problem: &'a ProblemInstance, deadline: Instant) -> Self {
        let n = problem.len();
        let min_in = (0..n)
            .map(|to| {
                (0..n)
                    .filter(|&from| from != to)
                    .map(|from| i64::from(problem.duration(from, to)))
                    .min()
                    .unwrap_or(0)
            })
            .collect();

        let mut visited = vec![false; n];
        visited[DEPOT] = true;

        Self {
            problem,
            deadline,
            min_in,
            path: vec![DEPOT],
            visited,
            expanded: 0,
            timed_out: false,
            best_cost: i64::MAX,
            best_successors: None,
        }
    }

    fn run(&mut self) {
        let bound: i64 = self.min_in.iter().sum();
        let remaining = self.problem.len() - 1;
        self.branch(DEPOT, self.problem.shift().start, 0, bound, remaining);
    }

    /// `bound` is the sum of cheapest incoming arcs over the stops still to
    /// enter, including the final return to the depot.
    fn branch(&mut self, current: usize, time: i32, cost: i64, bound: i64, remaining: usize) {
        self.expanded += 1;
        if self.expanded % CLOCK_INTERVAL == 0 && Instant::now() >= self.deadline {
            self.timed_out = true;
        }
        if self.timed_out {
            return;
        }

        if remaining == 0 {
            let total = cost + i64::from(self.problem.duration(current, DEPOT));
            if total < self.best_cost {
                debug!(cost = total, "improved tour");
                self.best_cost = total;
                self.best_successors = Some(self.successors());
            }
            return;
        }

        if cost + bound >= self.best_cost {
            return;
        }

        let departure = time + self.problem.service_at(current);
        let n = self.problem.len();
        let dead_end = (0..n).any(|stop| {
            let latest = i64::from(self.problem.window(stop).end);
            !self.visited[stop] && i64::from(departure) + self.min_in[stop] > latest
        });
        if dead_end {
            return;
        }

        let mut candidates: Vec<usize> = (0..n).filter(|&stop| !self.visited[stop]).collect();
        candidates.sort_by_key(|&stop| (self.problem.duration(current, stop), stop));

        for next in candidates {
            let window = self.problem.window(next);
            let arrival = (departure + self.problem.duration(current, next)).max(window.start);
            if arrival > window.end || arrival > SECONDS_PER_DAY {
                continue;
            }

            self.visited[next] = true;
            self.path.push(next);
            self.branch(
                next,
                arrival,
                cost + i64::from(self.problem.duration(current, next)),
                bound - self.min_in[next],
                remaining - 1,
            );
            self.path.pop();
            self.visited[next] = false;

            if self.timed_out {
                return;
            }
        }
    }

    fn successors(&self) -> Vec<Option<usize>> {
        let mut successors = vec![None; self.problem.len()];
        for pair in self.path.windows(2) {
            successors[pair[0]] = Some(pair[1]);
        }
        if let Some(&last) = self.path.last() {
            successors[last] = Some(DEPOT);
        }
        successors
    }
}
