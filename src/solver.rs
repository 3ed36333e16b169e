//! Routing solver: parallel cheapest insertion followed by guided local
//! search under a wall-clock budget.
//!
//! Arc cost is travel time plus service time at the stop being left. Time
//! windows, the one-day horizon and (when any stop has demand) vehicle
//! capacities are hard constraints; a move is only applied when every
//! route it touches stays feasible.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::SolveError;
use crate::model::{DEPOT, ProblemInstance, SECONDS_PER_DAY};
use crate::solution::{Solution, SolverOutcome};
use crate::traits::RouteSolver;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Wall-clock budget for the whole solve.
    pub time_limit: Duration,
    /// Maximum number of guided local search rounds.
    pub max_iterations: usize,
    /// Scales the arc penalty weight relative to the first local optimum.
    pub lambda_coefficient: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(60),
            max_iterations: 10_000,
            lambda_coefficient: 0.1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuidedSolver {
    options: SearchOptions,
}

impl GuidedSolver {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }

    pub fn with_time_limit(time_limit: Duration) -> Self {
        Self::new(SearchOptions {
            time_limit,
            ..SearchOptions::default()
        })
    }

    /// Solve `problem`, or `None` when no feasible plan exists within the
    /// budget.
    pub fn optimize(&self, problem: &ProblemInstance) -> Option<Solution> {
        let started = Instant::now();
        let deadline = started + self.options.time_limit;
        let mut search = Search::new(problem);

        let Some(mut current) = search.construct() else {
            info!(elapsed = ?started.elapsed(), "no feasible first solution");
            return None;
        };

        let mut best = current.clone();
        let mut best_cost = search.total_cost(&best);
        debug!(cost = best_cost, "first solution by cheapest insertion");

        let mut iterations = 0;
        while iterations < self.options.max_iterations && Instant::now() < deadline {
            iterations += 1;
            search.local_search(&mut current, deadline);

            let cost = search.total_cost(&current);
            if cost < best_cost {
                best_cost = cost;
                best = current.clone();
            }

            if search.lambda == 0 {
                let arcs = arc_count(&current);
                search.lambda = penalty_weight(self.options.lambda_coefficient, cost, arcs);
            }
            if !search.penalize(&current) {
                break;
            }
        }

        info!(
            cost = best_cost,
            iterations,
            elapsed = ?started.elapsed(),
            "guided local search finished"
        );

        let sequences: Vec<Vec<usize>> = best
            .into_iter()
            .map(|route| std::iter::once(DEPOT).chain(route).collect())
            .collect();
        Some(Solution::from_sequences(problem, sequences, best_cost))
    }
}

impl RouteSolver for GuidedSolver {
    fn name(&self) -> &'static str {
        "guided"
    }

    fn solve(&self, problem: &ProblemInstance) -> Result<SolverOutcome, SolveError> {
        Ok(match self.optimize(problem) {
            Some(solution) => SolverOutcome::Solved(solution),
            None => SolverOutcome::Infeasible,
        })
    }
}

/// Penalty weight from the cost of the first local optimum.
fn penalty_weight(coefficient: f64, cost: i64, arcs: usize) -> i64 {
    if arcs == 0 {
        return 1;
    }
    ((coefficient * cost as f64 / arcs as f64).round() as i64).max(1)
}

fn arc_count(routes: &[Vec<usize>]) -> usize {
    routes
        .iter()
        .filter(|route| !route.is_empty())
        .map(|route| route.len() + 1)
        .sum()
}

/// Arcs of a closed route: depot, visits, back to depot.
fn legs(route: &[usize]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let first = route.first().map(|&stop| (DEPOT, stop));
    let last = route.last().map(|&stop| (stop, DEPOT));
    first
        .into_iter()
        .chain(route.windows(2).map(|pair| (pair[0], pair[1])))
        .chain(last)
}

struct Search<'a> {
    problem: &'a ProblemInstance,
    capacity_bound: bool,
    penalties: Vec<Vec<u32>>,
    lambda: i64,
}

impl<'a> Search<'a> {
    fn new(problem: &'a ProblemInstance) -> Self {
        Self {
            problem,
            capacity_bound: problem.has_demand(),
            penalties: vec![vec![0; problem.len()]; problem.len()],
            lambda: 0,
        }
    }

    fn arc(&self, from: usize, to: usize) -> i64 {
        i64::from(self.problem.arc_cost(from, to))
    }

    fn augmented_arc(&self, from: usize, to: usize) -> i64 {
        self.arc(from, to) + self.lambda * i64::from(self.penalties[from][to])
    }

    fn route_cost(&self, route: &[usize]) -> i64 {
        legs(route).map(|(from, to)| self.arc(from, to)).sum()
    }

    fn augmented_cost(&self, route: &[usize]) -> i64 {
        legs(route).map(|(from, to)| self.augmented_arc(from, to)).sum()
    }

    fn total_cost(&self, routes: &[Vec<usize>]) -> i64 {
        routes.iter().map(|route| self.route_cost(route)).sum()
    }

    /// Time windows, horizon and capacity for `route` driven by `vehicle`.
    fn feasible(&self, vehicle: usize, route: &[usize]) -> bool {
        if self.capacity_bound {
            let load: u64 = route.iter().map(|&stop| u64::from(self.problem.demand(stop))).sum();
            if load > u64::from(self.problem.capacity(vehicle)) {
                return false;
            }
        }

        let mut time = self.problem.shift().start;
        let mut previous = DEPOT;
        for &stop in route {
            time += self.problem.arc_cost(previous, stop);
            let window = self.problem.window(stop);
            time = time.max(window.start);
            if time > window.end {
                return false;
            }
            previous = stop;
        }
        time + self.problem.arc_cost(previous, DEPOT) <= SECONDS_PER_DAY
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Parallel cheapest insertion: grow every vehicle's route at once,
    /// always placing the stop whose cheapest feasible insertion is the
    /// lowest overall.
    fn construct(&self) -> Option<Vec<Vec<usize>>> {
        let mut routes: Vec<Vec<usize>> = vec![Vec::new(); self.problem.vehicle_count()];
        let mut pending: Vec<usize> = self.problem.customers().collect();

        while !pending.is_empty() {
            let (_, slot, vehicle, position) = pending
                .par_iter()
                .enumerate()
                .filter_map(|(slot, &stop)| {
                    self.best_insertion(&routes, stop)
                        .map(|(vehicle, position, delta)| (delta, slot, vehicle, position))
                })
                .min()?;

            let stop = pending.remove(slot);
            routes[vehicle].insert(position, stop);
        }

        Some(routes)
    }

    /// Cheapest feasible `(vehicle, position, cost increase)` for `stop`.
    fn best_insertion(&self, routes: &[Vec<usize>], stop: usize) -> Option<(usize, usize, i64)> {
        let mut best: Option<(usize, usize, i64)> = None;

        for (vehicle, route) in routes.iter().enumerate() {
            for position in 0..=route.len() {
                let prev = if position == 0 { DEPOT } else { route[position - 1] };
                let next = route.get(position).copied().unwrap_or(DEPOT);
                let removed = if route.is_empty() { 0 } else { self.arc(prev, next) };
                let delta = self.arc(prev, stop) + self.arc(stop, next) - removed;

                if best.is_some_and(|(_, _, cost)| delta >= cost) {
                    continue;
                }

                let mut candidate = route.clone();
                candidate.insert(position, stop);
                if self.feasible(vehicle, &candidate) {
                    best = Some((vehicle, position, delta));
                }
            }
        }

        best
    }

    // ========================================================================
    // Local Search Operators
    // ========================================================================

    /// 2-opt: Reverse a segment within a route to reduce augmented cost.
    /// Returns true if an improvement was made.
    fn two_opt_improve(&self, vehicle: usize, route: &mut Vec<usize>) -> bool {
        let n = route.len();
        if n < 2 {
            return false;
        }

        let current_cost = self.augmented_cost(route);
        for i in 0..n - 1 {
            for j in i + 1..n {
                let mut candidate = route.clone();
                candidate[i..=j].reverse();

                if self.augmented_cost(&candidate) < current_cost
                    && self.feasible(vehicle, &candidate)
                {
                    *route = candidate;
                    return true;
                }
            }
        }

        false
    }

    /// Relocate: Move a stop to another position, in the same route or
    /// another one. Returns true if an improvement was made.
    fn relocate_improve(&self, routes: &mut [Vec<usize>]) -> bool {
        for from in 0..routes.len() {
            for index in 0..routes[from].len() {
                let stop = routes[from][index];
                let mut reduced = routes[from].clone();
                reduced.remove(index);

                for to in 0..routes.len() {
                    if from == to {
                        let current_cost = self.augmented_cost(&routes[from]);
                        for position in 0..=reduced.len() {
                            if position == index {
                                continue;
                            }
                            let mut candidate = reduced.clone();
                            candidate.insert(position, stop);
                            if self.augmented_cost(&candidate) < current_cost
                                && self.feasible(from, &candidate)
                            {
                                routes[from] = candidate;
                                return true;
                            }
                        }
                        continue;
                    }

                    let current_cost =
                        self.augmented_cost(&routes[from]) + self.augmented_cost(&routes[to]);
                    let reduced_cost = self.augmented_cost(&reduced);
                    if !self.feasible(from, &reduced) {
                        continue;
                    }

                    for position in 0..=routes[to].len() {
                        let mut candidate = routes[to].clone();
                        candidate.insert(position, stop);
                        if reduced_cost + self.augmented_cost(&candidate) < current_cost
                            && self.feasible(to, &candidate)
                        {
                            routes[from] = reduced;
                            routes[to] = candidate;
                            return true;
                        }
                    }
                }
            }
        }

        false
    }

    /// Exchange: Swap two stops between different routes.
    /// Returns true if an improvement was made.
    fn exchange_improve(&self, routes: &mut [Vec<usize>]) -> bool {
        for first in 0..routes.len() {
            for second in first + 1..routes.len() {
                let current_cost =
                    self.augmented_cost(&routes[first]) + self.augmented_cost(&routes[second]);

                for i in 0..routes[first].len() {
                    for j in 0..routes[second].len() {
                        let mut left = routes[first].clone();
                        let mut right = routes[second].clone();
                        std::mem::swap(&mut left[i], &mut right[j]);

                        if self.augmented_cost(&left) + self.augmented_cost(&right) < current_cost
                            && self.feasible(first, &left)
                            && self.feasible(second, &right)
                        {
                            routes[first] = left;
                            routes[second] = right;
                            return true;
                        }
                    }
                }
            }
        }

        false
    }

    /// Run local search until no operator improves or the deadline passes.
    fn local_search(&self, routes: &mut [Vec<usize>], deadline: Instant) {
        while Instant::now() < deadline {
            let mut improved = false;

            for (vehicle, route) in routes.iter_mut().enumerate() {
                if self.two_opt_improve(vehicle, route) {
                    improved = true;
                }
            }

            if self.relocate_improve(routes) {
                improved = true;
            }

            if self.exchange_improve(routes) {
                improved = true;
            }

            if !improved {
                break;
            }
        }
    }

    // ========================================================================
    // Guidance
    // ========================================================================

    /// Penalize the arcs of `routes` with the highest utility
    /// `cost / (1 + penalty)`. Returns false when there is nothing to guide.
    fn penalize(&mut self, routes: &[Vec<usize>]) -> bool {
        let utility = |search: &Self, from: usize, to: usize| {
            search.arc(from, to) as f64 / f64::from(1 + search.penalties[from][to])
        };

        let arcs: Vec<(usize, usize)> = routes.iter().flat_map(|route| legs(route)).collect();
        let Some(max_utility) = arcs
            .iter()
            .map(|&(from, to)| utility(self, from, to))
            .max_by(f64::total_cmp)
        else {
            return false;
        };

        for (from, to) in arcs {
            if utility(self, from, to) >= max_utility - 1e-9 {
                self.penalties[from][to] += 1;
            }
        }
        true
    }
}
