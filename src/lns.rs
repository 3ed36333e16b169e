//! Destroy-and-repair large neighborhood search.
//!
//! Works directly on per-vehicle lists of stop indices. Time windows and
//! the shift end are soft: violations are priced into the route cost, and
//! every stop is always placed somewhere, even at a high penalty.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::error::SolveError;
use crate::model::{DEPOT, ProblemInstance};
use crate::solution::{Solution, SolverOutcome};
use crate::traits::RouteSolver;

#[derive(Debug, Clone)]
pub struct LnsOptions {
    pub time_limit: Duration,
    pub max_iterations: usize,
    /// Share of stops removed at random per iteration (divided by three).
    pub destruction_fraction: f64,
    /// Share of over-long hops whose arriving stop is removed.
    pub bad_pair_fraction: f64,
    /// Longest reasonable hop between consecutive stops (seconds).
    pub max_hop: i32,
    /// Flat cost added for each hop longer than `max_hop`.
    pub hop_penalty: f64,
    /// Cost per second of lateness (windows, shift end) or unit of overload.
    pub penalty_factor: f64,
    /// Chance of accepting a neighbor that is not better.
    pub acceptance_probability: f64,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for LnsOptions {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(120),
            max_iterations: 1000,
            destruction_fraction: 0.3,
            bad_pair_fraction: 0.7,
            max_hop: 1500,
            hop_penalty: 50.0,
            penalty_factor: 10.0,
            acceptance_probability: 0.1,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LnsSolver {
    options: LnsOptions,
}

impl LnsSolver {
    pub fn new(options: LnsOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LnsOptions {
        &self.options
    }

    /// Cost of `route` (non-depot stops, in order) driven by `vehicle`.
    ///
    /// Sums travel seconds from the depot through every stop, plus a flat
    /// penalty per over-long hop. Lateness at a window or past the shift end
    /// and overload are priced in, unless `strict` is set, in which case any
    /// of them makes the route infinitely expensive. An empty route is
    /// infinitely expensive as well.
    pub fn route_cost(
        &self,
        problem: &ProblemInstance,
        vehicle: usize,
        route: &[usize],
        strict: bool,
    ) -> f64 {
        if route.is_empty() {
            return f64::INFINITY;
        }

        let options = &self.options;
        let mut cost = 0.0;
        let mut time = problem.shift().start;
        let mut previous = DEPOT;

        for &stop in route {
            let travel = problem.duration(previous, stop);
            cost += f64::from(travel);
            if travel > options.max_hop {
                cost += options.hop_penalty;
            }

            time += problem.service_at(previous) + travel;
            let window = problem.window(stop);
            time = time.max(window.start);
            if time > window.end {
                if strict {
                    return f64::INFINITY;
                }
                cost += options.penalty_factor * f64::from(time - window.end);
            }
            previous = stop;
        }

        let finish = time + problem.service_at(previous);
        let shift_end = problem.shift().end;
        if finish > shift_end {
            if strict {
                return f64::INFINITY;
            }
            cost += options.penalty_factor * f64::from(finish - shift_end);
        }

        if problem.has_demand() {
            let load: u64 = route.iter().map(|&stop| u64::from(problem.demand(stop))).sum();
            let capacity = u64::from(problem.capacity(vehicle));
            if load > capacity {
                if strict {
                    return f64::INFINITY;
                }
                cost += options.penalty_factor * (load - capacity) as f64;
            }
        }

        cost
    }

    /// Run the search. Always returns a plan covering every stop.
    pub fn optimize(&self, problem: &ProblemInstance) -> (Solution, bool) {
        let started = Instant::now();
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let search = Neighborhood {
            problem,
            solver: self,
        };
        let acceptance = self.options.acceptance_probability.clamp(0.0, 1.0);

        let mut current = search.initial(&mut rng);
        let mut current_cost = search.total_cost(&current);
        let mut best = current.clone();
        let mut best_cost = current_cost;

        let mut iterations = 0;
        if problem.customers().next().is_some() {
            while iterations < self.options.max_iterations
                && started.elapsed() < self.options.time_limit
            {
                iterations += 1;

                let (mut candidate, removed) = search.destroy(&current, &mut rng);
                search.repair(&mut candidate, &removed);
                let cost = search.total_cost(&candidate);

                if cost < current_cost || rng.random_bool(acceptance) {
                    current = candidate;
                    current_cost = cost;
                }
                if current_cost < best_cost {
                    best = current.clone();
                    best_cost = current_cost;
                    debug!(cost = best_cost, iterations, "improved plan");
                }
            }
        }

        let forced = search.force_coverage(&mut best);
        let best_cost = search.total_cost(&best);
        let feasible = best
            .iter()
            .enumerate()
            .filter(|(_, route)| !route.is_empty())
            .all(|(vehicle, route)| self.route_cost(problem, vehicle, route, true).is_finite());

        info!(
            cost = best_cost,
            iterations,
            forced,
            feasible,
            elapsed = ?started.elapsed(),
            "large neighborhood search finished"
        );

        let sequences: Vec<Vec<usize>> = best
            .into_iter()
            .map(|route| std::iter::once(DEPOT).chain(route).collect())
            .collect();
        (
            Solution::from_sequences(problem, sequences, best_cost.round() as i64),
            feasible,
        )
    }
}

impl RouteSolver for LnsSolver {
    fn name(&self) -> &'static str {
        "lns"
    }

    fn solve(&self, problem: &ProblemInstance) -> Result<SolverOutcome, SolveError> {
        let (solution, feasible) = self.optimize(problem);
        Ok(if feasible {
            SolverOutcome::Solved(solution)
        } else {
            SolverOutcome::Exhausted(solution)
        })
    }
}

struct Neighborhood<'a> {
    problem: &'a ProblemInstance,
    solver: &'a LnsSolver,
}

impl Neighborhood<'_> {
    fn cost(&self, vehicle: usize, route: &[usize]) -> f64 {
        self.solver.route_cost(self.problem, vehicle, route, false)
    }

    /// Sum over vehicles that have work; idle vehicles cost nothing.
    fn total_cost(&self, routes: &[Vec<usize>]) -> f64 {
        routes
            .iter()
            .enumerate()
            .filter(|(_, route)| !route.is_empty())
            .map(|(vehicle, route)| self.cost(vehicle, route))
            .sum()
    }

    /// Shuffled stops split into contiguous chunks, one per vehicle.
    fn initial(&self, rng: &mut StdRng) -> Vec<Vec<usize>> {
        let vehicles = self.problem.vehicle_count();
        let mut stops: Vec<usize> = self.problem.customers().collect();
        stops.shuffle(rng);

        let chunk = stops.len().div_ceil(vehicles).max(1);
        let mut routes: Vec<Vec<usize>> = stops.chunks(chunk).map(<[usize]>::to_vec).collect();
        routes.resize_with(vehicles, Vec::new);
        routes
    }

    /// Remove most stops reached by an over-long hop (the depot leg
    /// included), then a few random
    /// stops from routes that keep at least one visit.
    fn destroy(&self, routes: &[Vec<usize>], rng: &mut StdRng) -> (Vec<Vec<usize>>, Vec<usize>) {
        let options = &self.solver.options;
        let mut routes = routes.to_vec();

        let mut bad: Vec<usize> = routes
            .iter()
            .flat_map(|route| {
                let from = std::iter::once(DEPOT).chain(route.iter().copied());
                from.zip(route.iter().copied())
            })
            .filter(|&(from, to)| self.problem.duration(from, to) > options.max_hop)
            .map(|(_, to)| to)
            .collect();
        bad.shuffle(rng);
        bad.truncate((bad.len() as f64 * options.bad_pair_fraction) as usize);

        let marked: HashSet<usize> = bad.iter().copied().collect();
        for route in &mut routes {
            route.retain(|stop| !marked.contains(stop));
        }
        let mut removed = bad;

        let total = self.problem.len() - 1;
        let extra = (total as f64 * options.destruction_fraction / 3.0).round().max(1.0) as usize;
        for _ in 0..extra {
            let multi: Vec<usize> =
                (0..routes.len()).filter(|&index| routes[index].len() > 1).collect();
            let Some(&route) = multi.get(rng.random_range(0..multi.len().max(1))) else {
                break;
            };
            let position = rng.random_range(0..routes[route].len());
            removed.push(routes[route].remove(position));
        }

        (routes, removed)
    }

    /// Reinsert each removed stop at its cheapest position.
    fn repair(&self, routes: &mut [Vec<usize>], removed: &[usize]) {
        for &stop in removed {
            self.insert_cheapest(routes, stop);
        }
    }

    /// Place `stop` wherever it raises the total cost least, however high.
    fn insert_cheapest(&self, routes: &mut [Vec<usize>], stop: usize) {
        let mut best: Option<(f64, usize, usize)> = None;

        for (vehicle, route) in routes.iter().enumerate() {
            let before = if route.is_empty() { 0.0 } else { self.cost(vehicle, route) };
            for position in 0..=route.len() {
                let mut candidate = route.clone();
                candidate.insert(position, stop);
                let delta = self.cost(vehicle, &candidate) - before;
                if best.is_none_or(|(cost, _, _)| delta < cost) {
                    best = Some((delta, vehicle, position));
                }
            }
        }

        if let Some((_, vehicle, position)) = best {
            routes[vehicle].insert(position, stop);
        }
    }

    /// Insert every stop missing from `routes`. Returns how many were forced.
    fn force_coverage(&self, routes: &mut [Vec<usize>]) -> usize {
        let present: HashSet<usize> = routes.iter().flatten().copied().collect();
        let missing: Vec<usize> =
            self.problem.customers().filter(|stop| !present.contains(stop)).collect();
        for &stop in &missing {
            self.insert_cheapest(routes, stop);
        }
        missing.len()
    }
}
