//! Solver tests across all three strategies.
//!
//! Coverage, time windows, capacity and the fixed end-to-end scenarios.

mod fixtures;

use std::time::Duration;

use laundry_route_planner::builder::ProblemBuilder;
use laundry_route_planner::exact::ExactSolver;
use laundry_route_planner::haversine::HaversineMatrix;
use laundry_route_planner::lns::{LnsOptions, LnsSolver};
use laundry_route_planner::model::{DEPOT, ProblemInstance, RoutingConfig};
use laundry_route_planner::solution::{Solution, SolverOutcome};
use laundry_route_planner::solver::GuidedSolver;
use laundry_route_planner::traits::RouteSolver;

use fixtures::{CUSTOMERS, MatrixProblem, customer, hours, minutes, plant};

// ============================================================================
// Helpers
// ============================================================================

fn quick_lns() -> LnsSolver {
    LnsSolver::new(LnsOptions {
        time_limit: Duration::from_secs(5),
        max_iterations: 200,
        seed: Some(42),
        ..LnsOptions::default()
    })
}

fn all_solvers() -> Vec<Box<dyn RouteSolver>> {
    vec![
        Box::new(GuidedSolver::with_time_limit(Duration::from_secs(5))),
        Box::new(ExactSolver::with_time_limit(Duration::from_secs(5))),
        Box::new(quick_lns()),
    ]
}

fn bogota_problem(config: RoutingConfig) -> ProblemInstance {
    let mut stops = vec![plant()];
    stops.extend(CUSTOMERS.iter().take(6).map(customer));
    ProblemBuilder::new(config)
        .build(&stops, &HaversineMatrix::default())
        .expect("build")
        .problem
}

fn assert_within_windows(problem: &ProblemInstance, solution: &Solution) {
    for route in &solution.routes {
        for (&stop, &arrival) in route.stops.iter().zip(&route.arrivals) {
            if stop == DEPOT {
                continue;
            }
            assert!(
                problem.window(stop).contains(arrival),
                "stop {stop} reached at {arrival}, window {:?}",
                problem.window(stop)
            );
        }
    }
}

// ============================================================================
// Coverage
// ============================================================================

#[test]
fn every_solver_covers_every_stop() {
    let problem = bogota_problem(RoutingConfig::default());
    for solver in all_solvers() {
        let outcome = solver.solve(&problem).expect("solve");
        let solution = outcome
            .solution()
            .unwrap_or_else(|| panic!("{} found no plan", solver.name()));
        assert!(
            solution.covers_exactly_once(&problem),
            "{} missed {:?}",
            solver.name(),
            solution.missing_stops(&problem)
        );
    }
}

#[test]
fn every_solver_handles_a_single_stop() {
    let problem = MatrixProblem::uniform(2, 300).build();
    for solver in all_solvers() {
        let outcome = solver.solve(&problem).expect("solve");
        assert!(outcome.is_solved(), "{} returned {}", solver.name(), outcome.label());
        let solution = outcome.solution().expect("solution");
        assert!(solution.covers_exactly_once(&problem));
        assert_eq!(solution.visited().collect::<Vec<_>>(), vec![1]);
    }
}

// ============================================================================
// Guided solver
// ============================================================================

#[test]
fn guided_route_follows_non_overlapping_windows() {
    let durations = vec![vec![0, 600, 900], vec![600, 0, 700], vec![900, 700, 0]];
    let distances = vec![vec![0, 5_000, 8_000], vec![5_000, 0, 6_000], vec![8_000, 6_000, 0]];
    let problem = MatrixProblem::new(durations)
        .distances(distances)
        .window(1, hours(9), hours(9) + minutes(30))
        .window(2, hours(11), hours(11) + minutes(30))
        .build();

    let outcome = GuidedSolver::with_time_limit(Duration::from_secs(5))
        .solve(&problem)
        .expect("solve");
    let SolverOutcome::Solved(solution) = outcome else {
        panic!("expected a plan, got {}", outcome.label());
    };

    assert_eq!(solution.routes.len(), 1);
    let route = &solution.routes[0];
    assert_eq!(route.stops, vec![DEPOT, 1, 2]);
    assert_eq!(route.arrivals[0], problem.shift().start);
    assert_eq!(route.arrivals[1], hours(9));
    assert_eq!(route.arrivals[2], hours(11));
    assert_within_windows(&problem, &solution);

    // depot -> A -> B, the return leg is not reported
    assert_eq!(solution.total_distance, 5_000 + 6_000);
    assert_eq!(solution.total_duration, 600 + 700);
}

#[test]
fn guided_depot_arrival_is_shift_start() {
    let config = RoutingConfig {
        shift_start: hours(7),
        vehicle_count: 2,
        ..RoutingConfig::default()
    };
    let problem = bogota_problem(config);
    let solution = GuidedSolver::with_time_limit(Duration::from_secs(5))
        .optimize(&problem)
        .expect("plan");

    assert_eq!(solution.routes.len(), 2);
    for route in &solution.routes {
        assert_eq!(route.stops[0], DEPOT);
        assert_eq!(route.arrivals[0], hours(7));
    }
    assert_within_windows(&problem, &solution);
}

#[test]
fn guided_respects_capacity() {
    let config = RoutingConfig {
        vehicle_count: 2,
        capacity: Some(2),
        ..RoutingConfig::default()
    };
    let problem = MatrixProblem::uniform(5, 300)
        .demands(vec![0, 1, 1, 1, 1])
        .config(config)
        .build();

    let solution = GuidedSolver::with_time_limit(Duration::from_secs(5))
        .optimize(&problem)
        .expect("plan");
    assert!(solution.covers_exactly_once(&problem));
    for route in &solution.routes {
        assert!(route.visits().count() <= 2);
    }
}

#[test]
fn guided_follows_per_vehicle_capacities() {
    let problem = MatrixProblem::uniform(5, 300)
        .demands(vec![0, 1, 1, 1, 1])
        .build()
        .with_capacities(vec![3, 1])
        .expect("fleet");

    let solution = GuidedSolver::with_time_limit(Duration::from_secs(5))
        .optimize(&problem)
        .expect("plan");

    assert!(solution.covers_exactly_once(&problem));
    assert_eq!(solution.routes.len(), 2);
    assert_eq!(solution.routes[0].visits().count(), 3);
    assert_eq!(solution.routes[1].visits().count(), 1);
}

#[test]
fn guided_reports_infeasible_windows() {
    let problem = MatrixProblem::uniform(2, hours(3))
        .window(1, hours(8), hours(8) + minutes(10))
        .build();
    let outcome = GuidedSolver::with_time_limit(Duration::from_secs(2))
        .solve(&problem)
        .expect("solve");
    assert_eq!(outcome, SolverOutcome::Infeasible);
}

// ============================================================================
// Exact solver
// ============================================================================

#[test]
fn exact_symmetric_tour_costs_every_leg() {
    let config = RoutingConfig {
        service_time: 0,
        shift_start: 0,
        shift_end: 86_399,
        ..RoutingConfig::default()
    };
    let problem = MatrixProblem::uniform(5, 600).config(config).build();

    let outcome = ExactSolver::with_time_limit(Duration::from_secs(10))
        .solve(&problem)
        .expect("solve");
    let SolverOutcome::Solved(solution) = outcome else {
        panic!("expected a proven optimum, got {}", outcome.label());
    };

    let tour = &solution.routes[0].stops;
    assert_eq!(tour.len(), 6);
    assert_eq!(tour.first(), Some(&DEPOT));
    assert_eq!(tour.last(), Some(&DEPOT));
    assert_eq!(solution.total_duration, 5 * 600);
    assert_eq!(solution.objective, 3000);
}

#[test]
fn exact_respects_windows() {
    let problem = bogota_problem(RoutingConfig::default());
    let solution = ExactSolver::with_time_limit(Duration::from_secs(10))
        .solve(&problem)
        .expect("solve")
        .into_solution_or_empty();
    assert!(!solution.is_empty());
    assert_within_windows(&problem, &solution);
}

// ============================================================================
// Destroy-and-repair solver
// ============================================================================

#[test]
fn lns_forces_coverage_when_windows_conflict() {
    // both stops must be reached by 08:05, but serving either takes ten minutes
    let config = RoutingConfig {
        service_time: 600,
        ..RoutingConfig::default()
    };
    let problem = MatrixProblem::uniform(3, 60)
        .window(1, hours(8), hours(8) + minutes(5))
        .window(2, hours(8), hours(8) + minutes(5))
        .config(config)
        .build();

    let solver = quick_lns();
    let outcome = solver.solve(&problem).expect("solve");
    let SolverOutcome::Exhausted(solution) = &outcome else {
        panic!("expected a penalized plan, got {}", outcome.label());
    };
    assert!(solution.covers_exactly_once(&problem));

    let visits: Vec<usize> = solution.routes[0].visits().collect();
    let relaxed = solver.route_cost(&problem, 0, &visits, false);
    assert!(relaxed.is_finite());
    assert!(relaxed > 120.0);
    assert_eq!(solver.route_cost(&problem, 0, &visits, true), f64::INFINITY);
}

#[test]
fn lns_splits_across_vehicles() {
    let config = RoutingConfig {
        vehicle_count: 3,
        ..RoutingConfig::default()
    };
    let problem = bogota_problem(config);
    let outcome = quick_lns().solve(&problem).expect("solve");
    let solution = outcome.solution().expect("solution");

    assert_eq!(solution.routes.len(), 3);
    assert!(solution.covers_exactly_once(&problem));
    for route in &solution.routes {
        assert_eq!(route.stops[0], DEPOT);
        assert_eq!(route.arrivals[0], problem.shift().start);
    }
}

#[test]
fn lns_is_reproducible_with_a_seed() {
    let problem = bogota_problem(RoutingConfig::default());
    let first = quick_lns().optimize(&problem);
    let second = quick_lns().optimize(&problem);
    assert_eq!(first, second);
}
