//! End-to-end planning runs over Bogotá records.
//!
//! Records go through ingestion, clustering, the great-circle provider and
//! each strategy; cluster stops are expanded back to customers at the end.

mod fixtures;

use std::collections::HashMap;
use std::time::Duration;

use laundry_route_planner::error::DataWarning;
use laundry_route_planner::exact::ExactSolver;
use laundry_route_planner::haversine::HaversineMatrix;
use laundry_route_planner::lns::{LnsOptions, LnsSolver};
use laundry_route_planner::model::{RoutingConfig, StopRecord, StopRole};
use laundry_route_planner::planner::{PlanReport, Planner, Strategy};
use laundry_route_planner::solver::GuidedSolver;
use laundry_route_planner::traits::{MatrixSource, RouteSolver};

use fixtures::{BRANCHES, CUSTOMERS, Location, PLANT, ZONA_T_BLOCK};

fn record(location: &Location, window: Option<(&str, &str)>) -> StopRecord {
    let body = serde_json::json!({
        "id": location.id,
        "lat": location.lat,
        "lon": location.lng,
        "time_start": window.map(|(start, _)| start),
        "time_end": window.map(|(_, end)| end),
        "nombre_cliente": location.name,
    });
    serde_json::from_value(body).expect("record")
}

fn records() -> Vec<(StopRole, StopRecord)> {
    let mut records = vec![(StopRole::Depot, record(&PLANT, None))];
    records.extend(BRANCHES.iter().map(|branch| (StopRole::Checkpoint, record(branch, None))));
    records.extend(
        CUSTOMERS
            .iter()
            .zip([Some(("09:00", "11:00")), None, Some(("10:00", "12:30"))].into_iter().cycle())
            .map(|(location, window)| (StopRole::Intermediate, record(location, window))),
    );
    records.extend(
        ZONA_T_BLOCK
            .iter()
            .map(|location| (StopRole::Intermediate, record(location, None))),
    );
    records
}

fn run(solver: Box<dyn RouteSolver>) -> PlanReport {
    Planner::new(RoutingConfig::default(), Strategy::Guided)
        .with_solver(solver)
        .with_cluster_radius(300.0)
        .with_date("2024-05-14")
        .plan_records(records(), &HaversineMatrix::default())
        .expect("plan")
}

/// Every customer and branch appears exactly once after expanding clusters.
fn assert_full_coverage(report: &PlanReport) {
    let clusters = report.clusters.as_ref().expect("clusters");
    let mut seen: HashMap<String, usize> = HashMap::new();
    for route in report.route_ids() {
        for stop in clusters.expand(&route) {
            if stop.role() != StopRole::Depot {
                *seen.entry(stop.id.clone()).or_default() += 1;
            }
        }
    }

    let expected = BRANCHES.len() + CUSTOMERS.len() + ZONA_T_BLOCK.len();
    assert_eq!(seen.len(), expected, "visited {:?}", seen.keys());
    assert!(seen.values().all(|&count| count == 1), "{seen:?}");
}

#[test]
fn guided_plan_covers_the_city() {
    let report = run(Box::new(GuidedSolver::with_time_limit(Duration::from_secs(5))));

    assert!(report.outcome.is_solved());
    assert_eq!(report.source, MatrixSource::Fallback { reason: None });
    assert!(report.warnings.is_empty());
    assert_full_coverage(&report);

    let metrics = report.metrics.as_ref().expect("metrics");
    assert_eq!(metrics.algorithm, "guided");
    assert_eq!(metrics.date, "2024-05-14");
    // branches, customers and one stop for the block
    assert_eq!(metrics.stop_count, BRANCHES.len() + CUSTOMERS.len() + 1);
}

#[test]
fn exact_plan_covers_the_city() {
    let report = run(Box::new(ExactSolver::with_time_limit(Duration::from_secs(10))));
    assert!(report.outcome.solution().is_some(), "got {}", report.outcome.label());
    assert_full_coverage(&report);
}

#[test]
fn lns_plan_covers_the_city() {
    let report = run(Box::new(LnsSolver::new(LnsOptions {
        max_iterations: 300,
        seed: Some(11),
        ..LnsOptions::default()
    })));
    assert_full_coverage(&report);
    assert_eq!(report.metrics.as_ref().map(|metrics| metrics.algorithm.as_str()), Some("lns"));
}

#[test]
fn bad_time_strings_only_warn() {
    let mut input = records();
    input[3].1.time_start = Some("nine".to_string());
    input[3].1.time_end = Some("11:00".to_string());

    let report = Planner::new(RoutingConfig::default(), Strategy::Lns)
        .with_solver(Box::new(LnsSolver::new(LnsOptions {
            max_iterations: 50,
            seed: Some(5),
            ..LnsOptions::default()
        })))
        .plan_records(input, &HaversineMatrix::default())
        .expect("plan");

    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(
        &report.warnings[0],
        DataWarning::UnparseableWindow { stop_id, .. } if stop_id == CUSTOMERS[0].id
    ));
    let solution = report.outcome.solution().expect("solution");
    assert!(solution.covers_exactly_once(&report.problem));
}
