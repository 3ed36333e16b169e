//! Test fixtures for laundry-route-planner.
//!
//! Provides:
//! - Real Bogotá locations for the plant, checkpoints and customers
//! - Builders for stops and hand-made problem instances

#![allow(dead_code)]

pub mod bogota_locations;

pub use bogota_locations::*;

use laundry_route_planner::model::{ProblemInstance, RoutingConfig, Stop, StopRole, TimeWindow};

pub fn hours(h: i32) -> i32 {
    h * 3600
}

pub fn minutes(m: i32) -> i32 {
    m * 60
}

/// Customer stop at a fixture location.
pub fn customer(location: &Location) -> Stop {
    Stop::new(location.id, StopRole::Intermediate, location.coords()).with_name(location.name)
}

pub fn checkpoint(location: &Location) -> Stop {
    Stop::new(location.id, StopRole::Checkpoint, location.coords()).with_name(location.name)
}

pub fn plant() -> Stop {
    Stop::depot(PLANT.id, PLANT.coords()).with_name(PLANT.name)
}

/// Hand-made instance for matrix-level tests.
///
/// `distances` defaults to the duration matrix scaled by ten (meters for
/// roughly 36 km/h); stops carry no demand.
#[derive(Debug, Clone)]
pub struct MatrixProblem {
    durations: Vec<Vec<i32>>,
    distances: Option<Vec<Vec<i32>>>,
    windows: Vec<Option<TimeWindow>>,
    demands: Option<Vec<u32>>,
    config: RoutingConfig,
}

impl MatrixProblem {
    pub fn new(durations: Vec<Vec<i32>>) -> Self {
        let n = durations.len();
        Self {
            durations,
            distances: None,
            windows: vec![None; n],
            demands: None,
            config: RoutingConfig::default(),
        }
    }

    /// Every off-diagonal duration set to `seconds`.
    pub fn uniform(n: usize, seconds: i32) -> Self {
        Self::new(
            (0..n)
                .map(|i| (0..n).map(|j| if i == j { 0 } else { seconds }).collect())
                .collect(),
        )
    }

    pub fn distances(mut self, distances: Vec<Vec<i32>>) -> Self {
        self.distances = Some(distances);
        self
    }

    pub fn window(mut self, stop: usize, start: i32, end: i32) -> Self {
        self.windows[stop] = Some(TimeWindow::new(start, end));
        self
    }

    pub fn demands(mut self, demands: Vec<u32>) -> Self {
        self.demands = Some(demands);
        self
    }

    pub fn config(mut self, config: RoutingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ProblemInstance {
        let n = self.durations.len();
        let mut stops = vec![plant()];
        stops.extend((1..n).map(|i| {
            let location = (4.6, -74.08 + i as f64 * 0.01);
            Stop::new(format!("s{i}"), StopRole::Intermediate, location)
        }));

        let distances = self.distances.unwrap_or_else(|| {
            self.durations
                .iter()
                .map(|row| row.iter().map(|seconds| seconds * 10).collect())
                .collect()
        });
        let shift = self.config.shift();
        let windows = self
            .windows
            .into_iter()
            .map(|window| window.unwrap_or(shift))
            .collect();
        let demands = self.demands.unwrap_or_else(|| vec![0; n]);

        ProblemInstance::new(stops, distances, self.durations, windows, demands, &self.config)
            .expect("fixture problem")
    }
}
