//! Haversine distance matrix provider (fallback when the travel-time service
//! is unavailable).
//!
//! Uses great-circle distance and an assumed speed to estimate travel time.
//! Less accurate than a road network (ignores roads) but always available.

use rayon::prelude::*;

use crate::traits::{DistanceMatrixProvider, MatrixSource, TravelMatrices};

/// Average driving speed assumption for time estimation.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two (lat, lon) points in meters.
pub fn haversine_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = from;
    let (lat2, lon2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Pairwise great-circle distances in meters (unrounded).
pub fn distance_matrix_meters(locations: &[(f64, f64)]) -> Vec<Vec<f64>> {
    locations
        .par_iter()
        .enumerate()
        .map(|(i, from)| {
            locations
                .iter()
                .enumerate()
                .map(|(j, to)| if i == j { 0.0 } else { haversine_meters(*from, *to) })
                .collect()
        })
        .collect()
}

/// Haversine-based distance matrix provider.
///
/// Estimates travel time using straight-line distance and an assumed speed.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Convert a distance in meters to travel time in whole seconds.
    fn meters_to_seconds(&self, meters: f64) -> i32 {
        let meters_per_second = self.speed_kmh * 1000.0 / 3600.0;
        (meters / meters_per_second).round() as i32
    }

    /// Build fallback matrices and tag them with `source`.
    pub fn estimate(&self, locations: &[(f64, f64)], source: MatrixSource) -> TravelMatrices {
        let meters = distance_matrix_meters(locations);

        let distances = meters
            .iter()
            .map(|row| row.iter().map(|&value| value.round() as i32).collect())
            .collect();
        let durations = meters
            .iter()
            .map(|row| row.iter().map(|&value| self.meters_to_seconds(value)).collect())
            .collect();

        TravelMatrices {
            distances,
            durations,
            source,
        }
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrices_for(&self, locations: &[(f64, f64)]) -> TravelMatrices {
        self.estimate(locations, MatrixSource::Fallback { reason: None })
    }
}
