//! HTTP adapter for an external distance-matrix service.
//!
//! The service is queried with origins == destinations, split into batches
//! that respect its per-request cell limit. Any failure falls back to the
//! great-circle estimate for the whole matrix.

use std::env;
use std::ops::Range;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ProviderError;
use crate::haversine::{DEFAULT_SPEED_KMH, HaversineMatrix};
use crate::traits::{DistanceMatrixProvider, MatrixSource, TravelMatrices};

/// Environment variable holding the service credential.
pub const API_KEY_ENV: &str = "DISTANCE_MATRIX_API_KEY";

/// Environment variable overriding the service base URL.
pub const BASE_URL_ENV: &str = "DISTANCE_MATRIX_URL";

/// Value used for missing or zero off-diagonal cells, so no edge is free.
const SENTINEL: i32 = 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Credential; without it the provider never goes to the network.
    pub api_key: Option<String>,
    /// Upper bound on origins x destinations per request.
    pub max_cells_per_request: usize,
    /// Above this many locations the request volume is not worth it and
    /// the great-circle estimate is used instead.
    pub max_locations: usize,
    pub timeout_secs: u64,
    pub fallback_speed_kmh: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com/maps/api/distancematrix".to_string(),
            api_key: None,
            max_cells_per_request: 100,
            max_locations: 60,
            timeout_secs: 10,
            fallback_speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl ProviderConfig {
    /// Defaults, with credential and base URL taken from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty());
        if let Ok(url) = env::var(BASE_URL_ENV) {
            config.base_url = url;
        }
        config
    }
}

#[derive(Debug, Clone)]
pub struct DistanceMatrixClient {
    config: ProviderConfig,
    client: reqwest::blocking::Client,
    fallback: HaversineMatrix,
}

impl DistanceMatrixClient {
    pub fn new(config: ProviderConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let fallback = HaversineMatrix::new(config.fallback_speed_kmh);

        Ok(Self {
            config,
            client,
            fallback,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn fetch(
        &self,
        api_key: &str,
        locations: &[(f64, f64)],
    ) -> Result<(Vec<Vec<i32>>, Vec<Vec<i32>>), ProviderError> {
        let n = locations.len();
        let mut distances = vec![vec![0; n]; n];
        let mut durations = vec![vec![0; n]; n];

        for (rows, cols) in batches(n, self.config.max_cells_per_request) {
            debug!(rows = ?rows, cols = ?cols, "requesting distance matrix batch");
            let body = self.request(api_key, &locations[rows.clone()], &locations[cols.clone()])?;
            check_shape(&body, rows.len(), cols.len())?;

            for (row_offset, row) in body.rows.iter().enumerate() {
                for (col_offset, element) in row.elements.iter().enumerate() {
                    let (i, j) = (rows.start + row_offset, cols.start + col_offset);
                    if i == j {
                        continue;
                    }
                    let (distance, duration) = element.cell_values();
                    distances[i][j] = distance;
                    durations[i][j] = duration;
                }
            }
        }

        Ok((distances, durations))
    }

    fn request(
        &self,
        api_key: &str,
        origins: &[(f64, f64)],
        destinations: &[(f64, f64)],
    ) -> Result<MatrixResponse, ProviderError> {
        let url = format!("{}/json", self.config.base_url.trim_end_matches('/'));
        let body = self
            .client
            .get(url)
            .query(&[
                ("origins", join_coords(origins)),
                ("destinations", join_coords(destinations)),
                ("mode", "driving".to_string()),
                ("departure_time", "now".to_string()),
                ("key", api_key.to_string()),
            ])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<MatrixResponse>())?;

        if body.is_ok() {
            Ok(body)
        } else {
            let detail = match &body.error_message {
                Some(message) => format!("{}: {}", body.status, message),
                None => body.status.clone(),
            };
            Err(ProviderError::Status(detail))
        }
    }
}

impl DistanceMatrixProvider for DistanceMatrixClient {
    fn matrices_for(&self, locations: &[(f64, f64)]) -> TravelMatrices {
        let Some(api_key) = self.config.api_key.as_deref() else {
            debug!("no distance-matrix credential configured, using great-circle estimate");
            return self.fallback.matrices_for(locations);
        };

        if locations.len() > self.config.max_locations {
            let reason = format!(
                "{} locations exceed the limit of {}",
                locations.len(),
                self.config.max_locations
            );
            warn!(%reason, "skipping distance-matrix service");
            let source = MatrixSource::Fallback {
                reason: Some(reason),
            };
            return self.fallback.estimate(locations, source);
        }

        match self.fetch(api_key, locations) {
            Ok((distances, durations)) => TravelMatrices {
                distances,
                durations,
                source: MatrixSource::Provider,
            },
            Err(err) => {
                warn!(error = %err, "distance-matrix service failed, using great-circle estimate");
                self.fallback.estimate(
                    locations,
                    MatrixSource::Fallback {
                        reason: Some(err.to_string()),
                    },
                )
            }
        }
    }
}

/// Split an `n x n` request into row/column blocks of at most `max_cells`.
pub fn batches(n: usize, max_cells: usize) -> Vec<(Range<usize>, Range<usize>)> {
    if n == 0 {
        return Vec::new();
    }
    let max_cells = max_cells.max(1);
    let cols = n.min(max_cells);
    let rows = (max_cells / cols).max(1);

    let mut result = Vec::new();
    for row_start in (0..n).step_by(rows) {
        for col_start in (0..n).step_by(cols) {
            result.push((
                row_start..(row_start + rows).min(n),
                col_start..(col_start + cols).min(n),
            ));
        }
    }
    result
}

fn join_coords(coords: &[(f64, f64)]) -> String {
    coords
        .iter()
        .map(|(lat, lon)| format!("{:.6},{:.6}", lat, lon))
        .collect::<Vec<_>>()
        .join("|")
}

fn check_shape(
    body: &MatrixResponse,
    expected_rows: usize,
    expected_cols: usize,
) -> Result<(), ProviderError> {
    let rows = body.rows.len();
    let cols = body.rows.iter().map(|row| row.elements.len()).min().unwrap_or(0);
    let ragged = body.rows.iter().any(|row| row.elements.len() != expected_cols);
    if rows != expected_rows || ragged {
        return Err(ProviderError::Shape {
            rows,
            cols,
            expected_rows,
            expected_cols,
        });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

impl MatrixResponse {
    fn is_ok(&self) -> bool {
        self.status == "OK"
    }
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    #[serde(default)]
    status: String,
    distance: Option<Measure>,
    duration: Option<Measure>,
    duration_in_traffic: Option<Measure>,
}

impl MatrixElement {
    /// Distance and duration for one cell, preferring traffic-aware time.
    fn cell_values(&self) -> (i32, i32) {
        if self.status != "OK" {
            return (SENTINEL, SENTINEL);
        }
        let positive = |measure: Option<&Measure>| {
            measure
                .map(|measure| measure.value.round() as i32)
                .filter(|&value| value > 0)
        };
        let distance = positive(self.distance.as_ref()).unwrap_or(SENTINEL);
        let duration = positive(self.duration_in_traffic.as_ref())
            .or_else(|| positive(self.duration.as_ref()))
            .unwrap_or(SENTINEL);
        (distance, duration)
    }
}

#[derive(Debug, Deserialize)]
struct Measure {
    value: f64,
}
