//! Routing data model: stops, time windows, configuration and the validated
//! problem instance consumed by every solver.

use serde::{Deserialize, Serialize};

use crate::error::{DataWarning, ModelError, Recovered};

/// Length of the planning horizon (one day) in seconds.
pub const SECONDS_PER_DAY: i32 = 86_400;

/// Index of the depot in every problem instance.
pub const DEPOT: usize = 0;

/// The part a stop plays in a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopRole {
    Depot,
    Checkpoint,
    Intermediate,
    Cluster,
}

impl StopRole {
    /// Whether the clustering preprocessor may merge stops of this role.
    pub fn is_clusterable(self) -> bool {
        matches!(self, StopRole::Intermediate | StopRole::Cluster)
    }
}

/// Arrival interval in seconds since local midnight (inclusive bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i32,
    pub end: i32,
}

impl TimeWindow {
    pub const fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: i32) -> bool {
        time >= self.start && time <= self.end
    }

    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Pad both bounds by `margin`, clamped to the day.
    pub fn expand(&self, margin: i32) -> TimeWindow {
        TimeWindow {
            start: (self.start - margin).clamp(0, SECONDS_PER_DAY - 1),
            end: (self.end + margin).clamp(0, SECONDS_PER_DAY - 1),
        }
    }
}

/// Parse an `HH:MM` clock string into seconds since midnight.
pub fn parse_clock(raw: &str) -> Option<i32> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let hours = clock_field(hours)?;
    let minutes = clock_field(minutes)?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 3600 + minutes * 60)
}

/// One or two plain digits; no sign, no padding.
fn clock_field(raw: &str) -> Option<i32> {
    if raw.is_empty() || raw.len() > 2 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Parse a raw requested window.
///
/// Both bounds absent means "no preference" and is clean. Anything that
/// does not yield a well-formed interval degrades to `None` with a warning.
pub fn parse_window(
    stop_id: &str,
    start: Option<&str>,
    end: Option<&str>,
) -> Recovered<Option<TimeWindow>> {
    let blank = |value: Option<&str>| value.is_none_or(|raw| raw.trim().is_empty());
    if blank(start) && blank(end) {
        return Recovered::Clean(None);
    }

    match (start.and_then(parse_clock), end.and_then(parse_clock)) {
        (Some(start), Some(end)) if start <= end => {
            Recovered::Clean(Some(TimeWindow::new(start, end)))
        }
        _ => Recovered::Defaulted {
            value: None,
            warning: DataWarning::UnparseableWindow {
                stop_id: stop_id.to_string(),
                start: start.map(str::to_string),
                end: end.map(str::to_string),
            },
        },
    }
}

/// One location to visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    role: StopRole,
    /// Coordinates (lat, lon).
    pub location: (f64, f64),
    /// Requested arrival window, if the customer gave a usable one.
    pub window: Option<TimeWindow>,
    pub demand: u32,
    pub name: String,
    pub address: String,
}

impl Stop {
    pub fn new(id: impl Into<String>, role: StopRole, location: (f64, f64)) -> Self {
        Self {
            id: id.into(),
            role,
            location,
            window: None,
            demand: 1,
            name: String::new(),
            address: String::new(),
        }
    }

    pub fn depot(id: impl Into<String>, location: (f64, f64)) -> Self {
        Self::new(id, StopRole::Depot, location)
    }

    pub fn role(&self) -> StopRole {
        self.role
    }

    pub fn with_window(mut self, start: i32, end: i32) -> Self {
        self.window = Some(TimeWindow::new(start, end));
        self
    }

    pub fn with_demand(mut self, demand: u32) -> Self {
        self.demand = demand;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

/// Raw stop as it arrives from storage or CSV import.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub time_start: Option<String>,
    #[serde(default)]
    pub time_end: Option<String>,
    #[serde(default)]
    pub demand: Option<u32>,
    #[serde(default, rename = "nombre_cliente")]
    pub name: Option<String>,
    #[serde(default, rename = "direccion")]
    pub address: Option<String>,
}

impl StopRecord {
    /// Convert into a [`Stop`].
    ///
    /// `index` names stops that arrive without an id. An unparseable window
    /// is dropped and reported; missing coordinates are fatal.
    pub fn into_stop(
        self,
        index: usize,
        role: StopRole,
    ) -> Result<(Stop, Option<DataWarning>), ModelError> {
        let id = self.id.unwrap_or_else(|| format!("stop-{index}"));
        let (Some(lat), Some(lon)) = (self.lat, self.lon) else {
            return Err(ModelError::MissingCoordinate(id));
        };

        let (window, warning) =
            parse_window(&id, self.time_start.as_deref(), self.time_end.as_deref()).into_parts();

        let stop = Stop {
            id,
            role,
            location: (lat, lon),
            window,
            demand: self.demand.unwrap_or(1),
            name: self.name.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
        };
        Ok((stop, warning))
    }
}

/// Shared routing parameters, one struct for every strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Dwell time at each non-depot stop (seconds).
    pub service_time: i32,
    /// Shift start (seconds since midnight).
    pub shift_start: i32,
    /// Shift end (seconds since midnight).
    pub shift_end: i32,
    /// Symmetric padding applied to requested windows (seconds).
    pub margin: i32,
    pub vehicle_count: usize,
    /// Per-vehicle capacity; `None` means unbounded.
    pub capacity: Option<u32>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            service_time: 600,
            shift_start: 8 * 3600,
            shift_end: 18 * 3600,
            margin: 900,
            vehicle_count: 1,
            capacity: None,
        }
    }
}

impl RoutingConfig {
    pub fn shift(&self) -> TimeWindow {
        TimeWindow::new(self.shift_start, self.shift_end)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let day = 0..SECONDS_PER_DAY;
        if !day.contains(&self.shift_start)
            || !day.contains(&self.shift_end)
            || self.shift_start > self.shift_end
        {
            return Err(ModelError::InvalidShift {
                start: self.shift_start,
                end: self.shift_end,
            });
        }
        if self.vehicle_count == 0 {
            return Err(ModelError::NoVehicles);
        }
        Ok(())
    }
}

/// A validated routing problem. Index 0 is always the depot.
#[derive(Debug, Clone)]
pub struct ProblemInstance {
    stops: Vec<Stop>,
    distances: Vec<Vec<i32>>,
    durations: Vec<Vec<i32>>,
    windows: Vec<TimeWindow>,
    demands: Vec<u32>,
    capacities: Vec<u32>,
    shift: TimeWindow,
    service_time: i32,
}

impl ProblemInstance {
    /// Assemble and validate a problem instance.
    ///
    /// Every structural violation (shape, negative cells, bad windows,
    /// missing depot) is rejected rather than degraded.
    pub fn new(
        stops: Vec<Stop>,
        distances: Vec<Vec<i32>>,
        durations: Vec<Vec<i32>>,
        windows: Vec<TimeWindow>,
        demands: Vec<u32>,
        config: &RoutingConfig,
    ) -> Result<Self, ModelError> {
        config.validate()?;

        let n = stops.len();
        if n == 0 {
            return Err(ModelError::NoStops);
        }
        let depots = stops.iter().filter(|stop| stop.role() == StopRole::Depot).count();
        if depots > 1 {
            return Err(ModelError::MultipleDepots(depots));
        }
        if stops[DEPOT].role() != StopRole::Depot {
            return Err(ModelError::MissingDepot);
        }

        validate_matrix("distance", &distances, n)?;
        validate_matrix("duration", &durations, n)?;
        check_len("window", n, windows.len())?;
        check_len("demand", n, demands.len())?;

        let shift = config.shift();
        for (index, window) in windows.iter().enumerate() {
            if window.start > window.end {
                return Err(ModelError::InvertedWindow {
                    index,
                    start: window.start,
                    end: window.end,
                });
            }
            if index != DEPOT && !window.intersects(&shift) {
                return Err(ModelError::WindowOutsideShift { index });
            }
        }

        Ok(Self {
            stops,
            distances,
            durations,
            windows,
            demands,
            capacities: vec![config.capacity.unwrap_or(u32::MAX); config.vehicle_count],
            shift,
            service_time: config.service_time,
        })
    }

    /// Replace the uniform fleet capacity with per-vehicle capacities.
    pub fn with_capacities(mut self, capacities: Vec<u32>) -> Result<Self, ModelError> {
        if capacities.is_empty() {
            return Err(ModelError::NoVehicles);
        }
        self.capacities = capacities;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop(&self, index: usize) -> &Stop {
        &self.stops[index]
    }

    /// Indices of every non-depot stop.
    pub fn customers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(|&index| index != DEPOT)
    }

    pub fn distance(&self, from: usize, to: usize) -> i32 {
        self.distances[from][to]
    }

    pub fn duration(&self, from: usize, to: usize) -> i32 {
        self.durations[from][to]
    }

    pub fn distances(&self) -> &[Vec<i32>] {
        &self.distances
    }

    pub fn durations(&self) -> &[Vec<i32>] {
        &self.durations
    }

    pub fn window(&self, index: usize) -> TimeWindow {
        self.windows[index]
    }

    pub fn demand(&self, index: usize) -> u32 {
        self.demands[index]
    }

    /// Whether any stop carries a non-zero demand.
    pub fn has_demand(&self) -> bool {
        self.demands.iter().any(|&demand| demand > 0)
    }

    pub fn vehicle_count(&self) -> usize {
        self.capacities.len()
    }

    pub fn capacity(&self, vehicle: usize) -> u32 {
        self.capacities[vehicle]
    }

    pub fn shift(&self) -> TimeWindow {
        self.shift
    }

    /// Service time spent at `index` (zero at the depot).
    pub fn service_at(&self, index: usize) -> i32 {
        if index == DEPOT { 0 } else { self.service_time }
    }

    /// Travel plus service time for leaving `from` towards `to`.
    pub fn arc_cost(&self, from: usize, to: usize) -> i32 {
        self.duration(from, to) + self.service_at(from)
    }
}

fn validate_matrix(name: &'static str, matrix: &[Vec<i32>], n: usize) -> Result<(), ModelError> {
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(ModelError::MatrixShape { name, expected: n });
    }
    for (from, row) in matrix.iter().enumerate() {
        for (to, &value) in row.iter().enumerate() {
            if value < 0 {
                return Err(ModelError::NegativeCell { name, from, to });
            }
            if from == to && value != 0 {
                return Err(ModelError::NonZeroDiagonal { name, index: from });
            }
        }
    }
    Ok(())
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<(), ModelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ModelError::LengthMismatch {
            name,
            expected,
            actual,
        })
    }
}
