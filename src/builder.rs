//! Assembles a [`ProblemInstance`] from stops and a distance provider.

use tracing::{debug, warn};

use crate::error::{DataWarning, ModelError, Recovered};
use crate::model::{ProblemInstance, RoutingConfig, Stop, StopRole, TimeWindow};
use crate::traits::{DistanceMatrixProvider, MatrixSource};

/// A built problem plus every data-quality issue recovered on the way.
#[derive(Debug, Clone)]
pub struct ProblemBuild {
    pub problem: ProblemInstance,
    pub warnings: Vec<DataWarning>,
    pub source: MatrixSource,
}

#[derive(Debug, Clone, Default)]
pub struct ProblemBuilder {
    config: RoutingConfig,
}

impl ProblemBuilder {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Build a problem instance from `stops`.
    ///
    /// The depot is moved to index 0; the other stops keep their order.
    /// `provider` is queried exactly once with every stop's coordinates.
    pub fn build<P>(&self, stops: &[Stop], provider: &P) -> Result<ProblemBuild, ModelError>
    where
        P: DistanceMatrixProvider + ?Sized,
    {
        self.config.validate()?;
        if stops.is_empty() {
            return Err(ModelError::NoStops);
        }

        let ordered = depot_first(stops)?;
        let mut warnings = Vec::new();

        let shift = self.config.shift();
        let mut windows = Vec::with_capacity(ordered.len());
        let mut demands = Vec::with_capacity(ordered.len());
        for stop in &ordered {
            if stop.role() == StopRole::Depot {
                windows.push(shift);
                demands.push(0);
                continue;
            }
            let (window, warning) = expand_window(stop, &self.config).into_parts();
            if let Some(warning) = warning {
                warn!(stop = %stop.id, %warning, "time window replaced by shift");
                warnings.push(warning);
            }
            windows.push(window);
            demands.push(stop.demand);
        }

        let locations: Vec<(f64, f64)> = ordered.iter().map(|stop| stop.location).collect();
        let matrices = provider.matrices_for(&locations);
        if let MatrixSource::Fallback { reason: Some(reason) } = &matrices.source {
            warnings.push(DataWarning::ProviderFallback {
                reason: reason.clone(),
            });
        }
        debug!(
            stops = ordered.len(),
            source = ?matrices.source,
            warnings = warnings.len(),
            "built routing problem"
        );

        let problem = ProblemInstance::new(
            ordered,
            matrices.distances,
            matrices.durations,
            windows,
            demands,
            &self.config,
        )?;

        Ok(ProblemBuild {
            problem,
            warnings,
            source: matrices.source,
        })
    }
}

/// Expand a stop's requested window by the configured margin.
///
/// Stops without a usable window, or whose window misses the shift
/// entirely, get the full shift window instead.
pub fn expand_window(stop: &Stop, config: &RoutingConfig) -> Recovered<TimeWindow> {
    let shift = config.shift();
    let Some(requested) = stop.window else {
        return Recovered::Clean(shift);
    };

    let expanded = requested.expand(config.margin);
    if expanded.intersects(&shift) {
        Recovered::Clean(expanded)
    } else {
        Recovered::Defaulted {
            value: shift,
            warning: DataWarning::WindowOutsideShift {
                stop_id: stop.id.clone(),
            },
        }
    }
}

fn depot_first(stops: &[Stop]) -> Result<Vec<Stop>, ModelError> {
    let depots: Vec<usize> = stops
        .iter()
        .enumerate()
        .filter(|(_, stop)| stop.role() == StopRole::Depot)
        .map(|(index, _)| index)
        .collect();

    let depot = match depots.as_slice() {
        [] => return Err(ModelError::MissingDepot),
        [depot] => *depot,
        many => return Err(ModelError::MultipleDepots(many.len())),
    };

    let mut ordered = Vec::with_capacity(stops.len());
    ordered.push(stops[depot].clone());
    ordered.extend(
        stops
            .iter()
            .enumerate()
            .filter(|&(index, _)| index != depot)
            .map(|(_, stop)| stop.clone()),
    );
    Ok(ordered)
}
