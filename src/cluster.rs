//! Point clustering preprocessor.
//!
//! Nearby customer stops are merged into synthetic cluster stops with
//! average-linkage agglomerative clustering over great-circle distances.
//! The number of clusters follows from the radius threshold.

use tracing::debug;

use crate::haversine::distance_matrix_meters;
use crate::model::{Stop, StopRole, TimeWindow};

/// Longest merged display name / address kept on a cluster stop.
const MAX_LABEL_CHARS: usize = 80;

/// An input stop with the cluster it was assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStop {
    pub stop: Stop,
    /// `None` for stops that are never clustered (depot, checkpoints).
    pub cluster: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterResult {
    /// Depot and checkpoints untouched, plus one synthetic stop per cluster.
    pub stops: Vec<Stop>,
    pub labeled: Vec<LabeledStop>,
}

impl ClusterResult {
    pub fn cluster_count(&self) -> usize {
        self.stops
            .iter()
            .filter(|stop| stop.role() == StopRole::Cluster)
            .count()
    }

    /// Original stops that were merged into `cluster`.
    pub fn members(&self, cluster: usize) -> impl Iterator<Item = &Stop> + '_ {
        self.labeled
            .iter()
            .filter(move |labeled| labeled.cluster == Some(cluster))
            .map(|labeled| &labeled.stop)
    }

    /// Replace routed cluster stops with their member stops, keeping order.
    ///
    /// Only stops with the cluster role are expanded; any other id resolves
    /// to the original stop of that id.
    pub fn expand(&self, stop_ids: &[&str]) -> Vec<&Stop> {
        let mut expanded = Vec::new();
        for id in stop_ids {
            match self.cluster_of(id) {
                Some(cluster) => expanded.extend(self.members(cluster)),
                None => expanded.extend(
                    self.labeled
                        .iter()
                        .filter(|labeled| labeled.cluster.is_none() && labeled.stop.id == *id)
                        .map(|labeled| &labeled.stop),
                ),
            }
        }
        expanded
    }

    /// Cluster number of the routed stop `id`, if it is a cluster stop.
    ///
    /// Cluster stops are emitted in label order, so the k-th one is cluster k.
    fn cluster_of(&self, id: &str) -> Option<usize> {
        self.stops
            .iter()
            .filter(|stop| stop.role() == StopRole::Cluster)
            .position(|stop| stop.id == id)
    }
}

fn cluster_id(cluster: usize) -> String {
    format!("cluster-{cluster}")
}


/// Group clusterable stops lying within `radius_meters` of each other.
pub fn cluster_stops(stops: &[Stop], radius_meters: f64) -> ClusterResult {
    if stops.is_empty() {
        return ClusterResult::default();
    }

    let clusterable: Vec<usize> = stops
        .iter()
        .enumerate()
        .filter(|(_, stop)| stop.role().is_clusterable())
        .map(|(index, _)| index)
        .collect();

    let labels = if clusterable.len() < 2 {
        (0..clusterable.len()).collect()
    } else {
        let locations: Vec<(f64, f64)> =
            clusterable.iter().map(|&index| stops[index].location).collect();
        average_linkage(&distance_matrix_meters(&locations), radius_meters)
    };

    let mut assignment: Vec<Option<usize>> = vec![None; stops.len()];
    for (&index, &label) in clusterable.iter().zip(&labels) {
        assignment[index] = Some(label);
    }

    let labeled: Vec<LabeledStop> = stops
        .iter()
        .zip(&assignment)
        .map(|(stop, &cluster)| LabeledStop {
            stop: stop.clone(),
            cluster,
        })
        .collect();

    let mut emitted = vec![false; labels.iter().max().map_or(0, |max| max + 1)];
    let mut result_stops = Vec::new();
    for (stop, &cluster) in stops.iter().zip(&assignment) {
        match cluster {
            None => result_stops.push(stop.clone()),
            Some(cluster) if !emitted[cluster] => {
                emitted[cluster] = true;
                let members: Vec<&Stop> = stops
                    .iter()
                    .zip(&assignment)
                    .filter(|(_, assigned)| **assigned == Some(cluster))
                    .map(|(member, _)| member)
                    .collect();
                result_stops.push(merge(cluster, &members));
            }
            Some(_) => {}
        }
    }

    debug!(
        input = stops.len(),
        clusterable = clusterable.len(),
        clusters = emitted.len(),
        radius_meters,
        "clustered stops"
    );

    ClusterResult {
        stops: result_stops,
        labeled,
    }
}

/// Average-linkage agglomerative clustering with a distance threshold.
///
/// Clusters are merged while the closest pair is strictly nearer than
/// `threshold`. Returns one label per point; labels are numbered in order
/// of each cluster's first point.
pub fn average_linkage(distances: &[Vec<f64>], threshold: f64) -> Vec<usize> {
    let n = distances.len();
    let mut linkage: Vec<Vec<f64>> = distances.to_vec();
    let mut members: Vec<Option<Vec<usize>>> = (0..n).map(|index| Some(vec![index])).collect();

    loop {
        let mut closest: Option<(usize, usize, f64)> = None;
        for a in 0..n {
            if members[a].is_none() {
                continue;
            }
            for b in (a + 1)..n {
                if members[b].is_none() {
                    continue;
                }
                if closest.is_none_or(|(_, _, best)| linkage[a][b] < best) {
                    closest = Some((a, b, linkage[a][b]));
                }
            }
        }

        let Some((a, b, distance)) = closest else {
            break;
        };
        if distance >= threshold {
            break;
        }

        let size_a = members[a].as_ref().map_or(0, Vec::len) as f64;
        let size_b = members[b].as_ref().map_or(0, Vec::len) as f64;
        for k in 0..n {
            if k == a || k == b || members[k].is_none() {
                continue;
            }
            let merged = (size_a * linkage[a][k] + size_b * linkage[b][k]) / (size_a + size_b);
            linkage[a][k] = merged;
            linkage[k][a] = merged;
        }

        if let Some(absorbed) = members[b].take() {
            if let Some(target) = members[a].as_mut() {
                target.extend(absorbed);
            }
        }
    }

    let mut groups: Vec<Vec<usize>> = members.into_iter().flatten().collect();
    for group in &mut groups {
        group.sort_unstable();
    }
    groups.sort_by_key(|group| group.first().copied().unwrap_or(usize::MAX));

    let mut labels = vec![0; n];
    for (label, group) in groups.iter().enumerate() {
        for &point in group {
            labels[point] = label;
        }
    }
    labels
}

fn merge(cluster: usize, members: &[&Stop]) -> Stop {
    let count = members.len().max(1) as f64;
    let lat = members.iter().map(|stop| stop.location.0).sum::<f64>() / count;
    let lon = members.iter().map(|stop| stop.location.1).sum::<f64>() / count;

    let window = members
        .iter()
        .filter_map(|stop| stop.window)
        .reduce(|merged, window| {
            TimeWindow::new(merged.start.min(window.start), merged.end.max(window.end))
        });

    let mut stop = Stop::new(cluster_id(cluster), StopRole::Cluster, (lat, lon))
        .with_demand(members.iter().map(|stop| stop.demand).sum())
        .with_name(merged_label(members.iter().map(|stop| stop.name.as_str())))
        .with_address(merged_label(members.iter().map(|stop| stop.address.as_str())));
    stop.window = window;
    stop
}

fn merged_label<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined = parts.filter(|part| !part.is_empty()).collect::<Vec<_>>().join(", ");
    if joined.chars().count() <= MAX_LABEL_CHARS {
        return joined;
    }
    let mut truncated: String = joined.chars().take(MAX_LABEL_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}
