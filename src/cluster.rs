//! Grouping of near-equivalent items.
//!
//! Two methods are available:
//!
//! - **Threshold**: union-find over the graph with an edge wherever
//!   `sim(i, j) >= threshold`. Produces a hard partition (connected components).
//! - **Hierarchical**: agglomerative clustering on `distance = 1 - similarity`.
//!   Linkage defaults to average (UPGMA); complete and single are available.
//!   The merge loop stops at a fixed number of clusters or once the closest
//!   pair is farther apart than a distance cut. Ties merge the pair with the
//!   lowest cluster indices first.
//!
//! Clusters are returned ordered by their lowest member position.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::model::{Cluster, Item};
use crate::similarity::SimilarityMatrix;

/// Default similarity threshold for the threshold method.
pub const DEFAULT_CLUSTER_THRESHOLD: f32 = 0.8;

fn default_cluster_threshold() -> f32 {
    DEFAULT_CLUSTER_THRESHOLD
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    #[default]
    Average,
    Complete,
    Single,
}

/// Where to stop merging.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchicalCut {
    /// Stop once this many clusters remain.
    Clusters(usize),
    /// Stop once the closest pair is farther apart than this distance.
    Distance(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ClusterMethod {
    Threshold {
        #[serde(default = "default_cluster_threshold")]
        threshold: f32,
    },
    Hierarchical {
        #[serde(default)]
        linkage: Linkage,
        cut: HierarchicalCut,
    },
}

impl Default for ClusterMethod {
    fn default() -> Self {
        Self::Threshold {
            threshold: DEFAULT_CLUSTER_THRESHOLD,
        }
    }
}

/// Cluster `items` using the similarities in `matrix`.
pub fn cluster(
    matrix: &SimilarityMatrix,
    items: &[Item],
    method: &ClusterMethod,
) -> Result<Vec<Cluster>, ValidationError> {
    if matrix.len() != items.len() {
        return Err(ValidationError::MatrixSize {
            expected: items.len(),
            got: matrix.len(),
        });
    }
    if items.is_empty() {
        return Ok(vec![]);
    }

    let groups = match *method {
        ClusterMethod::Threshold { threshold } => threshold_groups(matrix, threshold),
        ClusterMethod::Hierarchical { linkage, cut } => {
            validate_cut(&cut)?;
            hierarchical_groups(matrix, linkage, cut)
        }
    };

    log::debug!("clustered {} items into {} clusters", items.len(), groups.len());

    Ok(build_clusters(matrix, items, groups))
}

pub(crate) fn validate_cut(cut: &HierarchicalCut) -> Result<(), ValidationError> {
    match *cut {
        HierarchicalCut::Clusters(0) => Err(ValidationError::InvalidCut(
            "cluster count must be at least 1".to_string(),
        )),
        HierarchicalCut::Distance(d) if !(0.0..=2.0).contains(&d) => Err(
            ValidationError::InvalidCut(format!("distance must be within [0, 2], got {d}")),
        ),
        _ => Ok(()),
    }
}

/// Disjoint-set forest with path compression and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
    }
}

fn threshold_groups(matrix: &SimilarityMatrix, threshold: f32) -> Vec<Vec<usize>> {
    let size = matrix.len();
    let mut sets = UnionFind::new(size);

    for i in 0..size {
        for j in (i + 1)..size {
            if matrix.get(i, j) >= threshold {
                sets.union(i, j);
            }
        }
    }

    // Groups are numbered in order of their first position.
    let mut by_root: BTreeMap<usize, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for position in 0..size {
        let root = sets.find(position);
        let slot = *by_root.entry(root).or_insert_with(|| {
            groups.push(vec![]);
            groups.len() - 1
        });
        groups[slot].push(position);
    }

    groups
}

fn hierarchical_groups(
    matrix: &SimilarityMatrix,
    linkage: Linkage,
    cut: HierarchicalCut,
) -> Vec<Vec<usize>> {
    let size = matrix.len();
    let mut distance: Vec<Vec<f64>> = (0..size)
        .map(|i| (0..size).map(|j| 1.0 - matrix.get(i, j) as f64).collect())
        .collect();
    let mut members: Vec<Vec<usize>> = (0..size).map(|i| vec![i]).collect();
    let mut active = vec![true; size];

    let target = match cut {
        HierarchicalCut::Clusters(count) => count.min(size),
        HierarchicalCut::Distance(_) => 1,
    };

    let mut remaining = size;
    while remaining > target {
        let Some((a, b, closest)) = closest_pair(&distance, &active) else {
            break;
        };
        if let HierarchicalCut::Distance(limit) = cut {
            if closest > limit as f64 {
                break;
            }
        }

        let size_a = members[a].len() as f64;
        let size_b = members[b].len() as f64;
        for k in 0..size {
            if !active[k] || k == a || k == b {
                continue;
            }
            let merged = match linkage {
                Linkage::Average => {
                    (size_a * distance[a][k] + size_b * distance[b][k]) / (size_a + size_b)
                }
                Linkage::Complete => distance[a][k].max(distance[b][k]),
                Linkage::Single => distance[a][k].min(distance[b][k]),
            };
            distance[a][k] = merged;
            distance[k][a] = merged;
        }

        let absorbed = std::mem::take(&mut members[b]);
        members[a].extend(absorbed);
        active[b] = false;
        remaining -= 1;
    }

    let mut groups: Vec<Vec<usize>> = members
        .into_iter()
        .zip(active)
        .filter(|(_, is_active)| *is_active)
        .map(|(mut group, _)| {
            group.sort_unstable();
            group
        })
        .collect();
    groups.sort_by_key(|group| group[0]);
    groups
}

fn closest_pair(distance: &[Vec<f64>], active: &[bool]) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for a in 0..distance.len() {
        if !active[a] {
            continue;
        }
        for b in (a + 1)..distance.len() {
            if !active[b] {
                continue;
            }
            let d = distance[a][b];
            if best.map_or(true, |(_, _, current)| d < current) {
                best = Some((a, b, d));
            }
        }
    }
    best
}

fn build_clusters(
    matrix: &SimilarityMatrix,
    items: &[Item],
    groups: Vec<Vec<usize>>,
) -> Vec<Cluster> {
    groups
        .into_iter()
        .enumerate()
        .map(|(id, positions)| Cluster {
            id,
            members: positions.iter().map(|&p| items[p].key()).collect(),
            mean_similarity: mean_pairwise(matrix, &positions),
            positions,
        })
        .collect()
}

fn mean_pairwise(matrix: &SimilarityMatrix, positions: &[usize]) -> f32 {
    if positions.len() < 2 {
        return 1.0;
    }

    let mut total = 0.0f64;
    let mut count = 0usize;
    for (n, &i) in positions.iter().enumerate() {
        for &j in &positions[n + 1..] {
            total += matrix.get(i, j) as f64;
            count += 1;
        }
    }
    (total / count as f64) as f32
}
