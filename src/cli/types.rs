use clap::{Args as ClapArgs, ValueEnum};

use harmonise::{ClusterMethod, CrosswalkOptions, HierarchicalCut, Linkage};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterKind {
    /// Connected components of the graph of pairs at or above --threshold
    Threshold,
    /// Agglomerative clustering cut at --clusters or --distance
    Hierarchical,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkageArg {
    Average,
    Complete,
    Single,
}

impl From<LinkageArg> for Linkage {
    fn from(value: LinkageArg) -> Self {
        match value {
            LinkageArg::Average => Linkage::Average,
            LinkageArg::Complete => Linkage::Complete,
            LinkageArg::Single => Linkage::Single,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ClusterArgs {
    /// Group items into clusters
    #[clap(long, value_enum)]
    pub cluster: Option<ClusterKind>,

    /// Similarity threshold for threshold clustering
    /// (defaults to matching.cluster_threshold from config.yaml)
    #[clap(long, allow_hyphen_values = true)]
    pub threshold: Option<f32>,

    /// Stop merging once this many clusters remain
    #[clap(long, conflicts_with = "distance")]
    pub clusters: Option<usize>,

    /// Stop merging once clusters are farther apart than this (1 - similarity)
    #[clap(long)]
    pub distance: Option<f32>,

    /// Linkage rule for hierarchical clustering
    #[clap(long, value_enum, default_value = "average")]
    pub linkage: LinkageArg,
}

impl ClusterArgs {
    pub fn method(&self, default_threshold: f32) -> anyhow::Result<Option<ClusterMethod>> {
        let Some(kind) = self.cluster else {
            return Ok(None);
        };

        let method = match kind {
            ClusterKind::Threshold => ClusterMethod::Threshold {
                threshold: self.threshold.unwrap_or(default_threshold),
            },
            ClusterKind::Hierarchical => {
                let cut = match (self.clusters, self.distance) {
                    (Some(n), _) => HierarchicalCut::Clusters(n),
                    (None, Some(d)) => HierarchicalCut::Distance(d),
                    (None, None) => {
                        anyhow::bail!("hierarchical clustering needs --clusters or --distance")
                    }
                };
                ClusterMethod::Hierarchical {
                    linkage: self.linkage.into(),
                    cut,
                }
            }
        };

        Ok(Some(method))
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CrosswalkArgs {
    /// Build a one-to-one crosswalk from pairs scoring at least this much
    #[clap(long, num_args = 0..=1, default_missing_value = "0.5")]
    pub crosswalk: Option<f32>,

    /// Let the crosswalk pair items of the same instrument
    #[clap(long, default_value = "false", requires = "crosswalk")]
    pub allow_within: bool,
}

impl CrosswalkArgs {
    pub fn options(&self) -> Option<CrosswalkOptions> {
        self.crosswalk.map(|threshold| CrosswalkOptions {
            threshold,
            allow_within_instrument: self.allow_within,
        })
    }
}
