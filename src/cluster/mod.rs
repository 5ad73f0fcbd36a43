//! Incremental clustering: running statistics, the cluster registry with
//! its adaptive acceptance threshold, and the online control algorithm.

mod manager;
mod stats;
mod store;

pub use manager::{Admission, ClusterManager};
pub use stats::SimilarityStats;
pub use store::{Cluster, ClusterStore, ThresholdPolicy};
