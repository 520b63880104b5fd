//! Cluster API access

pub mod api;
pub mod kubectl;
pub mod models;

pub use api::{ClusterApi, Endpoint, ObjectKind, PodPhase, PodSummary};
pub use kubectl::KubectlCluster;
