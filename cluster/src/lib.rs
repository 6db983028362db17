//! Event vectors, IDF weighting, pure-numeric HDBSCAN, and the clustering
//! orchestration/labeling pipeline (spec.md §4.5-§4.7).

pub mod event_vector;
pub mod families;
pub mod hdbscan;
pub mod idf;
pub mod orchestration;
pub mod prompts;

pub use families::RelationFamily;
pub use hdbscan::{HdbscanParams, HdbscanResult};
pub use orchestration::{run_full_pipeline, ClusteringReport};
