//! Stateless presentation façade over the newsgraph core (spec.md §6),
//! plus the layered configuration loader its CLI binary wires up from.

pub mod cli;
pub mod config;
pub mod facade;

pub use config::NewsGraphConfig;
pub use facade::{ConceptMatch, NewsGraphService};
