//! Core domain types, error taxonomy, and provider-facing traits shared by
//! every crate in the newsgraph workspace.

pub mod chunking;
pub mod domain;
pub mod edge_id;
pub mod error;
pub mod traits;

pub use error::{CoreError, Result};
