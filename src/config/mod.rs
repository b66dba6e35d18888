//! Configuration structures and loading utilities.
//!
//! Every structure reads its values from environment variables through a
//! `from_env()` constructor and falls back to the documented defaults.

pub mod fhir;
pub mod medicines;
pub mod metrics;
pub mod resilient_client;
pub mod server;

pub use fhir::*;
pub use medicines::*;
pub use metrics::*;
pub use server::*;
