//! Business logic and service layer modules.
//!
//! Upstream access (FHIR, document downloads, the medicine catalogue) goes
//! through the shared resilient HTTP client; tools and sessions sit on top.

pub mod documents;
pub mod fhir_client;
pub mod formatting;
pub mod medicines;
pub mod metrics;
pub mod pdf;
pub mod resilient_client;
pub mod sessions;
pub mod tools;

pub use fhir_client::{FhirClient, SearchParams, operation_outcome};
pub use metrics::*;
pub use resilient_client::{
    ResilientClient, ResilientClientConfig, ResilientClientError, ResilientClientMetrics,
};
pub use sessions::SessionStore;
pub use tools::{ToolError, ToolExecutor};
