//! Core domain types for Argus.
//!
//! Everything that crosses the wire between the sidecar and the backend
//! lives here, together with the error enums shared by both processes.

pub mod error;
pub mod mode;
pub mod protocol;

pub use error::{AiError, AnalyzerError, StoreError};
pub use mode::SecurityMode;
pub use protocol::{AnalysisRequest, AnalysisResponse, Project};
