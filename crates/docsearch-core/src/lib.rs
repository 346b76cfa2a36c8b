//! docsearch-core
//!
//! Domain types, collaborator traits, error taxonomy, configuration,
//! similarity ranking and operation telemetry shared by every other crate.

pub mod config;
pub mod error;
pub mod loader;
pub mod response;
pub mod similarity;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use error::{Error, GenerationError, OperationError, StoreError};
pub use telemetry::{OperationTimer, SearchOperation, Strategy};
