//! Library crate for the Application Insights firehose nozzle.

pub mod caching;
pub mod common;
pub mod config;
pub mod firehose;
pub mod insights;
pub mod logging;
pub mod nozzle;

// Re-export the types integration tests and the binary wire together
pub use common::error::{NozzleError, Result};
pub use nozzle::{Nozzle, NozzleExit, ShutdownSignal};
