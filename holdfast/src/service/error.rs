//! Service error types.

use crate::config::ConfigFileError;
use crate::orchestrator::ReplayError;
use crate::storage::StorageError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors that can occur while assembling or driving a service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigFileError),

    /// A persistent store could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The default HTTP transport could not be created
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Queue replay could not run
    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    /// Operation needs a component the configuration disabled
    #[error("Component not configured: {0}")]
    NotConfigured(&'static str),
}
