//! High-level service facade for holdfast.
//!
//! This module wires every component from a [`ConfigFile`](crate::config::ConfigFile)
//! and owns the background tasks (probing, sweeps, event logging and auto
//! replay), following the Facade pattern.
//!
//! # Example
//!
//! ```ignore
//! use holdfast::config::ConfigFile;
//! use holdfast::service::ServiceBuilder;
//!
//! let service = ServiceBuilder::new(ConfigFile::load()?).build().await?;
//! let summary = service.replay_queue().await?;
//! service.shutdown().await;
//! ```

mod builder;
mod error;
mod facade;

pub use builder::{create_cache_store, create_monitor, create_queue, ServiceBuilder};
pub use error::ServiceError;
pub use facade::HoldfastService;
