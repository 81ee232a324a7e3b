//! Holdfast - offline-tolerant request orchestration
//!
//! This library sits in front of any network transport and adds request
//! deduplication, response caching, bounded retries and a persistent queue
//! for mutations issued while offline. Every execution resolves to an
//! [`outcome::Outcome`]; callers match on it instead of handling errors.
//!
//! # High-Level API
//!
//! For most use cases, the [`service`] module wires everything from a
//! configuration file:
//!
//! ```ignore
//! use holdfast::config::ConfigFile;
//! use holdfast::request::Request;
//! use holdfast::service::ServiceBuilder;
//! use holdfast::transport::TextDecoder;
//!
//! let service = ServiceBuilder::new(ConfigFile::load()?).build().await?;
//! let outcome = service.execute(Request::get("https://example.com/notes"), &TextDecoder).await;
//! ```
//!
//! # Lower-Level API
//!
//! The [`orchestrator::OrchestratorBuilder`] assembles an orchestrator from
//! explicit parts:
//!
//! ```
//! use holdfast::orchestrator::OrchestratorBuilder;
//! use holdfast::outcome::Outcome;
//! use holdfast::request::Request;
//! use holdfast::transport::mock::{MockReply, MockTransport};
//! use holdfast::transport::TextDecoder;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let transport = MockTransport::new().then(MockReply::ok("hello"));
//! let orchestrator = OrchestratorBuilder::new(Arc::new(transport)).build();
//!
//! let outcome: Outcome<String> = orchestrator.execute(Request::get("/greeting"), &TextDecoder).await;
//! match outcome {
//!     Outcome::Success(success) => assert_eq!(success.payload, "hello"),
//!     Outcome::Failure(failure) => panic!("{failure}"),
//! }
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod events;
pub mod logging;
pub mod orchestrator;
pub mod outcome;
pub mod queue;
pub mod request;
pub mod retry;
pub mod service;
pub mod storage;
pub mod time;
pub mod transport;

/// Version of the holdfast library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
