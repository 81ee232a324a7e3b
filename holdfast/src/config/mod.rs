//! Configuration file for holdfast clients.
//!
//! The INI file at `~/.holdfast/config.ini` groups settings by concern:
//!
//! - `[client]` timeout, `[headers]` default headers
//! - `[retry]`, `[cache]`, `[dedup]` request pipeline behaviour
//! - `[queue]` offline queue storage and replay
//! - `[connectivity]` probing
//! - `[logging]` log destination
//!
//! Missing files and missing keys fall back to defaults.
//!
//! # Example
//!
//! ```
//! use holdfast::config::{ConfigFile, StorageKind};
//!
//! let mut config = ConfigFile::default();
//! config.queue.storage = StorageKind::Disabled;
//!
//! let orchestrator_config = config.to_orchestrator_config();
//! assert!(orchestrator_config.dedup_enabled);
//! ```

mod convert;
mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::ConfigFileError;
pub use settings::{
    CacheSettings, ClientSettings, ConfigFile, ConnectivitySettings, DedupSettings,
    LoggingSettings, ProbeKind, QueueSettings, RetryKind, RetrySettings, StorageKind,
};
