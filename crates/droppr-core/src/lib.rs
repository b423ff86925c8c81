//! droppr Core - Shared types, configuration and errors
//!
//! This crate contains the foundational types used by the droppr signal relay.
//! It has no dependencies on networking code.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, RelayConfig, ServerConfig};
pub use error::*;
pub use types::*;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5050;

/// Default request path for signal channel upgrades
pub const DEFAULT_SIGNAL_PATH: &str = "/sc";

/// Maximum frame size accepted by default (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
