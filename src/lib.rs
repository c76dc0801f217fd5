//! Set-associative cache storage with line-granular lookup, install and
//! FIFO victim selection, plus a word-granular controller and trace codec
//! for driving it.

pub mod backing;
pub mod cache_line;
pub mod cache_store;
pub mod config;
pub mod controller;
pub mod error;
pub mod memory_access;
pub mod replay;
pub mod stats;

pub use cache_line::CacheLine;
pub use cache_store::{AddressLayout, CacheStore};
pub use config::CacheConfig;
pub use controller::{Access, CacheController};
pub use error::{AccessError, ConfigError};
