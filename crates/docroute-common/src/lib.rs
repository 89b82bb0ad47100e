//! docroute common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling, checksum and logging utilities for the docroute workspace.
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Checksums**: content hashing used for object integrity tags
//! - **Logging**: tracing subscriber setup driven by `LOG_*` environment variables
//!
//! # Example
//!
//! ```no_run
//! use docroute_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> docroute_common::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
