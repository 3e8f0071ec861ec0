//! netimpair common library
//!
//! Shared error types used by the `netimpair` and `tunbridge` binaries.

pub mod error;

pub use error::{Error, Result};

/// netimpair version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
