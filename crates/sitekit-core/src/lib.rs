//! Sitekit Core - Shared error handling and constants

pub mod constants;
pub mod error;

pub use constants::*;
pub use error::{Error, Result};
