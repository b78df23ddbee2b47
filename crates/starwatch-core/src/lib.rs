//! # Starwatch Core
//! Shared error type, configuration, domain types, and the traits every
//! adapter implements.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::StarwatchConfig;
pub use error::{Result, StarwatchError};
