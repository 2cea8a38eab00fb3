//! wab-core: shared building blocks for wa-bridge
//!
//! Holds the runtime configuration and the error type used while
//! loading it. Channel and NLU crates receive a built [`Config`]
//! instead of reading the process environment themselves.

pub mod config;
pub mod error;

pub use config::{Config, DialogflowConfig, ServerConfig, TwilioConfig};
pub use error::{Error, Result};
