//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every core crate:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Other crates depend on this one for the `CoreConfig` they are built from,
//! the `EventBus` they publish state transitions on, and the logging
//! conventions they follow.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
