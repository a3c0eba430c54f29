//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `core-content`, `core-playback`).
//! Host applications can depend on `tilawa-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "content")]
pub use core_content;

#[cfg(feature = "playback")]
pub use core_playback;
