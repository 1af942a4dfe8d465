//! Utility functions and helpers for the restgate gateway.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and header sanitization.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
