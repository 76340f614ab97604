//! Core utilities for the engine.
//!
//! This crate provides foundational types and utilities used across the engine:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing and frame-rate counting
//! - Configuration management

mod config;
mod error;
mod logging;
mod timer;

pub use config::{DEBUG_ENV_VAR, EngineConfig};
pub use error::{Error, Result};
pub use logging::{default_filter, init_logging};
pub use timer::{FrameRateCounter, Timer, fps_title};
