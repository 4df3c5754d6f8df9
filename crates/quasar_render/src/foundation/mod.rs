//! Foundation module - core utilities shared by the renderer and engine
//!
//! - Time management
//! - Logging utilities

pub mod logging;
pub mod time;
