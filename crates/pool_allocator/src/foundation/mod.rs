//! Foundation module - Core utilities shared by the allocator and its backends
//!
//! - Logging utilities

pub mod logging;
