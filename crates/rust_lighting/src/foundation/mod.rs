//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and operations
//! - Byte colors and their linear float counterparts
//! - Logging utilities

pub mod color;
pub mod logging;
pub mod math;
