//! Active rendering systems
//!
//! Stateful systems that drive the backend: the lighting context with its
//! shadow and lighting passes, and skybox rendering.

pub mod lighting;
pub mod skybox;
