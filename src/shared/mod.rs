//! Utilities shared across hookrun modules

pub mod glob;
