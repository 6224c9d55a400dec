//! Configuration module for Statwalker
//!
//! Provides CLI argument parsing and the validated runtime configuration.

mod settings;

pub use settings::*;
