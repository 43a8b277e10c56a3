//! trxcon configuration management
//!
//! This crate provides configuration loading and parsing for trxcon:
//! - TOML configuration file parsing
//! - Stack configuration structures and validation
//! - Runtime state shared between entities

pub mod stack_config;
pub mod toml_config;

pub use stack_config::*;
pub use toml_config::*;
