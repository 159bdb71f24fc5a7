//! # Rastro Common Library
//!
//! Shared code for the Rastro package tracker:
//! - Database initialization and models
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
