//! Core types and persistence for gleaner.
//!
//! This crate provides:
//! - Domain model for sources, jobs, crawled content and the published corpus
//! - SQLite store with migrations and guarded lifecycle updates
//! - Unified error types
//! - Layered configuration

pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::Store;
pub use store::hash::content_hash;
