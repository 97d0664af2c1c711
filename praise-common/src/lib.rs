//! # Praise Common Library
//!
//! Shared code for the Praise quantification service:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Database initialization and data models
//! - Typed settings with period-scoped overrides
//! - Audit event log

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod settings;
pub mod time;

pub use error::{Error, Result};
