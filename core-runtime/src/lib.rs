//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the offline shell cache:
//! - Logging and tracing infrastructure
//! - Configuration management (`OfflineConfig`)
//! - Event bus system
//!
//! ## Overview
//!
//! `core-offline` builds on this crate for its configuration object, its
//! logging conventions, and the broadcast channel it reports lifecycle, cache
//! and sync activity on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
