//! # Amity Common Library
//!
//! Shared code for the Amity sync service including:
//! - Database schema and models
//! - Sync wire types (events, mapping actions, push responses)
//! - HMAC request signing and verification
//! - Configuration loading
//! - Error types

pub mod api;
pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
