//! Sync protocol: request authentication and wire types

pub mod auth;
pub mod types;
