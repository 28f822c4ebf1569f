//! Database access layer shared across the sync service

pub mod init;
pub mod models;

pub use init::init_database;
