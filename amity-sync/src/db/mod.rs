//! Database query layer for the sync service

pub mod conflicts;
pub mod connections;
pub mod links;
pub mod moments;
pub mod pairing;
pub mod people;
pub mod remote_cache;
