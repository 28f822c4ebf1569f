//! Sync engine: inbound event application, outbound queue, peer client

pub mod outbox;
pub mod peer;
pub mod receiver;
