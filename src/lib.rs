//! Reactive front end for Redis-style stream commands.
//!
//! Callers push streams of typed commands (add, acknowledge, delete, group
//! management, length, range scans, trim and reads) into a
//! [`StreamCommandAdapter`](adapter::StreamCommandAdapter) and get back a stream
//! of results, one per command and in input order. Blocking reads are routed
//! to dedicated channels so they never stall the shared one.
//!
//! The crate ships an in-memory engine ([`memory`]) implementing the native
//! command set, which is what the demo binary and the tests run against.

pub mod adapter;
pub mod commands;
pub mod config;
pub mod connection;
pub mod memory;
pub mod native;
pub mod stream;
