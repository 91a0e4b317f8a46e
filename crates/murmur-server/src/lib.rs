//! Network surfaces of the murmur relay.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `config` | Runtime configuration shared by both surfaces |
//! | `transport` | Listener/stream traits plus the TCP implementation |
//! | `session` | Per-connection read, moderate, publish, reply loop |
//! | `gateway` | HTTP push-stream endpoint over the broadcaster |
//!
//! ## Data Flow
//!
//! `session` reads lines from writers, runs them through the moderation
//! pipeline, and publishes accepted lines to the broadcaster. `gateway`
//! attaches HTTP readers as broadcaster subscribers and streams their
//! inboxes out as server-sent events.

#![deny(unsafe_code)]

pub mod config;
pub mod gateway;
pub mod session;
pub mod transport;
