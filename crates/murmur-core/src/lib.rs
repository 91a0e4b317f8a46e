//! # murmur-core
//!
//! Foundation types and utilities for the murmur relay.
//!
//! This crate provides the shared vocabulary the other murmur crates depend on:
//!
//! - **Branded IDs**: [`ids::SubscriberId`], [`ids::PeerId`] as newtypes
//! - **Text**: [`text::sanitize_line`] (strip markup, escape the rest) and
//!   [`text::display_name`] (peer identifier → wire-safe sender name)
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber
//! - **Constants**: protocol limits shared by server and client
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other murmur crates.

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;
pub mod text;
