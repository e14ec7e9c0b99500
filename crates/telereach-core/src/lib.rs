//! Core domain + application logic for telereach.
//!
//! This crate is intentionally framework-agnostic. The wire-protocol
//! client lives behind ports (traits) in [`platform`], implemented by an
//! adapter crate; verification codes and 2FA passwords come from
//! caller-supplied sources so any front end can drive a login.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod platform;
pub mod queue;
pub mod registry;
pub mod roster;
pub mod sessions;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
