//! Business logic services
//!
//! This module contains business logic separated from HTTP concerns.
//! The settings form is pure and synchronous; the session drives the
//! device API through the `RavenApi` trait so it can be tested without a
//! network.

pub mod session;
pub mod settings;
