//! Relay control plane
//!
//! Best-effort revocation of a running publisher. Every failure here is
//! reported to the caller but never undoes the registry change that led to
//! the revocation (block, remove, expiry).

pub mod client;
mod retry;

pub use client::{ControlClient, DropOutcome};
