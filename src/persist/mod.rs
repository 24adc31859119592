//! Durable registry persistence
//!
//! The whole registry (secret, control URL and every credential record) is
//! stored as one binary blob. Each successful registry mutation rewrites the
//! file once, through a temporary file and an atomic rename.

pub mod codec;
pub mod file;

pub use codec::{decode, encode, StateDecoder, StateEncoder};
pub use file::{load, save};
