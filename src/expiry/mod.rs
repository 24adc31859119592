//! Time-limited credentials
//!
//! [`parse_expiry`] turns admin input into an [`crate::Expiry`];
//! [`ExpirySweeper`] reclaims records once that time has passed.

pub mod parse;
pub mod sweeper;

pub use parse::{parse_expiry, parse_expiry_at};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperHandle};
