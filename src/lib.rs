//! rtmp-auth: publish authorization for RTMP relays
//!
//! This library decides whether an RTMP publisher may start streaming and
//! keeps track of who currently holds each publishing slot:
//! - Credential registry keyed by application, stream name and key
//! - At most one granted publisher per application/stream name
//! - Crash-safe persistence of the whole registry to a single file
//! - Time-limited credentials reclaimed by a background sweeper
//! - Out-of-band revocation through the relay's control endpoint
//!
//! The HTTP surface (publish/unpublish callbacks, admin pages) is left to the
//! embedding application, which forwards requests to [`AuthService`].
//!
//! # Example
//!
//! ```no_run
//! use rtmp_auth::{AuthConfig, AuthService, AuthDenied};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AuthService::start(AuthConfig::default()).await?;
//!
//!     match service.publish("stream", "camera1", "secret-key").await {
//!         Ok(id) => println!("publish granted for {}", id),
//!         Err(rtmp_auth::Error::Denied(AuthDenied::Busy(_))) => println!("slot busy"),
//!         Err(e) => println!("publish denied: {} ({})", e, e.status_code()),
//!     }
//!
//!     service.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod expiry;
pub mod persist;
pub mod registry;
pub mod service;

// Re-export main types for convenience
pub use config::{AuthConfig, RetryPolicy};
pub use control::{ControlClient, DropOutcome};
pub use error::{ConfigError, ControlError, Error, Result, ValidationError};
pub use expiry::{parse_expiry, ExpirySweeper, SweepReport, SweeperHandle};
pub use registry::{AuthDenied, CredentialStore, Expiry, NewStream, StreamEntry, StreamId, StreamKey};
pub use service::{AddStreamRequest, AuthService};
