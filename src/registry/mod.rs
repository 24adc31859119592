//! Credential registry
//!
//! The registry holds every publishing credential and decides who may
//! publish. Records are grouped by their (application, name) slot; several
//! records may share a slot (rotated keys), but at most one of them is
//! granted at a time.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<CredentialStore>
//!                 ┌───────────────────────────┐
//!                 │ RwLock<RegistryState {    │
//!                 │   secret, control_url,    │
//!                 │   streams: Vec<Entry>     │
//!                 │ }>                        │──► state file (atomic rename)
//!                 └─────────────┬─────────────┘
//!                               │
//!         ┌─────────────────────┼─────────────────────┐
//!         │                     │                     │
//!         ▼                     ▼                     ▼
//!   publish/unpublish     admin add/remove/      ExpirySweeper
//!   (read: auth,          block (write)          (read: scan,
//!    write: activate)                             write: remove)
//! ```
//!
//! # Authorization
//!
//! The first record matching application, name and key decides:
//! blocked → [`AuthDenied::Blocked`]; already active → granted; another
//! record on the slot active → [`AuthDenied::Busy`]; otherwise granted.

pub mod entry;
pub mod error;
pub mod state;
pub mod store;

pub use entry::{Expiry, NewStream, StreamEntry, StreamId, StreamKey};
pub use error::AuthDenied;
pub use state::{RegistryState, Secret, SECRET_LEN};
pub use store::CredentialStore;
