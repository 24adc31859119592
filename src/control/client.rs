//! Relay control client
//!
//! Asks the relay to disconnect the current publisher of an app/name through
//! `GET <control-url>/control/drop/publisher?app=..&name=..`.

use std::time::Duration;

use crate::config::{AuthConfig, RetryPolicy};
use crate::error::{ControlError, Error, Result};
use crate::registry::{CredentialStore, StreamId, StreamKey};

use super::retry::compute_backoff;

/// Path of the relay's drop-publisher endpoint
const DROP_PUBLISHER_PATH: &str = "/control/drop/publisher";

/// Result of a revocation that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Relay confirmed the drop and the registry was updated
    Dropped,
    /// No control URL configured, nothing was sent
    Disabled,
}

/// Client for the relay's control endpoint
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: reqwest::Client,
    retry: RetryPolicy,
}

impl ControlClient {
    /// Create a client with the given request timeout and retry policy
    ///
    /// The relay control endpoint is an internal address, system proxies are
    /// not used.
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self { http, retry })
    }

    /// Create a client from service configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        Self::new(config.control_timeout, config.control_retry.clone())
    }

    /// Drop the relay publisher that was granted through record `id`
    ///
    /// Nothing is sent when the record is not active, or when another record
    /// on the same app/name holds the grant (that publisher was let in after
    /// this credential lost access). On a 200 answer every record on the
    /// app/name is marked inactive.
    pub async fn drop_publisher(
        &self,
        store: &CredentialStore,
        id: &StreamId,
    ) -> std::result::Result<DropOutcome, ControlError> {
        let target = store
            .read(|state| {
                let Some(base) = state.control_url() else {
                    return Ok(None);
                };
                let stream = state.get(id).ok_or_else(|| ControlError::NotFound(id.clone()))?;
                if !stream.active {
                    return Err(ControlError::NotActive(id.clone()));
                }
                if state.has_active(&stream.app, &stream.name, Some(id)) {
                    return Err(ControlError::Superseded {
                        id: id.clone(),
                        stream: stream.key(),
                    });
                }
                Ok(Some((base.to_string(), stream.key())))
            })
            .await?;

        let Some((base, key)) = target else {
            tracing::debug!(id = %id, "Control URL not set, not dropping publisher");
            return Ok(DropOutcome::Disabled);
        };

        let status = self.send_drop(&base, &key).await?;
        if status != 200 {
            return Err(ControlError::Denied { status });
        }

        tracing::info!(id = %id, stream = %key, "Dropped publisher");

        // The relay will not send an unpublish for a dropped publisher
        if let Err(e) = store.set_inactive(&key.app, &key.name).await {
            tracing::warn!(id = %id, stream = %key, error = %e, "Failed to reconcile after drop");
        }

        Ok(DropOutcome::Dropped)
    }

    /// Send the drop request, retrying transport failures
    async fn send_drop(&self, base: &str, key: &StreamKey) -> std::result::Result<u16, ControlError> {
        let url = drop_url(base);
        let mut attempt = 0;

        loop {
            let result = self
                .http
                .get(&url)
                .query(&[("app", key.app.as_str()), ("name", key.name.as_str())])
                .send()
                .await;

            match result {
                Ok(response) => return Ok(response.status().as_u16()),
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = compute_backoff(&self.retry, attempt);
                    tracing::debug!(
                        stream = %key,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Control request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(ControlError::Unreachable(e)),
            }
        }
    }
}

/// Log a revocation outcome at a level matching its severity
pub(crate) fn log_drop_result(id: &StreamId, result: &std::result::Result<DropOutcome, ControlError>) {
    match result {
        Ok(_) => {}
        Err(e) if e.is_not_applicable() => {
            tracing::debug!(id = %id, reason = %e, "Publisher not dropped");
        }
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Failed to drop publisher");
        }
    }
}

fn drop_url(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), DROP_PUBLISHER_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{NewStream, RegistryState};

    fn client() -> ControlClient {
        ControlClient::new(Duration::from_millis(200), RetryPolicy::none()).unwrap()
    }

    fn state_with_active(control_url: &str) -> (RegistryState, StreamId, StreamId) {
        let mut state = RegistryState::new();
        state.control_url = control_url.to_string();
        let first = state.insert(NewStream::new("live", "s1", "k1"));
        let second = state.insert(NewStream::new("live", "s1", "k2"));
        state.get_mut(&first).unwrap().active = true;
        (state, first, second)
    }

    fn store_with_active(control_url: &str) -> (CredentialStore, StreamId, StreamId) {
        // Nothing in these tests reaches a write, so the path is never created
        let (state, first, second) = state_with_active(control_url);
        let path = std::env::temp_dir().join("rtmp-auth-unused").join("store.db");
        (CredentialStore::with_state(path, state), first, second)
    }

    #[test]
    fn test_drop_url() {
        assert_eq!(drop_url("http://relay:8080"), "http://relay:8080/control/drop/publisher");
        assert_eq!(drop_url("http://relay:8080/"), "http://relay:8080/control/drop/publisher");
    }

    #[tokio::test]
    async fn test_disabled_without_control_url() {
        let (store, first, _) = store_with_active("");
        let outcome = client().drop_publisher(&store, &first).await.unwrap();
        assert_eq!(outcome, DropOutcome::Disabled);
        assert!(store.get_stream(&first).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (store, _, _) = store_with_active("http://127.0.0.1:9");
        let err = client()
            .drop_publisher(&store, &StreamId::from("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_inactive_record_not_dropped() {
        let (store, _, second) = store_with_active("http://127.0.0.1:9");
        let err = client().drop_publisher(&store, &second).await.unwrap_err();
        assert!(matches!(err, ControlError::NotActive(_)));
    }

    #[tokio::test]
    async fn test_superseded_by_other_active() {
        let (mut state, first, second) = state_with_active("http://127.0.0.1:9");
        state.get_mut(&second).unwrap().active = true;
        let store = CredentialStore::with_state("unused/store.db", state);

        let err = client().drop_publisher(&store, &first).await.unwrap_err();
        assert!(matches!(err, ControlError::Superseded { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        // Port 9 (discard) is closed on test hosts
        let (store, first, _) = store_with_active("http://127.0.0.1:9");
        let err = client().drop_publisher(&store, &first).await.unwrap_err();
        assert!(matches!(err, ControlError::Unreachable(_)));
        assert!(store.get_stream(&first).await.unwrap().active);
    }
}
