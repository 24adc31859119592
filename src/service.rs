//! Authorization service
//!
//! Ties the credential store, the relay control client and the expiry sweeper
//! together into the operations an HTTP layer forwards to:
//! publish/unpublish callbacks from the relay and admin add/remove/block.

use std::future::Future;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::control::client::log_drop_result;
use crate::control::ControlClient;
use crate::error::{Error, Result, ValidationError};
use crate::expiry::{parse_expiry, ExpirySweeper};
use crate::registry::{CredentialStore, NewStream, StreamEntry, StreamId};

/// Characters allowed in a stream name besides ASCII alphanumerics
///
/// These never need percent-encoding inside a URL path segment.
const NAME_EXTRA_CHARS: &str = "-._~!$&'()*+,;=:@";

/// Admin request to create a credential
#[derive(Debug, Clone, Default)]
pub struct AddStreamRequest {
    pub app: String,
    pub name: String,
    pub auth_key: String,
    /// Empty, an ISO-8601 duration or an RFC 3339 timestamp
    pub expiry: String,
    pub notes: String,
    pub blocked: bool,
}

/// Publish authorization service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<CredentialStore>,
    control: ControlClient,
    config: AuthConfig,
}

impl AuthService {
    /// Open the store and apply the configured control URL
    pub async fn start(config: AuthConfig) -> Result<Self> {
        let store = CredentialStore::open(&config.store_path).await?;
        store
            .set_control_url(config.control_url.clone().unwrap_or_default())
            .await?;
        let control = ControlClient::from_config(&config)?;

        tracing::info!(
            path = %config.store_path.display(),
            streams = store.stream_count().await,
            control = config.control_url.is_some(),
            "Auth service started"
        );

        Ok(Self::new(Arc::new(store), control, config))
    }

    /// Create a service from parts
    pub fn new(store: Arc<CredentialStore>, control: ControlClient, config: AuthConfig) -> Self {
        Self { store, control, config }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Handle a publish callback: authorize and mark the record active
    pub async fn publish(&self, app: &str, name: &str, key: &str) -> Result<StreamId> {
        match self.store.grant(app, name, key).await {
            Err(Error::Denied(denied)) => {
                tracing::debug!(app, name, reason = %denied, "Publish denied");
                Err(denied.into())
            }
            result => result,
        }
    }

    /// Handle an unpublish callback for app/name
    pub async fn unpublish(&self, app: &str, name: &str) -> Result<usize> {
        self.store.set_inactive(app, name).await
    }

    /// Validate admin input and create a credential
    pub async fn add_stream(&self, request: AddStreamRequest) -> Result<StreamId> {
        validate_name(&request.name)?;
        if !self.config.allows_application(&request.app) {
            return Err(ValidationError::UnknownApplication(request.app).into());
        }
        let expiry = parse_expiry(&request.expiry)?;

        let stream = NewStream::new(request.app, request.name, request.auth_key)
            .expiry(expiry)
            .notes(request.notes)
            .blocked(request.blocked);
        self.store.add_stream(stream).await
    }

    /// Remove a credential, dropping its publisher first if it is active
    pub async fn remove_stream(&self, id: &StreamId) -> Result<StreamEntry> {
        let stream = self.store.get_stream(id).await?;
        if stream.active {
            let result = self.control.drop_publisher(&self.store, id).await;
            log_drop_result(id, &result);
        }

        self.store.remove_stream(id).await
    }

    /// Block or unblock a credential
    ///
    /// Blocking also drops the publisher; unblocking never contacts the relay.
    pub async fn set_blocked(&self, id: &StreamId, blocked: bool) -> Result<()> {
        self.store.set_blocked(id, blocked).await?;

        if blocked {
            let result = self.control.drop_publisher(&self.store, id).await;
            log_drop_result(id, &result);
        }
        Ok(())
    }

    /// Sweeper bound to this service's store and control client
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            Arc::clone(&self.store),
            self.control.clone(),
            self.config.sweep_interval,
        )
    }

    /// Run the expiry sweeper until `shutdown` completes
    ///
    /// The sweeper stops between cycles; a cycle in flight gets
    /// `shutdown_grace` to finish.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let handle = self.sweeper().spawn();
        shutdown.await;

        tracing::info!("Shutting down auth service");
        handle.shutdown(self.config.shutdown_grace).await;
    }
}

fn validate_name(name: &str) -> std::result::Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || NAME_EXTRA_CHARS.contains(c))
    {
        return Err(ValidationError::UnsafeName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::registry::AuthDenied;

    async fn service() -> (tempfile::TempDir, AuthService) {
        let dir = tempfile::tempdir().unwrap();
        let config = AuthConfig::with_store_path(dir.path().join("store.db"))
            .applications(["live"])
            .sweep_interval(Duration::from_millis(20));
        let service = AuthService::start(config).await.unwrap();
        (dir, service)
    }

    fn request(name: &str, key: &str) -> AddStreamRequest {
        AddStreamRequest {
            app: "live".into(),
            name: name.into(),
            auth_key: key.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_name() {
        assert_ok!(validate_name("camera-1_main.hd~"));
        assert_ok!(validate_name("a:b@c;d=e"));
        assert_eq!(validate_name(""), Err(ValidationError::EmptyName));
        for name in ["with space", "slash/name", "q?x", "hash#", "ümlaut", "pct%20"] {
            assert_eq!(validate_name(name), Err(ValidationError::UnsafeName(name.to_string())));
        }
    }

    #[tokio::test]
    async fn test_publish_unpublish_cycle() {
        let (_dir, service) = service().await;
        let id = service.add_stream(request("s1", "k1")).await.unwrap();

        assert_eq!(service.publish("live", "s1", "k1").await.unwrap(), id);
        assert!(service.store().get_stream(&id).await.unwrap().active);

        // Re-grant while active is idempotent
        assert_eq!(service.publish("live", "s1", "k1").await.unwrap(), id);

        assert_eq!(service.unpublish("live", "s1").await.unwrap(), 1);
        assert!(!service.store().get_stream(&id).await.unwrap().active);

        let err = service.unpublish("live", "s1").await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn test_publish_denials() {
        let (_dir, service) = service().await;
        let first = service.add_stream(request("s1", "k1")).await.unwrap();
        let second = service.add_stream(request("s1", "k2")).await.unwrap();

        let err = service.publish("live", "s1", "nope").await.unwrap_err();
        assert!(matches!(err, Error::Denied(AuthDenied::Unauthorized)));

        service.publish("live", "s1", "k1").await.unwrap();
        let err = service.publish("live", "s1", "k2").await.unwrap_err();
        assert!(matches!(err, Error::Denied(AuthDenied::Busy(ref id)) if *id == second));
        assert_eq!(err.status_code(), 409);

        service.set_blocked(&first, true).await.unwrap();
        let err = service.publish("live", "s1", "k1").await.unwrap_err();
        assert!(matches!(err, Error::Denied(AuthDenied::Blocked(ref id)) if *id == first));
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_add_stream_validation() {
        let (_dir, service) = service().await;

        let err = service
            .add_stream(AddStreamRequest {
                app: "other".into(),
                ..request("s1", "k")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::UnknownApplication(_))));

        let err = service.add_stream(request("", "k")).await.unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyName)));

        let err = service
            .add_stream(AddStreamRequest {
                expiry: "soon".into(),
                ..request("s1", "k")
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        assert_eq!(service.store().stream_count().await, 0);
    }

    #[tokio::test]
    async fn test_add_stream_fields() {
        let (_dir, service) = service().await;
        let id = service
            .add_stream(AddStreamRequest {
                expiry: "P1D".into(),
                notes: "studio".into(),
                blocked: true,
                ..request("s1", "k")
            })
            .await
            .unwrap();

        let stream = service.store().get_stream(&id).await.unwrap();
        assert_eq!(stream.notes, "studio");
        assert!(stream.blocked);
        assert!(!stream.active);
        assert!(stream.expiry.timestamp().is_some());
    }

    #[tokio::test]
    async fn test_remove_active_without_control_url() {
        let (_dir, service) = service().await;
        let id = service.add_stream(request("s1", "k1")).await.unwrap();
        service.publish("live", "s1", "k1").await.unwrap();

        let removed = service.remove_stream(&id).await.unwrap();
        assert_eq!(removed.id, id);
        assert_err!(service.store().get_stream(&id).await);

        let err = service.remove_stream(&id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_start_clears_stale_control_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let config = AuthConfig::with_store_path(&path).control_url("http://relay:8080");
        let service = AuthService::start(config).await.unwrap();
        assert_eq!(service.store().control_url().await.as_deref(), Some("http://relay:8080"));
        drop(service);

        let service = AuthService::start(AuthConfig::with_store_path(&path)).await.unwrap();
        assert_eq!(service.store().control_url().await, None);
    }

    #[tokio::test]
    async fn test_run_until_stops_sweeper() {
        let (_dir, service) = service().await;
        service
            .add_stream(AddStreamRequest {
                expiry: "2001-09-09T01:46:40Z".into(),
                ..request("s1", "k")
            })
            .await
            .unwrap();

        let store = Arc::clone(service.store());
        service
            .run_until(async move {
                while store.stream_count().await > 0 {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await;

        assert_eq!(service.store().stream_count().await, 0);
    }
}
