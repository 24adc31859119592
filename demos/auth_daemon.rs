//! Auth daemon - runs the credential registry and expiry sweeper
//!
//! Run with: cargo run --example auth_daemon
//!
//! Configuration comes from the environment:
//! - `RTMP_AUTH_STORE`: state file (default `store.db`)
//! - `RTMP_AUTH_APPS`: comma separated application names (default `stream`)
//! - `RTMP_AUTH_CTRL_URL`: relay control base URL, unset disables revocation
//! - `RTMP_AUTH_SWEEP_INTERVAL_SECS`, `RTMP_AUTH_CONTROL_TIMEOUT_MS`
//!
//! With `DEMO_STREAM=name` a never-expiring credential with a random key is
//! added on the first configured application and printed.

use rtmp_auth::{AddStreamRequest, AuthConfig, AuthService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rtmp_auth=debug".parse()?)
                .add_directive("auth_daemon=debug".parse()?),
        )
        .init();

    let config = AuthConfig::from_env()?;
    let service = AuthService::start(config).await?;

    if let Ok(name) = std::env::var("DEMO_STREAM") {
        let app = service
            .config()
            .applications
            .first()
            .cloned()
            .unwrap_or_else(|| "stream".to_string());
        let key = uuid::Uuid::new_v4().simple().to_string();

        let id = service
            .add_stream(AddStreamRequest {
                app: app.clone(),
                name: name.clone(),
                auth_key: key.clone(),
                notes: "added by auth_daemon".into(),
                ..Default::default()
            })
            .await?;

        println!("Added stream {}", id);
        println!("ffmpeg: ffmpeg -re -i input.mp4 -c copy -f flv rtmp://localhost/{}/{}?auth={}", app, name, key);
        println!();
    }

    println!("Tracking {} stream(s), press Ctrl+C to stop", service.store().stream_count().await);

    service
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    Ok(())
}
