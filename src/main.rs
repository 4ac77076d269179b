//! pod-label-policy - validating admission webhook enforcing Pod label rules.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration and policy settings from the environment
//! - Starts the health server and the webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use pod_label_policy::health::{HealthState, run_health_server};
use pod_label_policy::{Config, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pod_label_policy=info".parse()?),
        )
        .json()
        .init();

    info!("Starting pod-label-policy");

    let config = Config::from_env()?;
    // Surface invalid settings before accepting traffic
    config.policy()?;
    info!(
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        denied_labels = config.settings.denied_labels.len(),
        constrained_labels = config.settings.constrained_labels.len(),
        "Configuration loaded"
    );

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness checks work during startup
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let health_state = health_state.clone();
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(&config, Some(health_state)).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new admission requests
            health_state.set_ready(false).await;
            info!("Marked server as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("pod-label-policy stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the server cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
