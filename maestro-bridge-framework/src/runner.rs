//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;

use maestro_common::{LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::bus::Bus;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::status::StatusPublisher;

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - Bus connection (Zenoh or MQTT)
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C
/// - Status publishing (optional)
///
/// # Example
///
/// ```ignore
/// use maestro_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
///
///     let publisher = runner.publisher();
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run_with_metadata(None).await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging and status.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Connected message bus.
    bus: Bus,
    /// Publisher rooted at the configured prefix.
    publisher: Publisher,
    /// Status publisher (optional).
    status_publisher: Option<StatusPublisher>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
    /// Keeps the log file writer flushing until the runner is dropped.
    _log_guard: Option<WorkerGuard>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// Initializes logging (CLI args may override the level), connects to
    /// the message bus and creates the publisher.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        let log_guard = init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let bus = Bus::connect(config.bus()).await?;

        match &bus {
            Bus::Zenoh(session) => tracing::info!(zid = %session.zid(), "Connected to Zenoh"),
            Bus::Mqtt(_) => tracing::info!("MQTT client started"),
        }

        let publisher = Publisher::new(bus.clone(), config.key_prefix());

        Ok(Self {
            name,
            version,
            config,
            bus,
            publisher,
            status_publisher: None,
            tasks: Vec::new(),
            _log_guard: log_guard,
        })
    }

    /// Enable status publishing.
    ///
    /// When enabled, the runner publishes status messages on startup and shutdown.
    pub fn with_status_publishing(mut self) -> Self {
        self.status_publisher = Some(StatusPublisher::new(
            self.publisher.clone(),
            &self.name,
            &self.version,
        ));
        self
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a reference to the message bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a task that will be aborted on shutdown.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(tokio::spawn(future));
    }

    /// Run the bridge with status metadata until Ctrl+C.
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        self.run_until(metadata, async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await
    }

    /// Run the bridge until `shutdown` completes.
    pub async fn run_until<F>(self, metadata: Option<serde_json::Value>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if let Some(ref status_pub) = self.status_publisher
            && let Err(e) = status_pub.publish_running(metadata).await
        {
            tracing::warn!(error = %e, "Failed to publish running status");
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        shutdown.await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");

        for task in &self.tasks {
            task.abort();
        }

        // Wait briefly for tasks to clean up
        tokio::time::sleep(Duration::from_millis(100)).await;

        if let Some(ref status_pub) = self.status_publisher
            && let Err(e) = status_pub.publish_offline().await
        {
            tracing::warn!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.bus.close().await {
            tracing::warn!(error = %e, "Error closing message bus");
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(())
    }
}
