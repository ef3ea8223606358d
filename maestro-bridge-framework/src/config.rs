//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{BusConfig, LoggingConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for the bridge's configuration struct to get
/// loading, validation, and access to the common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use maestro_bridge_framework::{BridgeConfig, BusConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub bus: BusConfig,
///     pub logging: LoggingConfig,
///     pub publish_topic: String,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn bus(&self) -> &BusConfig {
///         &self.bus
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn key_prefix(&self) -> &str {
///         &self.publish_topic
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the message bus configuration.
    fn bus(&self) -> &BusConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the topic prefix this bridge publishes under.
    fn key_prefix(&self) -> &str;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. The default checks the bus settings.
    fn validate(&self) -> Result<()> {
        self.bus().validate().map_err(BridgeError::from)
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }
}
