//! Maestro Bridge Framework
//!
//! Common abstractions for bridges that connect a device to a message bus
//! (Zenoh or MQTT).
//!
//! # Overview
//!
//! This framework provides:
//! - [`Bus`] for subscribing and publishing over either backend
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for publishing batches of [`Publication`]s under a topic prefix
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use maestro_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!     runner.spawn(my_worker(runner.publisher()));
//!
//!     // Run until Ctrl+C
//!     runner.run_with_metadata(None).await?;
//!     Ok(())
//! }
//! ```

mod args;
pub mod bus;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use bus::{Bus, Inbound};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{Publication, PublishStats, Publisher};
pub use runner::BridgeRunner;
pub use status::{BridgeStatus, StatusPublisher};

// Re-export commonly used types from maestro-common
pub use maestro_common::{
    BusConfig, LogFormat, LoggingConfig, MqttConfig, WildcardStyle, ZenohConfig, topic,
};
