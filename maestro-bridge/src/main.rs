//! MCZ Maestro stove bridge.
//!
//! Connects a Maestro pellet stove to a Zenoh or MQTT bus.

use std::sync::Arc;

use anyhow::{Context, Result};
use maestro_bridge::bridge::MaestroBridge;
use maestro_bridge::config::MaestroBridgeConfig;
use maestro_bridge::protocol::ProtocolBridge;
use maestro_bridge::supervisor::{ConnectionSupervisor, SupervisorSettings, run_info_timer};
use maestro_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("maestro.json5");

    let config = MaestroBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut runner = BridgeRunner::new_with_args("maestro", config, Some(&args))
        .await
        .context("Failed to start bridge")?;

    if runner.config().maestro.bridge_status {
        runner = runner.with_status_publishing();
    }

    let maestro = runner.config().maestro.clone();
    let bus = runner.bus().clone();

    let filter = maestro.command_filter(bus.wildcard_style());
    let inbound = bus
        .subscribe(&filter)
        .await
        .with_context(|| format!("Failed to subscribe to {}", filter))?;

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let bridge = Arc::new(MaestroBridge::new(
        ProtocolBridge::from_config(&maestro),
        outbound_tx,
    ));

    let supervisor =
        ConnectionSupervisor::new(bridge.clone(), SupervisorSettings::from_config(&maestro));
    let state = supervisor.state();

    let publisher = runner.publisher();
    runner.spawn(publisher.forward(outbound_rx));

    let intake = bridge.clone();
    runner.spawn(async move { intake.run_intake(inbound).await });

    runner.spawn(run_info_timer(bridge, state, maestro.info_interval()));
    runner.spawn(supervisor.run());

    tracing::info!(
        stove = %maestro.device_url(),
        payload_mode = maestro.payload_mode.as_str(),
        publish = %maestro.publish_topic,
        subscribe = %filter,
        "Maestro bridge running"
    );

    let metadata = serde_json::json!({
        "stove": maestro.device_url(),
        "payload_mode": maestro.payload_mode.as_str(),
        "publish_topic": maestro.publish_topic,
        "subscribe_topic": maestro.subscribe_topic,
    });

    runner
        .run_with_metadata(Some(metadata))
        .await
        .context("Bridge stopped with an error")
}
