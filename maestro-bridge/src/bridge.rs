//! The bridge instance shared by all tasks.

use maestro_bridge_framework::{Inbound, Publication};
use tokio::sync::mpsc;

use crate::cache::StateDiffCache;
use crate::coalescer::CommandCoalescer;
use crate::command::{CommandKind, CommandValue};
use crate::protocol::ProtocolBridge;
use crate::supervisor::LinkStatus;

/// What happened to an inbound bus message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intake {
    /// Queued for the stove.
    Queued(CommandValue),
    /// State cache cleared.
    Refreshed,
    /// Dropped (unknown command or malformed payload).
    Ignored,
}

/// Shared bridging state: the command queue, the state cache and the
/// outbound publication channel.
///
/// Lives in an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct MaestroBridge {
    protocol: ProtocolBridge,
    commands: CommandCoalescer,
    cache: StateDiffCache,
    outbound: mpsc::UnboundedSender<Vec<Publication>>,
}

impl MaestroBridge {
    pub fn new(
        protocol: ProtocolBridge,
        outbound: mpsc::UnboundedSender<Vec<Publication>>,
    ) -> Self {
        Self {
            protocol,
            commands: CommandCoalescer::new(),
            cache: StateDiffCache::new(),
            outbound,
        }
    }

    pub fn protocol(&self) -> &ProtocolBridge {
        &self.protocol
    }

    pub fn commands(&self) -> &CommandCoalescer {
        &self.commands
    }

    pub fn cache(&self) -> &StateDiffCache {
        &self.cache
    }

    /// Handle a command message from the bus.
    pub fn handle_inbound(&self, topic: &str, payload: &[u8]) -> Intake {
        let command = match self.protocol.parse_command(topic, payload) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    payload = %String::from_utf8_lossy(payload),
                    error = %e,
                    "Malformed command message"
                );
                return Intake::Ignored;
            }
        };

        match command.kind {
            CommandKind::Unknown => {
                tracing::info!(
                    topic = %topic,
                    payload = %String::from_utf8_lossy(payload),
                    "Unknown command, ignoring"
                );
                Intake::Ignored
            }
            CommandKind::Refresh => {
                tracing::info!("Clearing the state cache");
                self.cache.clear();
                Intake::Refreshed
            }
            _ => {
                tracing::info!(command = %command.kind, value = command.value, "Command received");
                self.commands.put(command);
                Intake::Queued(command)
            }
        }
    }

    /// Queue a state request.
    pub fn request_info(&self) {
        self.commands.put(CommandValue::get_info());
    }

    /// Handle a frame from the stove, publishing changed state.
    ///
    /// Returns the number of publications emitted.
    pub fn handle_frame(&self, raw: &str) -> usize {
        let snapshot = match self.protocol.parse_state(raw) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return 0,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                return 0;
            }
        };

        let changed = self.cache.diff(&snapshot);
        tracing::debug!(
            fields = snapshot.len(),
            changed = changed.len(),
            "Info frame received"
        );

        self.emit(self.protocol.render_state(&changed))
    }

    /// Publish a connection status.
    pub fn publish_status(&self, status: LinkStatus) {
        tracing::info!(status = status.as_str(), "Publishing connection status");
        self.emit(self.protocol.render_status(status));
    }

    /// Feed bus messages into the bridge until the subscription closes.
    pub async fn run_intake(&self, mut inbound: mpsc::Receiver<Inbound>) {
        while let Some(message) = inbound.recv().await {
            self.handle_inbound(&message.topic, &message.payload);
        }
        tracing::warn!("Command subscription closed");
    }

    fn emit(&self, publications: Vec<Publication>) -> usize {
        let count = publications.len();
        if count == 0 {
            return 0;
        }
        if self.outbound.send(publications).is_err() {
            tracing::debug!("Publisher stopped, dropping publications");
            return 0;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadMode;

    fn bridge(mode: PayloadMode) -> (MaestroBridge, mpsc::UnboundedReceiver<Vec<Publication>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MaestroBridge::new(ProtocolBridge::new(mode, "PUBmcz"), tx), rx)
    }

    #[test]
    fn test_json_command_is_queued() {
        let (bridge, _rx) = bridge(PayloadMode::Json);

        let intake =
            bridge.handle_inbound("SUBmcz", br#"{"Command":"Power_Level","Value":"3"}"#);

        let expected = CommandValue::new(CommandKind::PowerLevel, 3.0);
        assert_eq!(intake, Intake::Queued(expected));
        assert_eq!(bridge.commands().try_get(), Some(expected));
    }

    #[test]
    fn test_unknown_and_malformed_are_ignored() {
        let (bridge, _rx) = bridge(PayloadMode::Topic);

        assert_eq!(bridge.handle_inbound("SUBmcz/Turbo", b"1"), Intake::Ignored);
        assert_eq!(bridge.handle_inbound("SUBmcz/Power", b"on"), Intake::Ignored);
        assert!(bridge.commands().is_empty());
    }

    #[test]
    fn test_frames_publish_changes_only() {
        let (bridge, mut rx) = bridge(PayloadMode::Topic);

        assert_eq!(bridge.handle_frame("01|0|1"), 2);
        let batch = rx.try_recv().unwrap();
        assert_eq!(
            batch,
            vec![
                Publication::new("PUBmcz/Stove_State", "0"),
                Publication::new("PUBmcz/Fan_State", "1"),
            ]
        );

        assert_eq!(bridge.handle_frame("01|0|1"), 0);
        assert!(rx.try_recv().is_err());

        assert_eq!(bridge.handle_frame("01|0|2"), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            vec![Publication::new("PUBmcz/Fan_State", "2")]
        );
    }

    #[test]
    fn test_refresh_republishes() {
        let (bridge, mut rx) = bridge(PayloadMode::Json);

        bridge.handle_frame("01|0|1");
        rx.try_recv().unwrap();

        assert_eq!(
            bridge.handle_inbound("SUBmcz", br#"{"Command":"Refresh","Value":"0"}"#),
            Intake::Refreshed
        );
        assert!(bridge.commands().is_empty());

        assert_eq!(bridge.handle_frame("01|0|1"), 1);
        let batch = rx.try_recv().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&batch[0].payload).unwrap();
        assert_eq!(body, serde_json::json!({ "Stove_State": 0, "Fan_State": 1 }));
    }

    #[test]
    fn test_other_and_malformed_frames_publish_nothing() {
        let (bridge, mut rx) = bridge(PayloadMode::Topic);

        assert_eq!(bridge.handle_frame("0D|1|2"), 0);
        assert_eq!(bridge.handle_frame("01|0|nothex"), 0);
        assert!(rx.try_recv().is_err());
        assert!(bridge.cache().is_empty());
    }

    #[test]
    fn test_publish_status() {
        let (bridge, mut rx) = bridge(PayloadMode::Topic);

        bridge.publish_status(LinkStatus::Connected);
        assert_eq!(
            rx.try_recv().unwrap(),
            vec![Publication::new("PUBmcz/Status", "connected")]
        );
    }

    #[test]
    fn test_request_info_coalesces() {
        let (bridge, _rx) = bridge(PayloadMode::Topic);
        bridge.request_info();
        bridge.request_info();
        assert_eq!(bridge.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_run_intake() {
        let (bridge, _rx) = bridge(PayloadMode::Topic);
        let (tx, inbound) = mpsc::channel(4);

        tx.send(Inbound {
            topic: "SUBmcz/Eco_Mode".to_string(),
            payload: b"1".to_vec(),
        })
        .await
        .unwrap();
        drop(tx);

        bridge.run_intake(inbound).await;
        assert_eq!(
            bridge.commands().try_get(),
            Some(CommandValue::new(CommandKind::EcoMode, 1.0))
        );
    }
}
