//! Stove connection lifecycle.
//!
//! The [`ConnectionSupervisor`] loops forever: connect, run one bounded
//! session, pause, reconnect. While a session is open it drains the command
//! queue onto the socket every poll interval, feeds received frames to the
//! bridge and keeps the link alive with pings. Connection status is
//! published edge-triggered through a [`LinkMonitor`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::bridge::MaestroBridge;
use crate::config::MaestroConfig;
use crate::session::{DeviceSession, Incoming, SessionError};

/// Connection status announced on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Connected => "connected",
            LinkStatus::Disconnected => "disconnected",
        }
    }
}

/// State of the stove connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Reconnect counting and edge-triggered status decisions.
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    threshold: u32,
    reset_on_connect: bool,
    ended_cycles: u32,
    last_published: Option<LinkStatus>,
}

impl LinkMonitor {
    pub fn new(threshold: u32, reset_on_connect: bool) -> Self {
        Self {
            threshold,
            reset_on_connect,
            ended_cycles: 0,
            last_published: None,
        }
    }

    /// A connection was opened. Returns the status to publish, if any.
    pub fn on_connected(&mut self) -> Option<LinkStatus> {
        if self.reset_on_connect {
            self.ended_cycles = 0;
        }
        self.transition(LinkStatus::Connected)
    }

    /// A connection cycle ended (failed open or closed session).
    ///
    /// Once the count exceeds the threshold the count resets and
    /// "disconnected" is returned, unless it is already the last status.
    pub fn on_session_ended(&mut self) -> Option<LinkStatus> {
        self.ended_cycles += 1;
        if self.ended_cycles > self.threshold {
            self.ended_cycles = 0;
            self.transition(LinkStatus::Disconnected)
        } else {
            None
        }
    }

    /// Cycles counted since the last reset.
    pub fn ended_cycles(&self) -> u32 {
        self.ended_cycles
    }

    pub fn last_published(&self) -> Option<LinkStatus> {
        self.last_published
    }

    fn transition(&mut self, status: LinkStatus) -> Option<LinkStatus> {
        if self.last_published == Some(status) {
            return None;
        }
        self.last_published = Some(status);
        Some(status)
    }
}

/// Timing and alerting settings of the supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub url: String,
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
    pub session_duration: Duration,
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub reconnects_before_alert: u32,
    pub reset_streak_on_connect: bool,
}

impl SupervisorSettings {
    pub fn from_config(config: &MaestroConfig) -> Self {
        Self {
            url: config.device_url(),
            connect_timeout: config.connect_timeout(),
            poll_interval: config.poll_interval(),
            session_duration: config.session_duration(),
            reconnect_delay: config.reconnect_delay(),
            ping_interval: config.ping_interval(),
            ping_timeout: config.ping_timeout(),
            reconnects_before_alert: config.reconnects_before_alert,
            reset_streak_on_connect: config.reset_streak_on_connect,
        }
    }
}

/// Why a session ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Expired,
    ClosedByPeer,
}

/// Owner of the stove connection.
pub struct ConnectionSupervisor {
    bridge: Arc<MaestroBridge>,
    settings: SupervisorSettings,
    monitor: LinkMonitor,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionSupervisor {
    pub fn new(bridge: Arc<MaestroBridge>, settings: SupervisorSettings) -> Self {
        let monitor = LinkMonitor::new(
            settings.reconnects_before_alert,
            settings.reset_streak_on_connect,
        );
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            bridge,
            settings,
            monitor,
            state,
        }
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run connection cycles forever.
    pub async fn run(mut self) {
        loop {
            self.cycle().await;

            tokio::time::sleep(self.settings.reconnect_delay).await;

            if let Some(status) = self.monitor.on_session_ended() {
                tracing::warn!(
                    threshold = self.settings.reconnects_before_alert,
                    "Stove unreachable, reporting disconnected"
                );
                self.bridge.publish_status(status);
            }
            tracing::info!(
                count = self.monitor.ended_cycles(),
                "Stove reconnection count"
            );
        }
    }

    /// One connect attempt and, if it succeeds, one session.
    async fn cycle(&mut self) {
        let url = self.settings.url.clone();
        self.set_state(ConnectionState::Connecting);
        tracing::info!(url = %url, "Connecting to stove");

        let mut session = match DeviceSession::connect(&url, self.settings.connect_timeout).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to connect to stove");
                self.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        tracing::info!(url = %url, "Connected to stove");
        self.set_state(ConnectionState::Connected);
        if let Some(status) = self.monitor.on_connected() {
            self.bridge.publish_status(status);
        }

        match self.run_session(&mut session).await {
            Ok(SessionEnd::Expired) => {
                tracing::info!("Session expired, closing stove connection");
                self.set_state(ConnectionState::Disconnected);
                session.close().await;
            }
            Ok(SessionEnd::ClosedByPeer) => {
                tracing::info!("Stove closed the connection");
                self.set_state(ConnectionState::Disconnected);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Stove session failed");
                self.set_state(ConnectionState::Disconnected);
            }
        }
    }

    async fn run_session(&self, session: &mut DeviceSession) -> Result<SessionEnd, SessionError> {
        let expiry = tokio::time::sleep(self.settings.session_duration);
        tokio::pin!(expiry);

        let mut poll = tokio::time::interval(self.settings.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ping_period = self.settings.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pong_deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = &mut expiry => return Ok(SessionEnd::Expired),
                _ = poll.tick() => self.drain_commands(session).await?,
                _ = ping.tick() => {
                    session.ping().await?;
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.settings.ping_timeout);
                    }
                }
                _ = tokio::time::sleep_until(pong_deadline.unwrap_or_else(Instant::now)),
                    if pong_deadline.is_some() => {
                    return Err(SessionError::PingTimeout(self.settings.ping_timeout));
                }
                incoming = session.recv() => match incoming? {
                    Incoming::Frame(raw) => {
                        self.bridge.handle_frame(&raw);
                    }
                    Incoming::Pong => pong_deadline = None,
                    Incoming::Closed => return Ok(SessionEnd::ClosedByPeer),
                    Incoming::Other => {}
                },
            }
        }
    }

    /// Send every pending command, oldest kind first.
    async fn drain_commands(&self, session: &mut DeviceSession) -> Result<(), SessionError> {
        while let Some(command) = self.bridge.commands().try_get() {
            let frame = self.bridge.protocol().render_command(&command);
            tracing::info!(command = %command.kind, frame = %frame, "Sending to stove");
            if let Err(e) = session.send(&frame).await {
                tracing::warn!(command = %command.kind, "Command dropped");
                return Err(e);
            }
        }
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// Queue a state request every `period` while the stove is connected.
pub async fn run_info_timer(
    bridge: Arc<MaestroBridge>,
    state: watch::Receiver<ConnectionState>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if *state.borrow() == ConnectionState::Connected {
            bridge.request_info();
        } else {
            tracing::trace!("Stove not connected, skipping state request");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PayloadMode;
    use crate::protocol::ProtocolBridge;
    use tokio::sync::mpsc;

    #[test]
    fn test_connected_published_once() {
        let mut monitor = LinkMonitor::new(3, true);

        assert_eq!(monitor.on_connected(), Some(LinkStatus::Connected));
        assert_eq!(monitor.on_session_ended(), None);
        assert_eq!(monitor.on_connected(), None);
        assert_eq!(monitor.last_published(), Some(LinkStatus::Connected));
    }

    #[test]
    fn test_alert_after_threshold_then_reset() {
        let mut monitor = LinkMonitor::new(3, true);
        monitor.on_connected();

        assert_eq!(monitor.on_session_ended(), None);
        assert_eq!(monitor.on_session_ended(), None);
        assert_eq!(monitor.on_session_ended(), None);
        assert_eq!(monitor.on_session_ended(), Some(LinkStatus::Disconnected));
        assert_eq!(monitor.ended_cycles(), 0);

        // Still down: the count restarts but the status is already published
        for _ in 0..4 {
            assert_eq!(monitor.on_session_ended(), None);
        }

        assert_eq!(monitor.on_connected(), Some(LinkStatus::Connected));
    }

    #[test]
    fn test_reset_on_connect() {
        let mut monitor = LinkMonitor::new(1, true);
        monitor.on_connected();
        monitor.on_session_ended();
        monitor.on_connected();
        assert_eq!(monitor.ended_cycles(), 0);
        assert_eq!(monitor.on_session_ended(), None);
    }

    #[test]
    fn test_without_reset_on_connect() {
        let mut monitor = LinkMonitor::new(1, false);
        monitor.on_connected();
        monitor.on_session_ended();
        monitor.on_connected();
        assert_eq!(monitor.ended_cycles(), 1);
        assert_eq!(monitor.on_session_ended(), Some(LinkStatus::Disconnected));
    }

    #[test]
    fn test_settings_from_config() {
        let config: MaestroConfig = json5::from_str(r#"{ host: "stove", port: 8081 }"#).unwrap();
        let settings = SupervisorSettings::from_config(&config);

        assert_eq!(settings.url, "ws://stove:8081");
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.session_duration, Duration::from_secs(360));
        assert_eq!(settings.reconnects_before_alert, 3);
        assert!(!settings.reset_streak_on_connect);
    }

    #[test]
    fn test_default_settings_alert_across_successful_sessions() {
        let config: MaestroConfig = json5::from_str(r#"{ host: "stove" }"#).unwrap();
        let settings = SupervisorSettings::from_config(&config);
        let mut monitor =
            LinkMonitor::new(settings.reconnects_before_alert, settings.reset_streak_on_connect);

        let mut published = Vec::new();
        for _ in 0..=settings.reconnects_before_alert {
            published.extend(monitor.on_connected());
            published.extend(monitor.on_session_ended());
        }

        assert_eq!(
            published,
            vec![LinkStatus::Connected, LinkStatus::Disconnected]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_timer_only_when_connected() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(MaestroBridge::new(
            ProtocolBridge::new(PayloadMode::Topic, "PUBmcz"),
            tx,
        ));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let timer = tokio::spawn(run_info_timer(
            bridge.clone(),
            state_rx,
            Duration::from_secs(15),
        ));

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert!(bridge.commands().is_empty());

        state_tx.send_replace(ConnectionState::Connected);
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(bridge.commands().len(), 1);

        // Coalesced with the pending request
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(bridge.commands().len(), 1);

        timer.abort();
    }
}
