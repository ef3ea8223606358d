//! Message bus client over Zenoh or MQTT.
//!
//! [`Bus`] hides the backend behind three operations: subscribe to a topic
//! filter, publish a payload, close. Incoming messages are delivered through
//! a bounded [`mpsc`] channel per subscription.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use maestro_common::topic::mqtt_matches;
use maestro_common::{BusConfig, MqttConfig, WildcardStyle, mqtt_options, mqtt_qos};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Packet, QoS};
use tokio::sync::mpsc;

use crate::error::{BridgeError, Result};

/// Capacity of each subscription channel.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the `rumqttc` request queue.
const MQTT_REQUEST_CAPACITY: usize = 100;

/// Pause between MQTT event loop polls after a connection error.
const MQTT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Topic (or key expression) the message was published on.
    pub topic: String,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Connected message bus.
///
/// Cheap to clone; all clones share the same underlying session or client.
#[derive(Clone, Debug)]
pub enum Bus {
    /// Zenoh session.
    Zenoh(Arc<zenoh::Session>),
    /// MQTT client with its background event loop.
    Mqtt(MqttBus),
}

impl Bus {
    /// Connect to the configured backend.
    pub async fn connect(config: &BusConfig) -> Result<Self> {
        match config {
            BusConfig::Zenoh(zenoh) => {
                let session = maestro_common::connect(zenoh)
                    .await
                    .map_err(|e| BridgeError::BusConnection(e.to_string()))?;
                Ok(Bus::Zenoh(Arc::new(session)))
            }
            BusConfig::Mqtt(mqtt) => MqttBus::connect(mqtt).map(Bus::Mqtt),
        }
    }

    /// Wildcard syntax of this backend.
    pub fn wildcard_style(&self) -> WildcardStyle {
        match self {
            Bus::Zenoh(_) => WildcardStyle::Zenoh,
            Bus::Mqtt(_) => WildcardStyle::Mqtt,
        }
    }

    /// Subscribe to a topic filter.
    ///
    /// The returned receiver yields every matching message until the bus is
    /// closed or the receiver is dropped.
    pub async fn subscribe(&self, filter: &str) -> Result<mpsc::Receiver<Inbound>> {
        match self {
            Bus::Zenoh(session) => subscribe_zenoh(session, filter).await,
            Bus::Mqtt(mqtt) => mqtt.subscribe(filter).await,
        }
    }

    /// Publish a payload to a topic.
    pub async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        match self {
            Bus::Zenoh(session) => session
                .put(topic, payload)
                .await
                .map_err(|e| BridgeError::publish(topic, e)),
            Bus::Mqtt(mqtt) => mqtt
                .client
                .publish(topic, mqtt.qos, false, payload)
                .await
                .map_err(|e| BridgeError::publish(topic, e)),
        }
    }

    /// Close the session or disconnect from the broker.
    pub async fn close(&self) -> Result<()> {
        match self {
            Bus::Zenoh(session) => session
                .close()
                .await
                .map_err(|e| BridgeError::BusConnection(e.to_string())),
            Bus::Mqtt(mqtt) => mqtt.close().await,
        }
    }
}

async fn subscribe_zenoh(
    session: &zenoh::Session,
    filter: &str,
) -> Result<mpsc::Receiver<Inbound>> {
    let subscriber = session
        .declare_subscriber(filter.to_string())
        .await
        .map_err(|e| BridgeError::Subscribe {
            filter: filter.to_string(),
            message: e.to_string(),
        })?;

    tracing::info!(filter = %filter, "Subscribed to Zenoh key expression");

    let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Ok(sample) = subscriber.recv_async().await {
            let inbound = Inbound {
                topic: sample.key_expr().as_str().to_string(),
                payload: sample.payload().to_bytes().into_owned(),
            };
            if tx.send(inbound).await.is_err() {
                break;
            }
        }
        tracing::debug!("Zenoh subscriber closed");
    });

    Ok(rx)
}

/// A subscription registered on the MQTT client.
#[derive(Debug)]
struct Route {
    filter: String,
    tx: mpsc::Sender<Inbound>,
}

/// MQTT backend.
///
/// A background task drives the `rumqttc` event loop, re-subscribes every
/// registered filter on each (re)connection and routes incoming publishes to
/// the subscriptions whose filter matches.
#[derive(Clone, Debug)]
pub struct MqttBus {
    client: AsyncClient,
    qos: QoS,
    routes: Arc<Mutex<Vec<Route>>>,
    closed: Arc<AtomicBool>,
}

impl MqttBus {
    /// Create the client and spawn its event loop.
    ///
    /// The broker connection itself is established by the event loop, which
    /// keeps retrying on failure.
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        let options = mqtt_options(config)?;
        let qos = mqtt_qos(config.qos)?;
        let (client, eventloop) = AsyncClient::new(options, MQTT_REQUEST_CAPACITY);

        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            "Connecting to MQTT broker"
        );

        let bus = Self {
            client,
            qos,
            routes: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        };

        tokio::spawn(drive_event_loop(eventloop, bus.clone()));

        Ok(bus)
    }

    async fn subscribe(&self, filter: &str) -> Result<mpsc::Receiver<Inbound>> {
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        self.routes.lock().push(Route {
            filter: filter.to_string(),
            tx,
        });

        self.client
            .subscribe(filter, self.qos)
            .await
            .map_err(|e| BridgeError::Subscribe {
                filter: filter.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(filter = %filter, qos = ?self.qos, "Subscribed to MQTT topic");

        Ok(rx)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.client
            .disconnect()
            .await
            .map_err(|e| BridgeError::BusConnection(e.to_string()))
    }

    /// Re-issue every registered subscription after a (re)connection.
    fn resubscribe(&self) {
        let filters: Vec<String> = self
            .routes
            .lock()
            .iter()
            .map(|route| route.filter.clone())
            .collect();

        for filter in filters {
            if let Err(e) = self.client.try_subscribe(filter.clone(), self.qos) {
                tracing::warn!(filter = %filter, error = %e, "Failed to resubscribe");
            }
        }
    }

    /// Deliver a publish to every matching subscription.
    async fn route(&self, topic: String, payload: Vec<u8>) {
        let targets: Vec<mpsc::Sender<Inbound>> = {
            let mut routes = self.routes.lock();
            routes.retain(|route| !route.tx.is_closed());
            routes
                .iter()
                .filter(|route| mqtt_matches(&route.filter, &topic))
                .map(|route| route.tx.clone())
                .collect()
        };

        if targets.is_empty() {
            tracing::debug!(topic = %topic, "No subscription for MQTT message");
            return;
        }

        let inbound = Inbound { topic, payload };
        for tx in targets {
            if tx.send(inbound.clone()).await.is_err() {
                tracing::debug!(topic = %inbound.topic, "Subscription dropped");
            }
        }
    }
}

async fn drive_event_loop(mut eventloop: EventLoop, bus: MqttBus) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "Connected to MQTT broker");
                bus.resubscribe();
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                bus.route(publish.topic, publish.payload.to_vec()).await;
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => break,
            Err(e) => {
                if bus.closed.load(Ordering::SeqCst) {
                    break;
                }
                tracing::warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(MQTT_RETRY_DELAY).await;
            }
        }
    }

    tracing::debug!("MQTT event loop stopped");
}
