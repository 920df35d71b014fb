//! MQTT transport adapter.
//!
//! Abstracts the underlying MQTT client behind the [`Transport`] trait:
//! connect with last-will, publish, subscribe, and a stream of
//! [`TransportEvent`]s. The production implementation wraps `rumqttc`,
//! pumping its event loop into a channel. The core never reconnects on its
//! own; transport failures surface as events and end the session.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// MQTT quality of service levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// At most once delivery.
    AtMostOnce,
    /// At least once delivery.
    AtLeastOnce,
    /// Exactly once delivery.
    ExactlyOnce,
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Last-will registration carried in [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct Will {
    /// Topic the broker publishes the will on.
    pub topic: String,
    /// Will payload bytes.
    pub payload: Vec<u8>,
    /// Will quality of service.
    pub qos: QoS,
    /// Whether the will is retained.
    pub retain: bool,
}

/// Options for opening an MQTT session.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Broker endpoint, e.g. `mqtt://localhost:1883`.
    pub broker_url: String,
    /// Unique MQTT client identifier.
    pub client_id: String,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// MQTT keepalive interval.
    pub keepalive: Duration,
    /// Whether to request a clean session.
    pub clean_session: bool,
    /// How long to wait for the broker CONNACK.
    pub connect_timeout: Duration,
    /// Last-will registration.
    pub will: Option<Will>,
}

impl ConnectOptions {
    /// Creates options with the library defaults: 60 s keepalive, clean
    /// session, 30 s connect timeout, no will.
    pub fn new(broker_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            client_id: client_id.into(),
            username: None,
            password: None,
            keepalive: Duration::from_secs(60),
            clean_session: true,
            connect_timeout: Duration::from_secs(30),
            will: None,
        }
    }
}

/// Events surfaced by a transport session.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The broker acknowledged the connection.
    Connected,
    /// An application message arrived.
    Message {
        /// The topic the message was published on.
        topic: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
    /// The broker requested a disconnect.
    Disconnected,
    /// The session ended; no further events follow.
    Closed,
    /// A transport-level error occurred.
    Error(String),
}

/// Abstraction over the underlying MQTT client.
///
/// `connect` resolves once the broker acknowledges the session (honouring
/// `connect_timeout`) and hands back the event stream for that session.
#[async_trait]
pub trait Transport: Send {
    /// Opens a session and returns its event stream.
    async fn connect(
        &mut self,
        options: ConnectOptions,
    ) -> Result<mpsc::Receiver<TransportEvent>>;

    /// Publishes a message.
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<()>;

    /// Subscribes to a topic filter.
    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<()>;

    /// Unsubscribes from a topic filter.
    async fn unsubscribe(&self, filter: &str) -> Result<()>;

    /// Ends the session.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Wraps a filter for an MQTT 5 broker-shared subscription group.
pub fn shared_filter(group: &str, filter: &str) -> String {
    format!("$share/{}/{}", group, filter)
}

/// Splits a broker URL into host and port, defaulting to 1883.
pub(crate) fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let rest = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid broker port in '{}'", url)))?;
            Ok((host.to_string(), port))
        }
        None => Ok((rest.to_string(), 1883)),
    }
}

/// The rumqttc-backed [`Transport`] implementation.
pub struct MqttTransport {
    client: Option<AsyncClient>,
    pump: Option<JoinHandle<()>>,
}

impl MqttTransport {
    /// Creates an unconnected transport.
    pub fn new() -> Self {
        Self {
            client: None,
            pump: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient> {
        self.client.as_ref().ok_or(Error::Transport {
            operation: "client",
            details: "not connected".to_string(),
        })
    }
}

impl Default for MqttTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(
        &mut self,
        options: ConnectOptions,
    ) -> Result<mpsc::Receiver<TransportEvent>> {
        let (host, port) = parse_broker_url(&options.broker_url)?;
        let mut mqtt_options = MqttOptions::new(options.client_id.clone(), host, port);
        mqtt_options.set_keep_alive(options.keepalive);
        mqtt_options.set_clean_session(options.clean_session);
        if let (Some(username), Some(password)) = (&options.username, &options.password) {
            mqtt_options.set_credentials(username, password);
        }
        if let Some(will) = &options.will {
            mqtt_options.set_last_will(LastWill::new(
                will.topic.clone(),
                will.payload.clone(),
                will.qos.into(),
                will.retain,
            ));
        }

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, 64);
        let (tx, mut rx) = mpsc::channel(64);

        let pump = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!(code = ?ack.code, "MQTT connected");
                        if tx.send(TransportEvent::Connected).await.is_err() {
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        debug!(topic = %publish.topic, "MQTT message received");
                        let event = TransportEvent::Message {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                        };
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        let _ = tx.send(TransportEvent::Disconnected).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT connection error");
                        let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                        let _ = tx.send(TransportEvent::Closed).await;
                        break;
                    }
                }
            }
        });

        // Gate on the CONNACK so callers observe connected-or-failed, never
        // a half-open session.
        match tokio::time::timeout(options.connect_timeout, rx.recv()).await {
            Ok(Some(TransportEvent::Connected)) => {
                self.client = Some(client);
                self.pump = Some(pump);
                Ok(rx)
            }
            Ok(Some(TransportEvent::Error(details))) => {
                pump.abort();
                Err(Error::ConnectionFailed(details))
            }
            Ok(_) => {
                pump.abort();
                Err(Error::ConnectionFailed(
                    "session closed before CONNACK".to_string(),
                ))
            }
            Err(_) => {
                pump.abort();
                Err(Error::ConnectTimeout {
                    timeout_ms: options.connect_timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS, retain: bool) -> Result<()> {
        self.client()?
            .publish(topic, qos.into(), retain, payload)
            .await
            .map_err(|e| Error::Transport {
                operation: "publish",
                details: e.to_string(),
            })
    }

    async fn subscribe(&self, filter: &str, qos: QoS) -> Result<()> {
        self.client()?
            .subscribe(filter, qos.into())
            .await
            .map_err(|e| Error::Transport {
                operation: "subscribe",
                details: e.to_string(),
            })
    }

    async fn unsubscribe(&self, filter: &str) -> Result<()> {
        self.client()?
            .unsubscribe(filter)
            .await
            .map_err(|e| Error::Transport {
                operation: "unsubscribe",
                details: e.to_string(),
            })
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            let _ = client.disconnect().await;
        }
        if let Some(mut pump) = self.pump.take() {
            // Give the event loop a moment to flush the DISCONNECT packet.
            if tokio::time::timeout(Duration::from_secs(1), &mut pump)
                .await
                .is_err()
            {
                pump.abort();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broker_url() {
        assert_eq!(
            parse_broker_url("mqtt://broker:1884").unwrap(),
            ("broker".to_string(), 1884)
        );
        assert_eq!(
            parse_broker_url("tcp://localhost:1883").unwrap(),
            ("localhost".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_url("broker.example.com").unwrap(),
            ("broker.example.com".to_string(), 1883)
        );
        assert!(parse_broker_url("mqtt://broker:nope").is_err());
    }

    #[test]
    fn test_shared_filter() {
        assert_eq!(
            shared_filter("hosts", "spBv1.0/+/NDATA/#"),
            "$share/hosts/spBv1.0/+/NDATA/#"
        );
    }
}
