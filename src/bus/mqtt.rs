//! MQTT transport for the bridge.

use super::{BusError, InboundMessage, Publisher};
use crate::config::BusConfig;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Topic suffixes the bridge takes requests on.
pub const REQUEST_SUFFIXES: [&str; 2] = ["read", "write"];

/// Pause before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// A live broker connection: the client plus the task driving its event loop.
pub struct MqttConnection {
    client: AsyncClient,
    inbound: mpsc::Receiver<InboundMessage>,
    event_task: JoinHandle<()>,
}

impl MqttConnection {
    /// Connect to the broker and subscribe to the request topics.
    ///
    /// Returns once the broker has acknowledged the connection. A connection
    /// error before the first acknowledgement fails the call; later errors are
    /// retried and subscriptions are renewed on every reconnect.
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("serial-adapter-{}", Uuid::new_v4().simple()));

        let mut options = MqttOptions::new(&client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive());
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
        let (tx, inbound) = mpsc::channel(config.channel_capacity);
        let (connected_tx, connected_rx) = oneshot::channel();
        let topics = REQUEST_SUFFIXES.map(|suffix| config.topic(suffix));

        let event_task = tokio::spawn(drive_event_loop(
            eventloop,
            client.clone(),
            topics,
            tx,
            connected_tx,
        ));

        let broker = format!("{}:{}", config.host, config.port);
        match tokio::time::timeout(config.connect_timeout(), connected_rx).await {
            Ok(Ok(Ok(()))) => {
                info!(%broker, %client_id, topic_root = %config.topic_root, "connected to broker");
                Ok(Self {
                    client,
                    inbound,
                    event_task,
                })
            }
            Ok(Ok(Err(e))) => {
                warn!(%broker, error = %e, "broker connection failed");
                Err(BusError::Connection(e))
            }
            Ok(Err(_)) => {
                event_task.abort();
                Err(BusError::Closed)
            }
            Err(_) => {
                event_task.abort();
                Err(BusError::ConnectTimeout(broker))
            }
        }
    }

    /// A publisher sharing this connection.
    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }

    /// Next request message, or `None` once the event loop has stopped.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.inbound.recv().await
    }

    /// Disconnect from the broker and stop the event loop.
    pub async fn disconnect(self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "disconnect request not delivered");
        }
        // Give the event loop a moment to send DISCONNECT.
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.event_task.abort();
        info!("disconnected from broker");
    }
}

async fn drive_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: [String; 2],
    tx: mpsc::Sender<InboundMessage>,
    connected: oneshot::Sender<Result<(), rumqttc::ConnectionError>>,
) {
    let mut connected = Some(connected);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                for topic in &topics {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        warn!(%topic, error = %e, "subscribe failed");
                    }
                }
                debug!(?topics, "subscribed to request topics");
                if let Some(notify) = connected.take() {
                    let _ = notify.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic.clone(), publish.payload.to_vec());
                if tx.send(message).await.is_err() {
                    debug!("inbound receiver dropped, stopping event loop");
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                if let Some(notify) = connected.take() {
                    let _ = notify.send(Err(e));
                    break;
                }
                warn!(error = %e, "broker connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

/// [`Publisher`] over an MQTT client. QoS 0, not retained.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.into_bytes())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_topics() {
        let config = BusConfig {
            topic_root: "lab/uart0".to_string(),
            ..Default::default()
        };
        let topics = REQUEST_SUFFIXES.map(|suffix| config.topic(suffix));
        assert_eq!(topics, ["lab/uart0/read".to_string(), "lab/uart0/write".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_refused_reports_connection_error() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = BusConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_secs: 5,
            ..Default::default()
        };

        let err = MqttConnection::connect(&config).await.err().unwrap();
        assert!(matches!(err, BusError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_connect_times_out_without_connack() {
        // Accepts TCP but never answers CONNECT.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let silent = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let config = BusConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout_secs: 1,
            ..Default::default()
        };

        let err = MqttConnection::connect(&config).await.err().unwrap();
        assert!(matches!(err, BusError::ConnectTimeout(_)), "got {err:?}");
        silent.abort();
    }
}
