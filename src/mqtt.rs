use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::time::sleep;
use tracing::{debug, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(10);
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Broker connection settings shared by every binary that listens on the mesh topic.
#[derive(Debug, Clone, Args)]
pub struct MqttArgs {
    #[arg(long = "mqtt-host", env = "MQTT_HOST", default_value = "mqtt.meshtastic.org")]
    pub host: String,

    #[arg(long = "mqtt-port", env = "MQTT_PORT", default_value_t = 1883)]
    pub port: u16,

    #[arg(long = "mqtt-topic", env = "MQTT_TOPIC", default_value = "msh/US/2/e/pulse-aqi/#")]
    pub topic: String,

    #[arg(long = "mqtt-username", env = "MQTT_USERNAME", default_value = "meshdev")]
    pub username: String,

    #[arg(
        long = "mqtt-password",
        env = "MQTT_PASSWORD",
        default_value = "large4cats",
        hide_env_values = true
    )]
    pub password: String,

    #[arg(long = "mqtt-client-id", env = "MQTT_CLIENT_ID")]
    pub client_id: Option<String>,

    #[arg(long = "mqtt-keep-alive-secs", default_value_t = 60)]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// A subscription to one topic filter that survives reconnects.
pub struct MqttSubscription {
    client: AsyncClient,
    event_loop: EventLoop,
    topic: String,
}

impl MqttSubscription {
    pub fn new(args: &MqttArgs, default_client_id: &str) -> Self {
        let client_id = args
            .client_id
            .clone()
            .unwrap_or_else(|| default_client_id.to_string());

        let mut options = MqttOptions::new(client_id, args.host.clone(), args.port);
        options
            .set_keep_alive(Duration::from_secs(args.keep_alive_secs))
            .set_credentials(args.username.clone(), args.password.clone());

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        Self {
            client,
            event_loop,
            topic: args.topic.clone(),
        }
    }

    /// Drives the connection until the next publish arrives.
    ///
    /// Connection errors are logged and retried after a fixed delay; the topic is subscribed
    /// again on every connection acknowledgement.
    pub async fn next_message(&mut self) -> Result<InboundMessage> {
        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    self.client
                        .subscribe(self.topic.as_str(), QoS::AtMostOnce)
                        .await
                        .with_context(|| format!("failed to subscribe to {}", self.topic))?;
                    info!("Subscribed to topic: {}", self.topic);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(InboundMessage {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(event) => debug!(?event, "MQTT event"),
                Err(err) => {
                    warn!("MQTT connection error: {err}. Retrying in {RECONNECT_DELAY:?}...");
                    sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .disconnect()
            .await
            .context("failed to disconnect from MQTT broker")
    }
}
