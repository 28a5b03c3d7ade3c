use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use anyhow::Result;
use chrono::Utc;
use futures::FutureExt as _;
use tracing::{debug, error, info};

use crate::decoder::decode;
use crate::reading::{NormalizedReading, assemble, normalize};

/// Destination for readings that made it through the pipeline.
pub trait ReadingSink {
    fn write(&self, reading: &NormalizedReading) -> impl Future<Output = Result<()>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Written,
    Dropped,
    /// The reading was valid but the sink rejected it.
    Lost,
}

/// Decode, validate, and assemble one payload. `None` means the message is dropped; the
/// reason has already been logged.
pub fn process_payload(payload: &[u8], now_ms: i64) -> Option<NormalizedReading> {
    let message = decode(payload)?;
    let fields = normalize(&message.fields)?;
    Some(assemble(message.node_id, fields, now_ms))
}

/// Runs inbound messages through the pipeline one at a time and hands the readings to a sink.
#[derive(Debug)]
pub struct Pipeline<S> {
    sink: S,
}

impl<S: ReadingSink> Pipeline<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn on_message(&self, topic: &str, payload: &[u8]) -> MessageOutcome {
        let now_ms = Utc::now().timestamp_millis();

        let reading = match panic::catch_unwind(|| process_payload(payload, now_ms)) {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                debug!(topic, "could not extract node id or sensor data");
                return MessageOutcome::Dropped;
            }
            Err(panic) => {
                error!(
                    topic,
                    "error processing message: {}",
                    panic_message(panic.as_ref())
                );
                return MessageOutcome::Dropped;
            }
        };

        info!(
            "Node {}: AQI={} ({}), PM2.5={} µg/m³",
            reading.node_id, reading.aqi.aqi, reading.aqi.category, reading.fields.pm25
        );

        match AssertUnwindSafe(self.sink.write(&reading)).catch_unwind().await {
            Ok(Ok(())) => MessageOutcome::Written,
            Ok(Err(err)) => {
                error!(node_id = %reading.node_id, "failed to write reading: {err:#}");
                MessageOutcome::Lost
            }
            Err(panic) => {
                error!(
                    node_id = %reading.node_id,
                    "sink panicked while writing reading: {}",
                    panic_message(panic.as_ref())
                );
                MessageOutcome::Lost
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
