//! Format detection for payloads published on the mesh MQTT topic.
//!
//! Three encodings show up on the channel:
//!
//! - a JSON envelope (`{"type": "text", "sender": ..., "payload": {"text": ...}}`) whose text is
//!   itself the sensor JSON,
//! - a protobuf [`ServiceEnvelope`] whose packet is on the text message port and carries the
//!   sensor JSON as UTF-8,
//! - a protobuf [`ServiceEnvelope`] whose packet is on the telemetry port and carries a
//!   [`Telemetry`] message with air quality metrics.
//!
//! Each format has a `try_decode_as_*` function; they run in that order and the first one that
//! recognises the payload decides the outcome.

use prost::Message as _;
use serde_json::Value;
use tracing::debug;

use crate::mesh::{AirQualityMetrics, PortNum, ServiceEnvelope, Telemetry, port_name};
use crate::reading::{NodeId, RawSensorFields};

const DEFAULT_JSON_SENDER: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub node_id: NodeId,
    pub fields: RawSensorFields,
}

/// Result of trying one wire format.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// The payload is not in this format; the next format may still match.
    NotThisFormat,
    /// The payload is in this format but carries nothing usable.
    Dropped,
    Decoded(DecodedMessage),
}

impl Detection {
    fn or_try(self, next: impl FnOnce() -> Detection) -> Detection {
        match self {
            Detection::NotThisFormat => next(),
            detected => detected,
        }
    }
}

/// Extracts the sender and raw sensor fields from a payload, or `None` when the payload is not
/// sensor data this bridge understands.
pub fn decode(payload: &[u8]) -> Option<DecodedMessage> {
    match try_decode_as_json_envelope(payload)
        .or_try(|| try_decode_as_service_envelope(payload))
    {
        Detection::Decoded(message) => Some(message),
        Detection::Dropped => None,
        Detection::NotThisFormat => {
            debug!(
                "payload is neither a JSON envelope nor a service envelope ({} bytes)",
                payload.len()
            );
            None
        }
    }
}

pub fn try_decode_as_json_envelope(payload: &[u8]) -> Detection {
    let Ok(text) = std::str::from_utf8(payload) else {
        return Detection::NotThisFormat;
    };
    let Ok(envelope) = serde_json::from_str::<Value>(text) else {
        return Detection::NotThisFormat;
    };

    let message_type = envelope.get("type");
    if message_type.and_then(Value::as_str) != Some("text") {
        debug!(?message_type, "skipping non-text message type");
        return Detection::Dropped;
    }

    let sender = match envelope.get("sender") {
        None => DEFAULT_JSON_SENDER,
        Some(Value::String(sender)) => sender.as_str(),
        Some(other) => {
            debug!(sender = %other, "JSON envelope sender is not a string");
            return Detection::Dropped;
        }
    };
    let Some(node_id) = NodeId::new(sender) else {
        debug!("JSON envelope has an empty sender");
        return Detection::Dropped;
    };

    let text = envelope
        .get("payload")
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    match parse_sensor_text(text) {
        Some(fields) => Detection::Decoded(DecodedMessage { node_id, fields }),
        None => Detection::Dropped,
    }
}

pub fn try_decode_as_service_envelope(payload: &[u8]) -> Detection {
    let envelope = match ServiceEnvelope::decode(payload) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!("not a service envelope: {err}");
            return Detection::NotThisFormat;
        }
    };

    let Some(packet) = envelope.packet else {
        debug!("service envelope carries no packet");
        return Detection::Dropped;
    };

    let Some(sender) = packet.sender() else {
        debug!("packet has no sender");
        return Detection::Dropped;
    };
    let node_id = NodeId::from_node_num(sender);

    let Some(data) = packet.decoded() else {
        debug!(%node_id, "packet has no decoded payload (encrypted: {})", packet.encrypted().is_some());
        return Detection::Dropped;
    };

    let fields = match PortNum::try_from(data.portnum) {
        Ok(PortNum::TextMessageApp) => decode_text_payload(&data.payload),
        Ok(PortNum::TelemetryApp) => decode_telemetry_payload(&data.payload),
        _ => {
            debug!(%node_id, port = %port_name(data.portnum), "skipping non-sensor message");
            None
        }
    };

    match fields {
        Some(fields) => Detection::Decoded(DecodedMessage { node_id, fields }),
        None => Detection::Dropped,
    }
}

/// Parses sensor JSON carried as message text. Anything that does not start with `{` once
/// trimmed is ordinary chat and yields `None`.
pub fn parse_sensor_text(text: &str) -> Option<RawSensorFields> {
    let text = text.trim();
    if !text.starts_with('{') {
        debug!("text payload is not JSON");
        return None;
    }

    match serde_json::from_str(text) {
        Ok(fields) => Some(fields),
        Err(err) => {
            debug!("failed to parse sensor JSON: {err}");
            None
        }
    }
}

fn decode_text_payload(payload: &[u8]) -> Option<RawSensorFields> {
    match std::str::from_utf8(payload) {
        Ok(text) => parse_sensor_text(text),
        Err(err) => {
            debug!("text message payload is not UTF-8: {err}");
            None
        }
    }
}

fn decode_telemetry_payload(payload: &[u8]) -> Option<RawSensorFields> {
    let telemetry = match Telemetry::decode(payload) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            debug!("failed to decode telemetry payload: {err}");
            return None;
        }
    };

    let Some(metrics) = telemetry.air_quality_metrics() else {
        debug!("telemetry carries no air quality metrics");
        return None;
    };

    Some(air_quality_fields(metrics))
}

/// Maps air quality metrics onto the sensor JSON keys.
///
/// Unset or non-positive concentrations and indices read as 0, as do unset temperature and
/// humidity.
pub fn air_quality_fields(metrics: &AirQualityMetrics) -> RawSensorFields {
    let count = |v: Option<u32>| f64::from(v.unwrap_or(0));
    let index = |v: Option<f32>| v.filter(|v| *v > 0.0).map(f64::from).unwrap_or(0.0);
    let climate = |v: Option<f32>| v.map(f64::from).unwrap_or(0.0);

    [
        ("pm1", count(metrics.pm10_standard)),
        ("pm25", count(metrics.pm25_standard)),
        ("pm4", count(metrics.pm40_standard)),
        ("pm10", count(metrics.pm100_standard)),
        ("voc", index(metrics.pm_voc_idx)),
        ("nox", index(metrics.pm_nox_idx)),
        ("t", climate(metrics.pm_temperature)),
        ("rh", climate(metrics.pm_humidity)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), Value::from(value)))
    .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::mesh::{Data, EnvironmentMetrics, MeshPacket, mesh_packet, telemetry};

    const SENSOR_JSON: &str =
        r#"{"pm1":3,"pm25":4.5,"pm4":5,"pm10":5,"voc":103.0,"nox":1.0,"t":24.7,"rh":63.8}"#;

    fn json_envelope(message_type: &str, sender: Option<&str>, text: &str) -> Vec<u8> {
        let mut envelope = json!({
            "type": message_type,
            "payload": { "text": text },
        });
        if let Some(sender) = sender {
            envelope["sender"] = json!(sender);
        }
        envelope.to_string().into_bytes()
    }

    fn service_envelope(from: Option<u32>, portnum: i32, payload: Vec<u8>) -> Vec<u8> {
        ServiceEnvelope {
            packet: Some(MeshPacket {
                from,
                to: 0xffff_ffff,
                payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                    portnum,
                    payload,
                    ..Default::default()
                })),
                ..Default::default()
            }),
            channel_id: "pulse-aqi".to_string(),
            gateway_id: "!gatewaynode".to_string(),
        }
        .encode_to_vec()
    }

    fn telemetry_payload(variant: telemetry::Variant) -> Vec<u8> {
        Telemetry {
            time: 1_760_000_000,
            variant: Some(variant),
        }
        .encode_to_vec()
    }

    #[test]
    fn decodes_json_envelope() {
        let message = decode(&json_envelope("text", Some("nodeA"), SENSOR_JSON)).unwrap();

        assert_eq!(message.node_id.as_str(), "nodeA");
        assert_eq!(message.fields["pm25"], json!(4.5));
        assert_eq!(message.fields.len(), 8);
    }

    #[test]
    fn json_envelope_without_sender_is_unknown() {
        let message = decode(&json_envelope("text", None, SENSOR_JSON)).unwrap();
        assert_eq!(message.node_id.as_str(), "unknown");
    }

    #[test]
    fn json_envelope_with_empty_sender_is_dropped() {
        assert_eq!(decode(&json_envelope("text", Some(""), SENSOR_JSON)), None);
    }

    #[test]
    fn non_text_json_envelope_is_dropped() {
        for message_type in ["position", "nodeinfo", "telemetry", ""] {
            let payload = json_envelope(message_type, Some("nodeA"), SENSOR_JSON);
            assert_eq!(
                try_decode_as_json_envelope(&payload),
                Detection::Dropped,
                "type = {message_type:?}"
            );
        }
    }

    #[test]
    fn json_envelope_with_plain_text_is_dropped() {
        let payload = json_envelope("text", Some("nodeA"), "hello mesh");
        assert_eq!(try_decode_as_json_envelope(&payload), Detection::Dropped);
    }

    #[test]
    fn json_envelope_with_malformed_sensor_json_is_dropped() {
        let payload = json_envelope("text", Some("nodeA"), r#"{"pm25": 4"#);
        assert_eq!(try_decode_as_json_envelope(&payload), Detection::Dropped);
    }

    #[test]
    fn json_envelope_text_is_trimmed() {
        let payload = json_envelope("text", Some("nodeA"), &format!("  \n{SENSOR_JSON}\n"));
        assert!(decode(&payload).is_some());
    }

    #[test]
    fn binary_payload_is_not_json() {
        let payload = service_envelope(
            Some(0xe702_87b5),
            PortNum::TextMessageApp as i32,
            SENSOR_JSON.as_bytes().to_vec(),
        );
        assert_eq!(try_decode_as_json_envelope(&payload), Detection::NotThisFormat);
    }

    #[test]
    fn decodes_text_port() {
        let payload = service_envelope(
            Some(0xe702_87b5),
            PortNum::TextMessageApp as i32,
            SENSOR_JSON.as_bytes().to_vec(),
        );

        let message = decode(&payload).unwrap();
        assert_eq!(message.node_id.as_str(), "!e70287b5");
        assert_eq!(message.fields["rh"], json!(63.8));
    }

    #[test]
    fn sender_zero_is_a_valid_node() {
        let payload = service_envelope(
            Some(0),
            PortNum::TextMessageApp as i32,
            SENSOR_JSON.as_bytes().to_vec(),
        );

        assert_eq!(decode(&payload).unwrap().node_id.as_str(), "!00000000");
    }

    #[test]
    fn missing_sender_is_dropped() {
        let payload = service_envelope(
            None,
            PortNum::TextMessageApp as i32,
            SENSOR_JSON.as_bytes().to_vec(),
        );

        assert_eq!(try_decode_as_service_envelope(&payload), Detection::Dropped);
    }

    #[test]
    fn text_port_rejects_invalid_utf8() {
        let mut bytes = SENSOR_JSON.as_bytes().to_vec();
        bytes.push(0xff);
        let payload = service_envelope(Some(1), PortNum::TextMessageApp as i32, bytes);

        assert_eq!(decode(&payload), None);
    }

    #[test]
    fn text_port_rejects_chat_text() {
        let payload = service_envelope(
            Some(1),
            PortNum::TextMessageApp as i32,
            b"Hello World".to_vec(),
        );

        assert_eq!(decode(&payload), None);
    }

    #[test]
    fn other_ports_are_dropped() {
        for port in [PortNum::PositionApp, PortNum::NodeinfoApp, PortNum::UnknownApp] {
            let payload =
                service_envelope(Some(1), port as i32, SENSOR_JSON.as_bytes().to_vec());
            assert_eq!(decode(&payload), None, "port = {port:?}");
        }

        let payload = service_envelope(Some(1), 4242, SENSOR_JSON.as_bytes().to_vec());
        assert_eq!(decode(&payload), None);
    }

    #[test]
    fn encrypted_packet_is_dropped() {
        let payload = ServiceEnvelope {
            packet: Some(MeshPacket {
                from: Some(0x1234_5678),
                payload_variant: Some(mesh_packet::PayloadVariant::Encrypted(vec![
                    1, 2, 3, 4, 5,
                ])),
                ..Default::default()
            }),
            ..Default::default()
        }
        .encode_to_vec();

        assert_eq!(try_decode_as_service_envelope(&payload), Detection::Dropped);
    }

    #[test]
    fn decodes_air_quality_telemetry() {
        let metrics = AirQualityMetrics {
            pm10_standard: Some(3),
            pm25_standard: Some(12),
            pm40_standard: Some(15),
            pm100_standard: Some(20),
            pm_voc_idx: Some(103.0),
            pm_nox_idx: Some(1.0),
            pm_temperature: Some(-4.5),
            pm_humidity: Some(63.5),
            ..Default::default()
        };
        let payload = service_envelope(
            Some(0xe702_87b5),
            PortNum::TelemetryApp as i32,
            telemetry_payload(telemetry::Variant::AirQualityMetrics(metrics)),
        );

        let message = decode(&payload).unwrap();
        assert_eq!(message.node_id.as_str(), "!e70287b5");
        assert_eq!(
            Value::Object(message.fields),
            json!({
                "pm1": 3.0,
                "pm25": 12.0,
                "pm4": 15.0,
                "pm10": 20.0,
                "voc": 103.0,
                "nox": 1.0,
                "t": -4.5,
                "rh": 63.5,
            })
        );
    }

    #[test]
    fn telemetry_without_air_quality_is_dropped() {
        let environment = EnvironmentMetrics {
            temperature: Some(21.0),
            relative_humidity: Some(40.0),
            ..Default::default()
        };
        let payload = service_envelope(
            Some(1),
            PortNum::TelemetryApp as i32,
            telemetry_payload(telemetry::Variant::EnvironmentMetrics(environment)),
        );

        assert_eq!(decode(&payload), None);
    }

    #[test]
    fn non_positive_indices_read_as_zero() {
        let metrics = AirQualityMetrics {
            pm_voc_idx: Some(-1.0),
            pm_nox_idx: Some(0.0),
            ..Default::default()
        };

        let fields = air_quality_fields(&metrics);
        assert_eq!(fields["voc"], json!(0.0));
        assert_eq!(fields["nox"], json!(0.0));
        assert_eq!(fields["pm25"], json!(0.0));
        assert_eq!(fields["t"], json!(0.0));
    }

    #[test]
    fn garbage_is_not_recognised() {
        assert_eq!(decode(&[0xff, 0xff, 0xff, 0xff]), None);
        assert_eq!(
            try_decode_as_service_envelope(&[0xff, 0xff, 0xff, 0xff]),
            Detection::NotThisFormat
        );
    }

    #[test]
    fn empty_payload_is_dropped() {
        assert_eq!(decode(&[]), None);
    }
}
