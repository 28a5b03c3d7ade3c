use std::fmt::Write as _;

use prost::Message as _;
use pulse_aqi::{
    aqi::AqiResult,
    crypto::{KeyDerivation, decrypt},
    decoder::{air_quality_fields, parse_sensor_text},
    mesh::{Data, PortNum, ServiceEnvelope, Telemetry, port_name, telemetry},
    reading::{REQUIRED_FIELDS, RawSensorFields, normalize},
};
use serde_json::Value;

const JSON_TEXT_PREVIEW_CHARS: usize = 120;
const PROTOBUF_TEXT_PREVIEW_CHARS: usize = 200;
const HEX_PREVIEW_BYTES: usize = 64;

#[derive(Debug, Clone)]
pub struct ChannelKey {
    pub psk: Vec<u8>,
    pub derivation: KeyDerivation,
}

/// Renders a human readable description of one MQTT message.
pub fn render(topic: &str, payload: &[u8], key: Option<&ChannelKey>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📬 Topic: {topic}");
    let _ = writeln!(out, "   Bytes: {}", payload.len());

    if let Some(envelope) = parse_json_envelope(payload) {
        render_json(&mut out, &envelope);
    } else {
        match ServiceEnvelope::decode(payload) {
            Ok(envelope) => render_service_envelope(&mut out, &envelope, key),
            Err(err) => {
                let _ = writeln!(out, "   Format: unknown binary ({err})");
                let preview = &payload[..payload.len().min(HEX_PREVIEW_BYTES)];
                let _ = writeln!(out, "   Hex[0:{HEX_PREVIEW_BYTES}]: {}", hex::encode(preview));
            }
        }
    }

    out.push('\n');
    out
}

fn parse_json_envelope(payload: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(payload).ok()?;
    if !text.starts_with('{') {
        return None;
    }
    serde_json::from_str(text).ok()
}

fn render_json(out: &mut String, envelope: &Value) {
    let field = |key: &str| match envelope.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "-".to_string(),
    };

    let _ = writeln!(out, "   Format: JSON");
    let _ = writeln!(
        out,
        "   Type: {} Sender: {} Channel: {}",
        field("type"),
        field("sender"),
        field("channel")
    );

    if envelope.get("type").and_then(Value::as_str) != Some("text") {
        return;
    }

    let text = envelope
        .get("payload")
        .and_then(|p| p.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let _ = writeln!(out, "   Text: {}", preview(text, JSON_TEXT_PREVIEW_CHARS));

    if let Some(fields) = parse_sensor_text(text) {
        render_sensor_data(out, &fields);
    }
}

fn render_service_envelope(out: &mut String, envelope: &ServiceEnvelope, key: Option<&ChannelKey>) {
    let _ = writeln!(out, "   Format: Protobuf");

    let Some(packet) = &envelope.packet else {
        let _ = writeln!(out, "   ⚠ Service envelope carries no packet");
        return;
    };

    let sender = packet
        .sender()
        .map(|from| format!("!{from:08x}"))
        .unwrap_or_else(|| "unknown".to_string());
    let _ = writeln!(out, "   Sender: {sender}");
    let _ = writeln!(out, "   Channel: {}", envelope.channel_id);
    let _ = writeln!(out, "   Gateway: {}", envelope.gateway_id);
    let _ = writeln!(
        out,
        "   RSSI/SNR: {} dBm / {} dB",
        packet.rx_rssi, packet.rx_snr
    );
    let encrypted = packet.encrypted();
    let _ = writeln!(
        out,
        "   Encrypted: {}",
        if encrypted.is_some() { "yes" } else { "no" }
    );

    let decrypted;
    let data = match (packet.decoded(), encrypted, key) {
        (Some(data), _, _) => data,
        (None, Some(ciphertext), Some(key)) => {
            match decrypt(ciphertext, &key.psk, key.derivation)
                .and_then(|plaintext| Data::decode(plaintext.as_slice()).ok())
            {
                Some(data) => {
                    let _ = writeln!(out, "   Decrypted: yes ({:?} key)", key.derivation);
                    decrypted = data;
                    &decrypted
                }
                None => {
                    let _ = writeln!(out, "   ✗ Decryption failed (wrong channel key?)");
                    return;
                }
            }
        }
        (None, Some(_), None) => {
            let _ = writeln!(out, "   ⚠ Encrypted payload present (channel key required)");
            return;
        }
        (None, None, _) => return,
    };

    let _ = writeln!(out, "   Port: {}", port_name(data.portnum));
    match PortNum::try_from(data.portnum) {
        Ok(PortNum::TextMessageApp) => render_text_payload(out, &data.payload),
        Ok(PortNum::TelemetryApp) => render_telemetry_payload(out, &data.payload),
        _ => {
            if !data.payload.is_empty() {
                let _ = writeln!(out, "   Decoded payload bytes: {}", data.payload.len());
            }
        }
    }
}

fn render_text_payload(out: &mut String, payload: &[u8]) {
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(err) => {
            let _ = writeln!(out, "   ✗ Text decode error: {err}");
            return;
        }
    };
    let _ = writeln!(out, "   Text: {}", preview(text, PROTOBUF_TEXT_PREVIEW_CHARS));

    if !text.trim().starts_with('{') {
        return;
    }
    match parse_sensor_text(text) {
        Some(fields) => render_sensor_data(out, &fields),
        None => {
            let _ = writeln!(out, "   (Text not valid JSON)");
        }
    }
}

fn render_telemetry_payload(out: &mut String, payload: &[u8]) {
    let telemetry = match Telemetry::decode(payload) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            let _ = writeln!(out, "   ✗ Telemetry decode error: {err}");
            return;
        }
    };

    match &telemetry.variant {
        Some(telemetry::Variant::AirQualityMetrics(metrics)) => {
            let _ = writeln!(out, "   Telemetry: air quality");
            render_sensor_data(out, &air_quality_fields(metrics));
        }
        Some(telemetry::Variant::EnvironmentMetrics(_)) => {
            let _ = writeln!(out, "   Telemetry: environment");
        }
        Some(telemetry::Variant::DeviceMetrics(_)) => {
            let _ = writeln!(out, "   Telemetry: device");
        }
        None => {
            let _ = writeln!(out, "   Telemetry: other");
        }
    }
}

fn render_sensor_data(out: &mut String, fields: &RawSensorFields) {
    let _ = writeln!(out, "   📊 Sensor Data:");
    for key in REQUIRED_FIELDS {
        if let Some(value) = fields.get(key) {
            let _ = writeln!(out, "      {key}: {value}");
        }
    }

    if let Some(sensor_fields) = normalize(fields) {
        let aqi = AqiResult::from_pm25(sensor_fields.pm25);
        let _ = writeln!(out, "      AQI: {} ({})", aqi.aqi, aqi.category);
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use pulse_aqi::mesh::{AirQualityMetrics, MeshPacket, mesh_packet};
    use serde_json::json;

    use super::*;

    const SENSOR_JSON: &str =
        r#"{"pm1":3,"pm25":4.5,"pm4":5,"pm10":5,"voc":103.0,"nox":1.0,"t":24.7,"rh":63.8}"#;

    fn envelope(payload_variant: mesh_packet::PayloadVariant) -> Vec<u8> {
        ServiceEnvelope {
            packet: Some(MeshPacket {
                from: Some(0xe702_87b5),
                payload_variant: Some(payload_variant),
                rx_rssi: -97,
                rx_snr: 6.5,
                ..Default::default()
            }),
            channel_id: "pulse-aqi".to_string(),
            gateway_id: "!gatewaynode".to_string(),
        }
        .encode_to_vec()
    }

    fn text_data() -> Data {
        Data {
            portnum: PortNum::TextMessageApp as i32,
            payload: SENSOR_JSON.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn renders_json_envelope() {
        let payload = json!({
            "type": "text",
            "sender": "nodeA",
            "channel": 0,
            "payload": { "text": SENSOR_JSON },
        })
        .to_string();

        let report = render("msh/US/2/e/pulse-aqi/json", payload.as_bytes(), None);

        assert!(report.contains("Format: JSON"));
        assert!(report.contains("Type: text Sender: nodeA Channel: 0"));
        assert!(report.contains("pm25: 4.5"));
        assert!(report.contains("AQI: 18 (Good)"));
    }

    #[test]
    fn renders_text_packet() {
        let payload = envelope(mesh_packet::PayloadVariant::Decoded(text_data()));

        let report = render("topic", &payload, None);

        assert!(report.contains("Format: Protobuf"));
        assert!(report.contains("Sender: !e70287b5"));
        assert!(report.contains("Gateway: !gatewaynode"));
        assert!(report.contains("RSSI/SNR: -97 dBm / 6.5 dB"));
        assert!(report.contains("Encrypted: no"));
        assert!(report.contains("Port: TEXT_MESSAGE_APP"));
        assert!(report.contains("rh: 63.8"));
    }

    #[test]
    fn renders_air_quality_telemetry() {
        let telemetry = Telemetry {
            time: 0,
            variant: Some(telemetry::Variant::AirQualityMetrics(AirQualityMetrics {
                pm25_standard: Some(36),
                ..Default::default()
            })),
        };
        let payload = envelope(mesh_packet::PayloadVariant::Decoded(Data {
            portnum: PortNum::TelemetryApp as i32,
            payload: telemetry.encode_to_vec(),
            ..Default::default()
        }));

        let report = render("topic", &payload, None);

        assert!(report.contains("Port: TELEMETRY_APP"));
        assert!(report.contains("Telemetry: air quality"));
        assert!(report.contains("AQI: 102 (Unhealthy for Sensitive Groups)"));
    }

    #[test]
    fn reports_encrypted_packet_without_key() {
        let payload = envelope(mesh_packet::PayloadVariant::Encrypted(vec![1, 2, 3, 4, 5]));

        let report = render("topic", &payload, None);

        assert!(report.contains("Encrypted: yes"));
        assert!(report.contains("channel key required"));
    }

    #[test]
    fn decrypts_packet_with_key() {
        let key = ChannelKey {
            psk: b"pulse-aqi-psk".to_vec(),
            derivation: KeyDerivation::Raw,
        };
        // CTR is symmetric, so running the plaintext through decrypt produces the ciphertext.
        let nonce = [9u8, 8, 7, 6];
        let mut input = nonce.to_vec();
        input.extend(text_data().encode_to_vec());
        let mut encrypted = nonce.to_vec();
        encrypted.extend(decrypt(&input, &key.psk, key.derivation).unwrap());

        let payload = envelope(mesh_packet::PayloadVariant::Encrypted(encrypted));
        let report = render("topic", &payload, Some(&key));

        assert!(report.contains("Decrypted: yes (Raw key)"));
        assert!(report.contains("Port: TEXT_MESSAGE_APP"));
        assert!(report.contains("AQI: 18 (Good)"));
    }

    #[test]
    fn renders_hex_for_unknown_binary() {
        let report = render("topic", &[0xff, 0xff, 0xff, 0xff], None);

        assert!(report.contains("Format: unknown binary"));
        assert!(report.contains("Hex[0:64]: ffffffff"));
    }

    #[test]
    fn previews_long_text() {
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("abc", 3), "abc");
        assert_eq!(preview("µµµµ", 2), "µµ...");
    }
}
