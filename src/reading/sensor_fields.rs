use anyhow::{Context as _, Result, anyhow, bail};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Keys every sensor message has to carry, in the order the sensors report them.
pub const REQUIRED_FIELDS: [&str; 8] = ["pm1", "pm25", "pm4", "pm10", "voc", "nox", "t", "rh"];

/// Sensor values as they came off the wire, before validation.
pub type RawSensorFields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorFields {
    pub pm1: f64,

    pub pm25: f64,

    pub pm4: f64,

    pub pm10: f64,

    pub voc: f64,

    pub nox: f64,

    #[serde(rename = "t")]
    pub temperature: f64,

    #[serde(rename = "rh")]
    pub humidity: f64,
}

/// Validates a raw mapping into [`SensorFields`].
///
/// All eight [`REQUIRED_FIELDS`] must be present and convertible to `f64`; anything else is
/// logged and yields `None`.
pub fn normalize(raw: &RawSensorFields) -> Option<SensorFields> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|key| !raw.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        let received = serde_json::to_string(raw).unwrap_or_default();
        warn!(?missing, "missing required sensor fields in: {received}");
        return None;
    }

    match parse_sensor_fields(raw) {
        Ok(fields) => Some(fields),
        Err(err) => {
            warn!("invalid sensor fields: {err:#}");
            None
        }
    }
}

fn parse_sensor_fields(raw: &RawSensorFields) -> Result<SensorFields> {
    Ok(SensorFields {
        pm1: get_f64(raw, "pm1")?,
        pm25: get_f64(raw, "pm25")?,
        pm4: get_f64(raw, "pm4")?,
        pm10: get_f64(raw, "pm10")?,
        voc: get_f64(raw, "voc")?,
        nox: get_f64(raw, "nox")?,
        temperature: get_f64(raw, "t")?,
        humidity: get_f64(raw, "rh")?,
    })
}

fn get_f64(raw: &RawSensorFields, key: &str) -> Result<f64> {
    let value = raw
        .get(key)
        .ok_or_else(|| anyhow!("sensor field not found: {key}"))?;

    coerce_f64(value).with_context(|| format!("failed to convert sensor field {key}: {value}"))
}

fn coerce_f64(value: &Value) -> Result<f64> {
    let number: f64 = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow!("number not representable as f64")),
        Value::String(s) => s
            .trim()
            .parse()
            .with_context(|| format!("not a number: {s:?}")),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => bail!("not a scalar value"),
    }?;

    if !number.is_finite() {
        bail!("not a finite number: {number}");
    }
    Ok(number)
}
