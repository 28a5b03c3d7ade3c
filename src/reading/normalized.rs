use chrono::{DateTime, Utc};

use crate::aqi::AqiResult;
use crate::reading::{NodeId, SensorFields};

/// One validated reading, ready to be written to storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    pub node_id: NodeId,

    /// Milliseconds since the Unix epoch at which the bridge assembled the reading.
    pub timestamp_ms: i64,

    pub fields: SensorFields,

    pub aqi: AqiResult,
}

impl NormalizedReading {
    pub fn measured_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

pub fn assemble(node_id: NodeId, fields: SensorFields, now_ms: i64) -> NormalizedReading {
    NormalizedReading {
        aqi: AqiResult::from_pm25(fields.pm25),
        node_id,
        timestamp_ms: now_ms,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;
    use crate::aqi::AqiCategory;

    fn fields(pm25: f64) -> SensorFields {
        SensorFields {
            pm1: 1.0,
            pm25,
            pm4: 2.0,
            pm10: 3.0,
            voc: 100.0,
            nox: 1.0,
            temperature: 21.5,
            humidity: 40.0,
        }
    }

    #[test]
    fn computes_aqi_from_pm25() {
        let reading = assemble(NodeId::from_node_num(7), fields(150.5), 0);

        assert_eq!(reading.aqi.aqi, 201);
        assert_eq!(reading.aqi.category, AqiCategory::VeryUnhealthy);
        assert_eq!(reading.node_id.as_str(), "!00000007");
    }

    #[test]
    fn keeps_assembly_timestamp() {
        let now_ms = 1_760_000_000_123;
        let reading = assemble(NodeId::new("nodeA").unwrap(), fields(4.5), now_ms);

        assert_eq!(reading.timestamp_ms, now_ms);
        assert_eq!(
            reading.measured_at(),
            Some(Utc.timestamp_millis_opt(now_ms).unwrap())
        );
    }
}
