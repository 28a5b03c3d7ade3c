#[derive(Clone, PartialEq, prost::Message)]
pub struct Telemetry {
    #[prost(fixed32, tag = "1")]
    pub time: u32,

    #[prost(oneof = "telemetry::Variant", tags = "2, 3, 4")]
    pub variant: Option<telemetry::Variant>,
}

pub mod telemetry {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Variant {
        #[prost(message, tag = "2")]
        DeviceMetrics(super::DeviceMetrics),

        #[prost(message, tag = "3")]
        EnvironmentMetrics(super::EnvironmentMetrics),

        #[prost(message, tag = "4")]
        AirQualityMetrics(super::AirQualityMetrics),
    }
}

impl Telemetry {
    pub fn air_quality_metrics(&self) -> Option<&AirQualityMetrics> {
        match &self.variant {
            Some(telemetry::Variant::AirQualityMetrics(metrics)) => Some(metrics),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeviceMetrics {
    #[prost(uint32, optional, tag = "1")]
    pub battery_level: Option<u32>,

    #[prost(float, optional, tag = "2")]
    pub voltage: Option<f32>,

    #[prost(float, optional, tag = "3")]
    pub channel_utilization: Option<f32>,

    #[prost(float, optional, tag = "4")]
    pub air_util_tx: Option<f32>,

    #[prost(uint32, optional, tag = "5")]
    pub uptime_seconds: Option<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EnvironmentMetrics {
    #[prost(float, optional, tag = "1")]
    pub temperature: Option<f32>,

    #[prost(float, optional, tag = "2")]
    pub relative_humidity: Option<f32>,

    #[prost(float, optional, tag = "3")]
    pub barometric_pressure: Option<f32>,
}

/// Particulate matter readings from the node's air quality sensor.
///
/// `pm10_standard` is PM1.0 and `pm100_standard` is PM10; the names mirror the firmware's
/// tenths-of-a-micron convention.
#[derive(Clone, PartialEq, prost::Message)]
pub struct AirQualityMetrics {
    #[prost(uint32, optional, tag = "1")]
    pub pm10_standard: Option<u32>,

    #[prost(uint32, optional, tag = "2")]
    pub pm25_standard: Option<u32>,

    #[prost(uint32, optional, tag = "3")]
    pub pm100_standard: Option<u32>,

    #[prost(uint32, optional, tag = "4")]
    pub pm10_environmental: Option<u32>,

    #[prost(uint32, optional, tag = "5")]
    pub pm25_environmental: Option<u32>,

    #[prost(uint32, optional, tag = "6")]
    pub pm100_environmental: Option<u32>,

    #[prost(uint32, optional, tag = "13")]
    pub co2: Option<u32>,

    #[prost(uint32, optional, tag = "19")]
    pub pm40_standard: Option<u32>,

    #[prost(float, optional, tag = "21")]
    pub pm_temperature: Option<f32>,

    #[prost(float, optional, tag = "22")]
    pub pm_humidity: Option<f32>,

    #[prost(float, optional, tag = "23")]
    pub pm_voc_idx: Option<f32>,

    #[prost(float, optional, tag = "24")]
    pub pm_nox_idx: Option<f32>,
}
