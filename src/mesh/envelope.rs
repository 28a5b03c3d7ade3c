//! Wire types for the mesh network's MQTT uplink.
//!
//! Field numbers follow the mesh firmware's `mqtt.proto` and `mesh.proto`. Only the fields the
//! bridge reads are declared; prost skips the rest.

/// What a gateway publishes to the broker: one mesh packet plus routing metadata.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceEnvelope {
    #[prost(message, optional, tag = "1")]
    pub packet: Option<MeshPacket>,

    #[prost(string, tag = "2")]
    pub channel_id: String,

    #[prost(string, tag = "3")]
    pub gateway_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MeshPacket {
    // Declared with explicit presence so that node number 0 is distinguishable from an
    // unpopulated header.
    #[prost(fixed32, optional, tag = "1")]
    pub from: Option<u32>,

    #[prost(fixed32, tag = "2")]
    pub to: u32,

    #[prost(uint32, tag = "3")]
    pub channel: u32,

    #[prost(oneof = "mesh_packet::PayloadVariant", tags = "4, 5")]
    pub payload_variant: Option<mesh_packet::PayloadVariant>,

    #[prost(fixed32, tag = "6")]
    pub id: u32,

    #[prost(fixed32, tag = "7")]
    pub rx_time: u32,

    #[prost(float, tag = "8")]
    pub rx_snr: f32,

    #[prost(uint32, tag = "9")]
    pub hop_limit: u32,

    #[prost(bool, tag = "10")]
    pub want_ack: bool,

    #[prost(int32, tag = "12")]
    pub rx_rssi: i32,
}

pub mod mesh_packet {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum PayloadVariant {
        #[prost(message, tag = "4")]
        Decoded(super::Data),

        #[prost(bytes, tag = "5")]
        Encrypted(Vec<u8>),
    }
}

impl MeshPacket {
    /// Sender node number, `None` when the header field was not populated.
    pub fn sender(&self) -> Option<u32> {
        self.from
    }

    pub fn decoded(&self) -> Option<&Data> {
        match &self.payload_variant {
            Some(mesh_packet::PayloadVariant::Decoded(data)) => Some(data),
            _ => None,
        }
    }

    pub fn encrypted(&self) -> Option<&[u8]> {
        match &self.payload_variant {
            Some(mesh_packet::PayloadVariant::Encrypted(bytes)) => Some(bytes),
            _ => None,
        }
    }
}

/// The application payload of a packet once it is in plaintext.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Data {
    #[prost(enumeration = "super::PortNum", tag = "1")]
    pub portnum: i32,

    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,

    #[prost(bool, tag = "3")]
    pub want_response: bool,

    #[prost(fixed32, tag = "4")]
    pub dest: u32,

    #[prost(fixed32, tag = "5")]
    pub source: u32,

    #[prost(fixed32, tag = "6")]
    pub request_id: u32,

    #[prost(fixed32, tag = "7")]
    pub reply_id: u32,
}
