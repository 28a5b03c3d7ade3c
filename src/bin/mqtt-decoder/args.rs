use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use clap::Parser;
use pulse_aqi::{crypto::KeyDerivation, mqtt::MqttArgs};

#[derive(Debug, Parser)]
pub struct Args {
    #[command(flatten)]
    pub mqtt: MqttArgs,

    /// Base64 channel key used to decrypt packets that arrive without a plaintext payload.
    #[arg(long, env = "MESH_PSK", hide_env_values = true)]
    pub psk: Option<Psk>,

    #[arg(long, env = "MESH_KEY_DERIVATION", value_enum, default_value_t = KeyDerivation::Raw)]
    pub key_derivation: KeyDerivation,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Psk(pub Vec<u8>);

impl FromStr for Psk {
    type Err = base64::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STANDARD.decode(s.trim()).map(Psk)
    }
}

impl fmt::Debug for Psk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Psk({} bytes)", self.0.len())
    }
}
