mod args;
mod report;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use pulse_aqi::{logging, mqtt::MqttSubscription};
use tracing::{error, info, warn};

use crate::report::{ChannelKey, render};

const DEFAULT_CLIENT_ID: &str = "pulseaqi-decoder";

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    if let Err(e) = run().await {
        error!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let key = args.psk.map(|psk| ChannelKey {
        psk: psk.0,
        derivation: args.key_derivation,
    });
    if let Some(key) = &key {
        info!(
            "Decrypting packets with a {} byte channel key ({:?} derivation)",
            key.psk.len(),
            key.derivation
        );
    }

    info!(
        "Listening on {}:{} topic {} (Ctrl+C to stop)",
        args.mqtt.host, args.mqtt.port, args.mqtt.topic
    );
    let mut subscription = MqttSubscription::new(&args.mqtt, DEFAULT_CLIENT_ID);

    loop {
        tokio::select! {
            message = subscription.next_message() => {
                let message = message.context("MQTT subscription failed")?;
                print!("{}", render(&message.topic, &message.payload, key.as_ref()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    if let Err(err) = subscription.disconnect().await {
        warn!("{err:#}");
    }

    Ok(())
}
