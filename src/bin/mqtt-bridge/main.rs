mod args;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use pulse_aqi::{
    db::{PgReadingSink, new_pool},
    logging,
    mqtt::MqttSubscription,
    pipeline::Pipeline,
};
use tracing::{error, info, warn};

const DEFAULT_CLIENT_ID: &str = "pulseaqi-bridge";

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

    info!("PulseAQI MQTT to PostgreSQL bridge starting");
    info!("MQTT broker: {}:{}", args.mqtt.host, args.mqtt.port);
    info!("MQTT topic: {}", args.mqtt.topic);

    let pool = new_pool(&args.database_url)
        .await
        .context("failed to initialize database")?;
    let pipeline = Pipeline::new(PgReadingSink::new(pool));

    let mut subscription = MqttSubscription::new(&args.mqtt, DEFAULT_CLIENT_ID);

    loop {
        tokio::select! {
            message = subscription.next_message() => {
                let message = message.context("MQTT subscription failed")?;
                pipeline.on_message(&message.topic, &message.payload).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down gracefully...");
                break;
            }
        }
    }

    if let Err(err) = subscription.disconnect().await {
        warn!("{err:#}");
    }

    Ok(())
}
