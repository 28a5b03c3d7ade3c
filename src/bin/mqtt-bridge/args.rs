use clap::Parser;
use pulse_aqi::mqtt::MqttArgs;

#[derive(Debug, Parser)]
pub struct Args {
    #[command(flatten)]
    pub mqtt: MqttArgs,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,
}
