use std::path::PathBuf;

use am2320::Am2320;
use am2320_mqtt::bootstrap::announce_device;
use am2320_mqtt::error::DaemonError;
use am2320_mqtt::mqtt::MqttClient;
use am2320_mqtt::publisher::queue;
use am2320_mqtt::telemetry::{LogFormat, default_filter, init_subscriber};
use am2320_mqtt::{Config, PollingController, Topics};
use clap::Parser;
use linux_embedded_hal::{Delay, I2cdev};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "am2320-mqtt")]
#[command(about = "Publishes AM2320 temperature and humidity readings to MQTT")]
struct Cli {
    /// Path to the JSON configuration file
    config: PathBuf,
    /// Log bunyan-formatted JSON instead of plain text
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Invalid configuration is fatal before the bus is opened.
    let config = Config::load(&cli.config)?;

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    let _log_guard = init_subscriber("am2320-mqtt", default_filter(config.debug), format);

    let broker_addr = format!(
        "{}:{}",
        env_or("MQTT_BROKER_HOST", "localhost")?,
        env_or("MQTT_BROKER_PORT", "1883")?
    );
    info!(
        config = ?cli.config,
        broker = %broker_addr,
        device = %config.mqtt_id,
        i2c = ?config.i2c_device(),
        "Starting am2320-mqtt"
    );

    let cancel = CancellationToken::new();
    let (mut publisher, outgoing) = queue();
    let mqtt_handle =
        MqttClient::new(broker_addr, config.mqtt_id.clone(), outgoing, cancel.clone())
            .run_forever();

    let topics = Topics::new(config.mqtt_id.clone());
    announce_device(&mut publisher, &topics, &config.name);

    let i2c = I2cdev::new(config.i2c_device())?;
    let mut sensor = Am2320::new(i2c, Delay);
    match sensor.read_uid() {
        Ok(uid) => info!("Sensor id {uid:#010x}"),
        Err(e) => warn!(error = %e, "Could not read sensor id"),
    }

    let mut controller =
        PollingController::new(sensor, publisher, Delay, topics, config.poll_interval)?
            .with_decimal_places(config.decimal_places);

    let poll_cancel = cancel.clone();
    let poll_handle = tokio::task::spawn_blocking(move || controller.run(&poll_cancel));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel.cancel();

    poll_handle.await?;
    mqtt_handle.await?;
    Ok(())
}

fn env_or(key: &str, default: &str) -> Result<String, DaemonError> {
    match dotenvy::var(key) {
        Ok(value) => Ok(value),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(default.to_owned()),
        Err(e) => Err(e.into()),
    }
}
