//! BLE notify probe.
//!
//! Connects to the sensor streaming peripheral, subscribes to its sensor
//! characteristic and prints every notification until Ctrl-C.

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use log::{warn, LevelFilter};
use uuid::Uuid;

use notify_probe::config::{gatt, peripheral, timing, CharacteristicSelector, SessionConfig};
use notify_probe::session::{ConsoleHandler, SessionRunner};
use notify_probe::transport::BtleplugTransport;

#[derive(Parser)]
#[command(name = "notify-probe")]
#[command(about = "Subscribe to a BLE characteristic and print its notifications")]
struct Args {
    /// Peripheral address (AA:BB:CC:DD:EE:FF)
    #[arg(short, long, default_value = peripheral::ADDRESS)]
    address: String,

    /// Service to look up
    #[arg(short, long, default_value_t = gatt::SERVICE_UUID)]
    service: Uuid,

    /// Characteristic to subscribe to
    #[arg(short, long, default_value_t = gatt::SENSOR_CHAR_UUID)]
    characteristic: Uuid,

    /// Subscribe to the service's first characteristic instead of --characteristic
    #[arg(long)]
    first_characteristic: bool,

    /// Seconds between heartbeat lines
    #[arg(long, default_value_t = timing::HEARTBEAT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_secs: u64,

    /// Scan and connect timeout in seconds
    #[arg(long, default_value_t = timing::CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    /// Service discovery timeout in seconds
    #[arg(long, default_value_t = timing::DISCOVERY_TIMEOUT_SECS)]
    discovery_timeout_secs: u64,

    /// Subscribe timeout in seconds
    #[arg(long, default_value_t = timing::SUBSCRIBE_TIMEOUT_SECS)]
    subscribe_timeout_secs: u64,

    /// Disconnect timeout in seconds
    #[arg(long, default_value_t = timing::TEARDOWN_TIMEOUT_SECS)]
    teardown_timeout_secs: u64,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        let characteristic = if self.first_characteristic {
            CharacteristicSelector::First
        } else {
            CharacteristicSelector::ById(self.characteristic)
        };

        SessionConfig {
            address: self.address.clone(),
            service: self.service,
            characteristic,
            heartbeat: Duration::from_secs(self.heartbeat_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            discovery_timeout: Duration::from_secs(self.discovery_timeout_secs),
            subscribe_timeout: Duration::from_secs(self.subscribe_timeout_secs),
            teardown_timeout: Duration::from_secs(self.teardown_timeout_secs),
        }
    }
}

/// Log to stderr at info unless RUST_LOG says otherwise
fn init_logging() {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(LevelFilter::Info);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

/// Completes on Ctrl-C
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a handler the process can only be killed
        warn!("Cannot listen for Ctrl-C: {}", e);
        futures::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let config = args.session_config();

    println!("{}", "BLE Notify Probe".bold());
    println!("Peripheral: {}", config.address);
    println!("Service: {}", config.service);
    match config.characteristic {
        CharacteristicSelector::ById(uuid) => println!("Characteristic: {}", uuid),
        CharacteristicSelector::First => println!("Characteristic: first in service"),
    }
    println!();

    let transport = BtleplugTransport::new().await?;
    let mut runner = SessionRunner::new(transport, ConsoleHandler::stdout(), config);

    match runner.run(interrupted()).await {
        Ok(summary) => {
            println!();
            println!(
                "{} {} notifications, {} heartbeats",
                "Done:".green().bold(),
                summary.notifications,
                summary.heartbeats
            );
            Ok(())
        }
        // The handler has already printed the failure
        Err(_) => std::process::exit(1),
    }
}
