//! Hardware tests for the sensor streaming firmware.
//!
//! Run against a flashed, advertising peripheral to check that its
//! notify characteristic actually streams values.

mod tests;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use uuid::Uuid;

use notify_probe::config::{gatt, peripheral, timing};
use notify_probe::transport::BtleplugTransport;

use tests::{print_results, run_all_tests, Target};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Hardware tests for the sensor streaming firmware")]
struct Args {
    /// Peripheral address
    #[arg(short, long, default_value = peripheral::ADDRESS)]
    address: String,

    /// Sensor streaming service
    #[arg(long, default_value_t = gatt::SERVICE_UUID)]
    service: Uuid,

    /// Sensor characteristic
    #[arg(long, default_value_t = gatt::SENSOR_CHAR_UUID)]
    characteristic: Uuid,

    /// Scan and connect timeout in seconds
    #[arg(long, default_value_t = timing::CONNECT_TIMEOUT_SECS)]
    connect_timeout: u64,

    /// Longest gap allowed between two notifications, in seconds
    #[arg(long, default_value = "3")]
    notify_timeout: u64,

    /// Notifications to collect after the first one
    #[arg(long, default_value = "5")]
    samples: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "Sensor Streaming Hardware Tests".bold());
    println!("Peripheral: {}", args.address);
    println!("Service: {}", args.service);
    println!("Characteristic: {}", args.characteristic);
    println!();

    let target = Target {
        address: args.address.parse()?,
        service: args.service,
        characteristic: args.characteristic,
        connect_timeout: Duration::from_secs(args.connect_timeout),
        notify_timeout: Duration::from_secs(args.notify_timeout),
        samples: args.samples,
    };

    println!("Opening Bluetooth adapter...");
    let mut transport = BtleplugTransport::new().await?;
    println!("{}", "Adapter ready!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&mut transport, &target).await;
    print_results(&target, &results);

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed()).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
