//! Integration tests for the heart-rate peripheral firmware.
//!
//! Run after flashing the firmware: scans for the device, checks its
//! advertising payload, then connects and samples live telemetry.

mod ble_client;
mod tests;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::BleClient;
use tests::{print_results, run_advertising_tests, run_connected_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the heart-rate peripheral firmware")]
struct Args {
    /// BLE device name to scan for
    #[arg(short, long, default_value = "Heartbeat Peripheral")]
    name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,

    /// How long to collect heart-rate notifications, in seconds
    #[arg(long, default_value = "5")]
    sample: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "Heartbeat Peripheral Integration Tests".bold());
    println!("Scanning for \"{}\"...", args.name);

    let discovered =
        BleClient::discover(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Found!".green());

    println!("\nRunning advertising tests...\n");
    let mut results = run_advertising_tests(&discovered);

    println!("\nConnecting...");
    let client = BleClient::connect(discovered).await?;
    println!("{}", "Connected!".green());

    println!("\nRunning connected tests...\n");
    results.extend(run_connected_tests(&client, Duration::from_secs(args.sample)).await);

    client.disconnect().await?;
    print_results(&results);

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
