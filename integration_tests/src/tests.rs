//! Integration test cases.

use std::time::Duration;

use anyhow::{anyhow, ensure, Result};
use btleplug::api::bleuuid::uuid_from_u16;
use colored::Colorize;

use crate::ble_client::{
    BleClient, Discovered, ADVERTISED_SERVICES_16, ADVERTISED_VENDOR_UUID, BODY_SENSOR_LOCATION,
    FIRMWARE_REVISION, MANUFACTURER_NAME, MODEL_NUMBER, NUS_SERVICE_UUID,
};

/// Test result.
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

impl TestResult {
    fn from_outcome(name: &str, outcome: Result<()>) -> Self {
        match outcome {
            Ok(()) => Self {
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(e) => Self {
                name: name.to_string(),
                passed: false,
                message: Some(e.to_string()),
            },
        }
    }
}

/// Print and record the outcome of a test as it happens.
fn record(results: &mut Vec<TestResult>, name: &str, outcome: Result<()>) {
    let result = TestResult::from_outcome(name, outcome);

    if result.passed {
        println!("  {} ... {}", name, "PASS".green().bold());
    } else {
        println!("  {} ... {}", name, "FAIL".red().bold());
        if let Some(msg) = &result.message {
            println!("    {}", msg.red());
        }
    }

    results.push(result);
}

/// Checks that only need the advertising report.
pub fn run_advertising_tests(discovered: &Discovered) -> Vec<TestResult> {
    let mut results = Vec::new();

    record(
        &mut results,
        "Advertises HRS, BAS and DIS",
        test_advertised_services(discovered),
    );
    record(
        &mut results,
        "Advertises vendor UART UUID",
        test_advertised_vendor_uuid(discovered),
    );

    results
}

/// Checks against a connected device.
pub async fn run_connected_tests(client: &BleClient, sample: Duration) -> Vec<TestResult> {
    let mut results = Vec::new();

    record(&mut results, "GATT table has UART service", test_uart_service(client));
    record(
        &mut results,
        "Body sensor location is chest",
        test_body_sensor_location(client).await,
    );
    record(
        &mut results,
        "Device information strings readable",
        test_device_information(client).await,
    );
    record(
        &mut results,
        "Heart rate notifications advance and wrap",
        test_heart_rate_notifications(client, sample).await,
    );
    record(
        &mut results,
        "Battery level decrements and never hits zero",
        test_battery_level(client).await,
    );

    results
}

/// Print test results summary.
pub fn print_results(results: &[TestResult]) {
    println!("\n{}", "=".repeat(60));
    println!("{}", "Test Results".bold());
    println!("{}", "=".repeat(60));

    let mut passed = 0;
    let mut failed = 0;

    for result in results {
        if result.passed {
            println!("  {} {}", "[PASS]".green().bold(), result.name);
            passed += 1;
        } else {
            println!("  {} {}", "[FAIL]".red().bold(), result.name);
            failed += 1;
        }
    }

    println!("{}", "=".repeat(60));
    println!(
        "Total: {} passed, {} failed",
        passed.to_string().green(),
        failed.to_string().red()
    );
}

fn test_advertised_services(discovered: &Discovered) -> Result<()> {
    for uuid16 in ADVERTISED_SERVICES_16 {
        let uuid = uuid_from_u16(uuid16);
        ensure!(
            discovered.services.contains(&uuid),
            "Service 0x{:04X} missing from advertisement",
            uuid16
        );
    }
    Ok(())
}

fn test_advertised_vendor_uuid(discovered: &Discovered) -> Result<()> {
    ensure!(
        discovered.services.contains(&ADVERTISED_VENDOR_UUID),
        "Vendor UUID {} missing from advertisement",
        ADVERTISED_VENDOR_UUID
    );
    Ok(())
}

fn test_uart_service(client: &BleClient) -> Result<()> {
    ensure!(client.has_service(NUS_SERVICE_UUID), "UART service not in GATT table");
    Ok(())
}

async fn test_body_sensor_location(client: &BleClient) -> Result<()> {
    let value = client.read(BODY_SENSOR_LOCATION).await?;
    ensure!(value == [0x01], "Expected chest (0x01), got {:02x?}", value);
    Ok(())
}

async fn test_device_information(client: &BleClient) -> Result<()> {
    for uuid16 in [MANUFACTURER_NAME, MODEL_NUMBER, FIRMWARE_REVISION] {
        let value = client.read_string(uuid16).await?;
        ensure!(!value.is_empty(), "Characteristic 0x{:04X} is empty", uuid16);
    }
    Ok(())
}

async fn test_heart_rate_notifications(client: &BleClient, sample: Duration) -> Result<()> {
    let measurements = client.collect_measurements(sample).await;
    ensure!(
        measurements.len() >= 2,
        "Expected at least 2 notifications, got {}",
        measurements.len()
    );

    let mut previous: Option<u8> = None;
    for value in &measurements {
        ensure!(value.len() == 2, "Unexpected measurement length {}", value.len());
        ensure!(value[0] == 0x06, "Unexpected flags 0x{:02X}", value[0]);

        let bpm = value[1];
        ensure!((90..160).contains(&bpm), "Heart rate {} out of range", bpm);

        if let Some(prev) = previous {
            let expected = if prev == 159 { 90 } else { prev + 1 };
            ensure!(bpm == expected, "Heart rate went {} -> {}", prev, bpm);
        }
        previous = Some(bpm);
    }
    Ok(())
}

async fn test_battery_level(client: &BleClient) -> Result<()> {
    let first = client.battery_level().await?;

    // Poll until the next tick lands
    let mut second = first;
    for _ in 0..15 {
        tokio::time::sleep(Duration::from_millis(200)).await;
        second = client.battery_level().await?;
        if second != first {
            break;
        }
    }

    for level in [first, second] {
        ensure!((1..=100).contains(&level), "Battery level {} out of range", level);
    }

    let expected = if first == 1 { 100 } else { first - 1 };
    if second != expected {
        return Err(anyhow!(
            "Battery went {} -> {} over one tick (expected {})",
            first,
            second,
            expected
        ));
    }
    Ok(())
}
