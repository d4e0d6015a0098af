#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::peripherals::{BT, GPIO48};
use esp_hal::rng::TrngSource;
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;

use heartbeat_peripheral_firmware::ble::{register_callbacks, EspPlatform};
use heartbeat_peripheral_firmware::config;
use heartbeat_peripheral_firmware::startup;
use heartbeat_peripheral_firmware::tasks::telemetry_task;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

#[esp_hal::main]
fn main() -> ! {
    // Initialise heap allocator for BLE support (64KB - BLE requires significant heap)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Entropy for the security manager; must outlive every Trng
    let _trng_source = TrngSource::new(peripherals.RNG, peripherals.ADC1);

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, peripherals.BT, peripherals.GPIO48));
    })
}

#[embassy_executor::task]
async fn async_main(spawner: Spawner, bt: BT<'static>, led: GPIO48<'static>) {
    let mut platform = EspPlatform::new(spawner, bt, led);

    // A failed step has already been logged; nothing runs after it
    let startup = match startup::bring_up(&mut platform, config::gap::DEVICE_NAME).await {
        Ok(s) => s,
        Err(_) => return,
    };

    let Some(server) = platform.server() else {
        return;
    };

    register_callbacks(startup.enter_steady_state());

    spawner.must_spawn(telemetry_task(server));
}
