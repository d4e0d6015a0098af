//! BLE host task
//!
//! Runs the TrouBLE host, advertises with the payload from startup, and turns
//! connection, disconnection and pairing events into calls on the
//! connection handlers. While a peer is connected, telemetry from
//! [`TELEMETRY_CHANNEL`] is notified to it.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Ticker};
use esp_hal::rng::Trng;
use log::{info, warn};
use trouble_host::prelude::*;

use crate::advertising::{readvertise, Advertise, AdvertisingData};
use crate::ble::platform::{
    BleController, Led, Measurement, ADVERTISING_REQUEST, ADVERTISING_RESULT, CALLBACKS,
    TELEMETRY_CHANNEL,
};
use crate::ble::service::Server;
use crate::config::gap;
use crate::events::{self, AddressKind, ConnectStatus, PeerAddress};
use crate::indicator::{AppContext, IndicatorError};
use crate::startup::HostError;
use crate::telemetry::encode_heart_rate_measurement;

/// Task that manages BLE connectivity
#[embassy_executor::task]
pub async fn ble_host_task(
    controller: BleController,
    server: &'static Server<'static>,
    mut rng: Trng,
) {
    ble_task(controller, server, &mut rng).await;
}

/// Main BLE task that manages the Bluetooth stack and connections
///
/// This task:
/// 1. Builds the host stack and starts its runner
/// 2. Advertises once startup hands over the payload, reporting the result
/// 3. Waits for the connection handlers to be registered
/// 4. Accepts connections one at a time, re-advertising after each disconnect
pub async fn ble_task<C: Controller>(
    controller: C,
    server: &'static Server<'static>,
    rng: &mut Trng,
) {
    let mut resources: HostResources<DefaultPacketPool, { gap::CONNECTIONS_MAX }, { gap::L2CAP_CHANNELS_MAX }> =
        HostResources::new();

    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random(gap::STATIC_ADDRESS))
        .set_random_generator_seed(rng);

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    // Run both the BLE runner and peripheral logic concurrently using select
    let runner_task = async {
        if let Err(e) = runner.run().await {
            warn!("BLE: Host runner stopped ({:?})", e);
        }
    };

    let peripheral_task = async {
        let payload: AdvertisingData = ADVERTISING_REQUEST.wait().await;

        let advertiser = match peripheral
            .advertise(&Default::default(), connectable(&payload))
            .await
        {
            Ok(a) => {
                ADVERTISING_RESULT.signal(Ok(()));
                Some(a)
            }
            Err(e) => {
                warn!("BLE: Advertising rejected ({:?})", e);
                ADVERTISING_RESULT.signal(Err(HostError::Advertising));
                None
            }
        };

        // Callback registration proceeds regardless of the advertising outcome
        let mut context = CALLBACKS.wait().await;

        let mut advertiser = match advertiser {
            Some(a) => a,
            None => {
                // Advertising is gone; keep the runner alive for the rest of the firmware
                info!("BLE: Peripheral idle");
                return core::future::pending::<()>().await;
            }
        };

        loop {
            let acceptor = match advertiser.accept().await {
                Ok(a) => a,
                Err(e) => {
                    warn!("BLE: Accept failed ({:?})", e);
                    advertiser = readvertise(&mut peripheral, &payload, &mut retry_ticker()).await;
                    continue;
                }
            };

            let peer = peer_address(&acceptor);

            match acceptor.with_attribute_server(server) {
                Ok(conn) => {
                    report(events::on_connected(&mut context, &peer, ConnectStatus::Success));
                    serve(&conn, server, &mut context, &peer).await;
                }
                Err(_) => {
                    report(events::on_connected(
                        &mut context,
                        &peer,
                        ConnectStatus::Failed(gap::CONNECTION_FAILED_TO_ESTABLISH),
                    ));
                }
            }

            advertiser = readvertise(&mut peripheral, &payload, &mut retry_ticker()).await;
        }
    };

    select(runner_task, peripheral_task).await;
}

fn connectable(payload: &AdvertisingData) -> Advertisement<'_> {
    Advertisement::ConnectableScannableUndirected {
        adv_data: payload.adv_data(),
        scan_data: payload.scan_data(),
    }
}

/// Ticker pacing advertising restarts, started fresh for each outage
fn retry_ticker() -> Ticker {
    Ticker::every(Duration::from_millis(gap::READVERTISE_RETRY_MS))
}

impl<'d, C: Controller> Advertise for Peripheral<'d, C, DefaultPacketPool> {
    type Advertiser = Advertiser<'d, C, DefaultPacketPool>;
    type Error = BleHostError<C::Error>;

    async fn advertise(&mut self, data: &AdvertisingData) -> Result<Self::Advertiser, Self::Error> {
        Peripheral::advertise(self, &Default::default(), connectable(data)).await
    }
}

/// Drive one connection until it drops
async fn serve<P: PacketPool>(
    conn: &GattConnection<'_, '_, P>,
    server: &Server<'_>,
    context: &mut AppContext<Led>,
    peer: &PeerAddress,
) {
    // Subscriber is dropped when the connection ends, so telemetry doesn't queue up
    let mut telemetry = match TELEMETRY_CHANNEL.subscriber() {
        Ok(s) => Some(s),
        Err(_) => {
            warn!("BLE: Telemetry subscriber unavailable");
            None
        }
    };

    loop {
        let measurement = async {
            match telemetry.as_mut() {
                Some(sub) => sub.next_message_pure().await,
                None => core::future::pending().await,
            }
        };

        match select(conn.next(), measurement).await {
            Either::First(GattConnectionEvent::Disconnected { reason }) => {
                report(events::on_disconnected(context, reason.into_inner()));
                break;
            }
            Either::First(GattConnectionEvent::PairingFailed(_)) => {
                events::on_pairing_cancelled(peer);
            }
            Either::First(GattConnectionEvent::Gatt { event }) => {
                // RX writes, reads and CCCD updates are all served by the attribute table
                match event.accept() {
                    Ok(reply) => reply.send().await,
                    Err(e) => warn!("BLE: GATT reply failed ({:?})", e),
                }
            }
            Either::First(_) => {}
            Either::Second(Measurement::HeartRate(bpm)) => {
                let value = encode_heart_rate_measurement(bpm);
                if let Err(e) = server.hrs.measurement.notify(conn, &value).await {
                    warn!("BLE: Heart rate notify failed ({:?})", e);
                }
            }
            Either::Second(Measurement::BatteryLevel(level)) => {
                if let Err(e) = server.bas.level.notify(conn, &level).await {
                    warn!("BLE: Battery level notify failed ({:?})", e);
                }
            }
        }
    }
}

fn peer_address<P: PacketPool>(conn: &Connection<'_, P>) -> PeerAddress {
    let kind = if conn.peer_addr_kind() == AddrKind::PUBLIC {
        AddressKind::Public
    } else {
        AddressKind::Random
    };

    let mut addr = [0u8; 6];
    addr.copy_from_slice(conn.peer_address().raw());
    PeerAddress::new(kind, addr)
}

fn report(result: Result<(), IndicatorError>) {
    if let Err(e) = result {
        warn!("Indicator: {}", e);
    }
}
