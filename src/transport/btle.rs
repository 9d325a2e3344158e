//! btleplug-backed transport
//!
//! Uses the first Bluetooth adapter on the host. btleplug cannot open a
//! connection from a bare address, so connecting scans until a peripheral
//! with the wanted address has been seen.
//!
//! The session may drop `connect` at any await point (timeout, Ctrl-C).
//! Scanning and a half-open connection are then stopped from a task
//! spawned on the current runtime.

use std::future::Future;
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    Service,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::{future, StreamExt};
use log::{debug, info, warn};

use super::address::PeripheralAddress;
use super::traits::{
    BleLink, BleTransport, CharProperties, CharacteristicInfo, Notification, NotificationStream,
    ServiceInfo, TransportError,
};
use crate::config::timing;

/// BLE central on the host's first adapter
pub struct BtleplugTransport {
    adapter: Adapter,
    scan_poll: Duration,
}

impl BtleplugTransport {
    /// Open the platform BLE manager and take its first adapter
    pub async fn new() -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(TransportError::NoAdapter)?;

        if let Ok(name) = adapter.adapter_info().await {
            info!("Using adapter {}", name);
        }

        Ok(Self {
            adapter,
            scan_poll: Duration::from_millis(timing::SCAN_POLL_MS),
        })
    }

    /// Poll the adapter's peripheral list until the address shows up
    async fn find_peripheral(&self, address: PeripheralAddress) -> Result<Peripheral, TransportError> {
        let wanted = BDAddr::from(address.octets());

        loop {
            let peripherals = self.adapter.peripherals().await?;

            if let Some(peripheral) = peripherals.into_iter().find(|p| p.address() == wanted) {
                return Ok(peripheral);
            }

            tokio::time::sleep(self.scan_poll).await;
        }
    }
}

impl BleTransport for BtleplugTransport {
    type Link = BtleplugLink;

    async fn connect(&mut self, address: PeripheralAddress) -> Result<BtleplugLink, TransportError> {
        debug!("Scanning for {}", address);
        self.adapter.start_scan(ScanFilter::default()).await?;

        let adapter = self.adapter.clone();
        let scanning = Cleanup::new(async move {
            let _ = adapter.stop_scan().await;
        });

        let found = self.find_peripheral(address).await;

        // Scanning while connected slows the link down on some stacks
        scanning.run().await;

        let peripheral = found?;
        let pending = peripheral.clone();
        let connecting = Cleanup::new(async move {
            let _ = pending.disconnect().await;
        });

        peripheral.connect().await?;
        connecting.disarm();

        Ok(BtleplugLink { peripheral })
    }
}

/// Connection to one peripheral through btleplug
pub struct BtleplugLink {
    peripheral: Peripheral,
}

impl BleLink for BtleplugLink {
    async fn discover_services(&mut self) -> Result<Vec<ServiceInfo>, TransportError> {
        self.peripheral.discover_services().await?;

        Ok(self.peripheral.services().iter().map(service_info).collect())
    }

    async fn subscribe(
        &mut self,
        characteristic: &CharacteristicInfo,
    ) -> Result<NotificationStream, TransportError> {
        let target = self
            .peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service)
            .ok_or(TransportError::UnknownCharacteristic(characteristic.uuid))?;

        // Open the stream first so values sent right after the CCCD write are kept
        let stream = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&target).await?;

        let uuid = target.uuid;
        Ok(stream
            .filter(move |n| future::ready(n.uuid == uuid))
            .map(|n| Notification {
                characteristic: n.uuid,
                value: n.value,
            })
            .boxed())
    }

    async fn disconnect(self) -> Result<(), TransportError> {
        if self.peripheral.is_connected().await? {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

/// Spawns `cleanup` on the current runtime if dropped before
/// [`run`](Self::run) or [`disarm`](Self::disarm)
struct Cleanup<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    cleanup: Option<F>,
}

impl<F> Cleanup<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }

    /// Run the cleanup in place
    async fn run(mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.await;
        }
    }

    /// The guarded operation completed; nothing to undo
    fn disarm(mut self) {
        self.cleanup = None;
    }
}

impl<F> Drop for Cleanup<F>
where
    F: Future<Output = ()> + Send + 'static,
{
    fn drop(&mut self) {
        let Some(cleanup) = self.cleanup.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Cleaning up abandoned connect");
                handle.spawn(cleanup);
            }
            Err(_) => warn!("No runtime to clean up abandoned connect"),
        }
    }
}

fn service_info(service: &Service) -> ServiceInfo {
    ServiceInfo {
        uuid: service.uuid,
        primary: service.primary,
        characteristics: service.characteristics.iter().map(characteristic_info).collect(),
    }
}

fn characteristic_info(characteristic: &Characteristic) -> CharacteristicInfo {
    let flags = characteristic.properties;

    CharacteristicInfo {
        uuid: characteristic.uuid,
        service: characteristic.service_uuid,
        properties: CharProperties {
            read: flags.contains(CharPropFlags::READ),
            write: flags.intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE),
            notify: flags.contains(CharPropFlags::NOTIFY),
            indicate: flags.contains(CharPropFlags::INDICATE),
        },
    }
}
