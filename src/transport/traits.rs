//! BLE transport traits for abstraction and testability
//!
//! These traits define the small slice of a BLE central stack the probe
//! needs, allowing the btleplug backend to be swapped with a mock for
//! testing.

use core::future::Future;
use std::time::Duration;

use futures::stream::BoxStream;
use uuid::Uuid;

use super::address::{AddressError, PeripheralAddress};

/// Errors that can occur during transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Address text could not be parsed
    #[error("malformed peripheral address")]
    Address(#[from] AddressError),
    /// Host has no Bluetooth adapter
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    /// Operation did not complete in time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Characteristic lacks both notify and indicate
    #[error("characteristic {0} does not support notifications")]
    NotifyUnsupported(Uuid),
    /// Characteristic is not present on the connected peripheral
    #[error("characteristic {0} not found on peripheral")]
    UnknownCharacteristic(Uuid),
    /// Request refused by the peripheral or the local stack
    #[error("rejected: {0}")]
    Rejected(String),
    /// Error from the platform BLE stack
    #[error(transparent)]
    Backend(#[from] btleplug::Error),
}

/// GATT characteristic property flags relevant to the probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharProperties {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharProperties {
    /// Whether the peripheral can push values for this characteristic
    pub fn can_notify(&self) -> bool {
        self.notify || self.indicate
    }
}

/// Characteristic descriptor snapshot taken after discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    /// Owning service
    pub service: Uuid,
    pub properties: CharProperties,
}

/// Service descriptor snapshot taken after discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub primary: bool,
    /// In the order the backend reports them
    pub characteristics: Vec<CharacteristicInfo>,
}

/// One value pushed by the peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Characteristic the value came from
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Notifications in delivery order; ends when the link goes away
pub type NotificationStream = BoxStream<'static, Notification>;

/// Abstract BLE central for testability
pub trait BleTransport {
    type Link: BleLink;

    /// Establish a connection to the peripheral with this address
    ///
    /// Does not bound its own duration; callers wrap it in a timeout.
    fn connect(
        &mut self,
        address: PeripheralAddress,
    ) -> impl Future<Output = Result<Self::Link, TransportError>>;
}

/// An established connection to one peripheral
///
/// Releasing the connection consumes the link, so it cannot be used
/// afterwards.
pub trait BleLink {
    /// Run GATT discovery and return every service the peripheral exposes
    fn discover_services(
        &mut self,
    ) -> impl Future<Output = Result<Vec<ServiceInfo>, TransportError>>;

    /// Enable notifications on a characteristic
    ///
    /// The returned stream yields only values from that characteristic.
    fn subscribe(
        &mut self,
        characteristic: &CharacteristicInfo,
    ) -> impl Future<Output = Result<NotificationStream, TransportError>>;

    /// Release the connection
    ///
    /// Safe to call whatever stage the session reached.
    fn disconnect(self) -> impl Future<Output = Result<(), TransportError>>;
}
