//! Bluetooth Low Energy transport
//!
//! The session only talks to the peripheral through the traits here.
//! [`BtleplugTransport`] drives the host's real adapter.

pub mod address;
pub mod btle;
pub mod traits;

pub use address::{AddressError, PeripheralAddress};
pub use btle::{BtleplugLink, BtleplugTransport};
pub use traits::{
    BleLink, BleTransport, CharProperties, CharacteristicInfo, Notification, NotificationStream,
    ServiceInfo, TransportError,
};
