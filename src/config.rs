//! Configuration for a probe session
//!
//! Defaults target the sensor streaming firmware. Every value can be
//! overridden from the command line.

use std::time::Duration;

use uuid::Uuid;

/// Target peripheral
pub mod peripheral {
    /// Static random address the firmware advertises with
    pub const ADDRESS: &str = "FF:EE:DE:AD:BE:EF";
}

/// GATT layout of the sensor streaming service
pub mod gatt {
    use uuid::Uuid;

    /// Sensor streaming service
    pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00001523_1212_efde_1523_785fdeadbeef);

    /// Sensor characteristic (notify only)
    pub const SENSOR_CHAR_UUID: Uuid = Uuid::from_u128(0x00001526_1212_efde_1523_785fdeadbeef);
}

/// Session timing
pub mod timing {
    /// Interval between heartbeat lines
    pub const HEARTBEAT_SECS: u64 = 2;

    /// Upper bound on scanning for and connecting to the peripheral
    pub const CONNECT_TIMEOUT_SECS: u64 = 20;

    /// Upper bound on GATT service discovery
    pub const DISCOVERY_TIMEOUT_SECS: u64 = 10;

    /// Upper bound on enabling notifications
    pub const SUBSCRIBE_TIMEOUT_SECS: u64 = 5;

    /// Upper bound on releasing the connection
    pub const TEARDOWN_TIMEOUT_SECS: u64 = 5;

    /// Delay between peripheral list polls while scanning
    pub const SCAN_POLL_MS: u64 = 100;
}

/// How the characteristic to observe is picked within the matched service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacteristicSelector {
    /// The characteristic with this UUID
    ById(Uuid),
    /// Whatever characteristic the service lists first
    First,
}

/// Everything a [`SessionRunner`](crate::session::SessionRunner) needs to know
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Peripheral address in `AA:BB:CC:DD:EE:FF` form, parsed at connect time
    pub address: String,
    pub service: Uuid,
    pub characteristic: CharacteristicSelector,
    pub heartbeat: Duration,
    pub connect_timeout: Duration,
    pub discovery_timeout: Duration,
    pub subscribe_timeout: Duration,
    pub teardown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: peripheral::ADDRESS.to_string(),
            service: gatt::SERVICE_UUID,
            characteristic: CharacteristicSelector::ById(gatt::SENSOR_CHAR_UUID),
            heartbeat: Duration::from_secs(timing::HEARTBEAT_SECS),
            connect_timeout: Duration::from_secs(timing::CONNECT_TIMEOUT_SECS),
            discovery_timeout: Duration::from_secs(timing::DISCOVERY_TIMEOUT_SECS),
            subscribe_timeout: Duration::from_secs(timing::SUBSCRIBE_TIMEOUT_SECS),
            teardown_timeout: Duration::from_secs(timing::TEARDOWN_TIMEOUT_SECS),
        }
    }
}
