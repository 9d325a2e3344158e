//! Session failure taxonomy

use uuid::Uuid;

use crate::transport::TransportError;

/// Why a characteristic could not be selected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// Service exposes nothing to observe
    #[error("service {service} has no characteristics")]
    Empty { service: Uuid },
    /// Configured characteristic is not part of the service
    #[error("characteristic {characteristic} not found in service {service}")]
    Missing { service: Uuid, characteristic: Uuid },
}

/// Fatal session errors, one per stage
///
/// None of these are retried. Display carries only the stage; the
/// transport cause is available through `source()`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Peripheral unreachable, link rejected, or address malformed
    #[error("failed to connect to {address}")]
    Connection {
        address: String,
        #[source]
        source: TransportError,
    },
    /// GATT discovery itself failed
    #[error("service discovery failed")]
    Discovery(#[source] TransportError),
    /// Target service not advertised by the peripheral
    #[error("service {0} not found on peripheral")]
    Lookup(Uuid),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    /// Notification registration refused
    #[error("failed to subscribe to {characteristic}")]
    Subscription {
        characteristic: Uuid,
        #[source]
        source: TransportError,
    },
    /// Notification stream ended while idling
    #[error("peripheral closed the notification stream")]
    LinkLost,
    /// Releasing the connection failed after an otherwise clean session
    #[error("failed to release connection")]
    Teardown(#[source] TransportError),
}
