//! Session runner
//!
//! Drives one probe session: connect, discover the target service, pick a
//! characteristic, subscribe, then idle until shutdown while rendering
//! notifications and a heartbeat. Once a connection exists it is released
//! exactly once, whichever way the session ends.

use core::future::Future;
use core::pin::Pin;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::time::{self, MissedTickBehavior};
use uuid::Uuid;

use super::error::{SelectionError, SessionError};
use super::handler::NotificationHandler;
use crate::config::{CharacteristicSelector, SessionConfig};
use crate::transport::{
    BleLink, BleTransport, CharacteristicInfo, NotificationStream, PeripheralAddress, ServiceInfo,
    TransportError,
};

/// Shortest heartbeat period; a zero period is raised to this
const MIN_HEARTBEAT: Duration = Duration::from_millis(1);

/// Counters reported when a session ends cleanly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub notifications: u64,
    pub heartbeats: u64,
}

/// Runs probe sessions against one transport
pub struct SessionRunner<T: BleTransport, H: NotificationHandler> {
    transport: T,
    handler: H,
    config: SessionConfig,
    summary: SessionSummary,
}

impl<T: BleTransport, H: NotificationHandler> SessionRunner<T, H> {
    /// Create a runner
    pub fn new(transport: T, handler: H, config: SessionConfig) -> Self {
        Self {
            transport,
            handler,
            config,
            summary: SessionSummary::default(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Run one session until `shutdown` completes or a stage fails
    ///
    /// Completion of `shutdown` at any stage is a clean exit. Stage
    /// failures are returned after the connection has been released; a
    /// failed release is only reported when nothing else went wrong.
    /// The handler sees the failure before it is returned.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<SessionSummary, SessionError>
    where
        S: Future<Output = ()>,
    {
        let result = self.session(shutdown).await;
        if let Err(e) = &result {
            self.handler.on_failure(e);
        }
        result
    }

    async fn session<S>(&mut self, shutdown: S) -> Result<SessionSummary, SessionError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.summary = SessionSummary::default();

        let address: PeripheralAddress =
            self.config
                .address
                .parse()
                .map_err(|e| SessionError::Connection {
                    address: self.config.address.clone(),
                    source: TransportError::Address(e),
                })?;

        info!("Connecting to {}", address);
        let connect = bounded(self.config.connect_timeout, self.transport.connect(address));
        let mut link = match until_shutdown(shutdown.as_mut(), connect).await {
            None => {
                info!("Shutdown before connection was established");
                return Ok(self.summary);
            }
            Some(Ok(link)) => link,
            Some(Err(source)) => {
                return Err(SessionError::Connection {
                    address: self.config.address.clone(),
                    source,
                })
            }
        };
        info!("Connected to {}", address);

        let result = self.drive(&mut link, shutdown.as_mut()).await;
        release(link, result, self.config.teardown_timeout).await
    }

    /// Everything between connect and teardown
    async fn drive<S>(
        &mut self,
        link: &mut T::Link,
        mut shutdown: Pin<&mut S>,
    ) -> Result<SessionSummary, SessionError>
    where
        S: Future<Output = ()>,
    {
        let discover = bounded(self.config.discovery_timeout, link.discover_services());
        let services = match until_shutdown(shutdown.as_mut(), discover).await {
            None => return Ok(self.summary),
            Some(result) => result.map_err(SessionError::Discovery)?,
        };
        debug!("Discovered {} services", services.len());

        let service = select_service(&services, self.config.service)?;
        let characteristic = select_characteristic(service, self.config.characteristic)?.clone();
        info!(
            "Selected characteristic {} of service {}",
            characteristic.uuid, service.uuid
        );

        if !characteristic.properties.can_notify() {
            return Err(SessionError::Subscription {
                characteristic: characteristic.uuid,
                source: TransportError::NotifyUnsupported(characteristic.uuid),
            });
        }

        let subscribe = bounded(self.config.subscribe_timeout, link.subscribe(&characteristic));
        let notifications = match until_shutdown(shutdown.as_mut(), subscribe).await {
            None => return Ok(self.summary),
            Some(result) => result.map_err(|source| SessionError::Subscription {
                characteristic: characteristic.uuid,
                source,
            })?,
        };
        info!("Subscribed to {}", characteristic.uuid);

        self.idle(notifications, shutdown).await
    }

    /// Render notifications and heartbeats until shutdown
    async fn idle<S>(
        &mut self,
        mut notifications: NotificationStream,
        mut shutdown: Pin<&mut S>,
    ) -> Result<SessionSummary, SessionError>
    where
        S: Future<Output = ()>,
    {
        // tokio intervals cannot be zero
        let period = self.config.heartbeat.max(MIN_HEARTBEAT);
        let mut heartbeat = time::interval(period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // Notifications win over a heartbeat due at the same instant
            tokio::select! {
                biased;
                _ = shutdown.as_mut() => {
                    info!("Shutdown requested");
                    return Ok(self.summary);
                }
                next = notifications.next() => match next {
                    Some(notification) => {
                        debug!(
                            "Notification from {} ({} bytes)",
                            notification.characteristic,
                            notification.value.len()
                        );
                        self.summary.notifications += 1;
                        self.handler.on_notification(&notification);
                    }
                    None => return Err(SessionError::LinkLost),
                },
                _ = heartbeat.tick() => {
                    self.summary.heartbeats += 1;
                    self.handler.on_heartbeat();
                }
            }
        }
    }
}

/// Release the connection without letting a release failure hide the
/// session's own error
async fn release<L: BleLink>(
    link: L,
    result: Result<SessionSummary, SessionError>,
    limit: Duration,
) -> Result<SessionSummary, SessionError> {
    info!("Releasing connection");

    match (bounded(limit, link.disconnect()).await, result) {
        (Ok(()), result) => result,
        (Err(e), Ok(_)) => Err(SessionError::Teardown(e)),
        (Err(e), Err(original)) => {
            warn!("Disconnect failed ({}) while handling: {}", e, original);
            Err(original)
        }
    }
}

/// First service with this UUID
fn select_service(services: &[ServiceInfo], uuid: Uuid) -> Result<&ServiceInfo, SessionError> {
    let mut matches = services.iter().filter(|s| s.uuid == uuid);
    let service = matches.next().ok_or(SessionError::Lookup(uuid))?;

    let ignored = matches.count();
    if ignored > 0 {
        warn!("Service {} listed {} more times, using the first", uuid, ignored);
    }

    Ok(service)
}

fn select_characteristic(
    service: &ServiceInfo,
    selector: CharacteristicSelector,
) -> Result<&CharacteristicInfo, SelectionError> {
    if service.characteristics.is_empty() {
        return Err(SelectionError::Empty {
            service: service.uuid,
        });
    }

    match selector {
        CharacteristicSelector::ById(uuid) => service
            .characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .ok_or(SelectionError::Missing {
                service: service.uuid,
                characteristic: uuid,
            }),
        CharacteristicSelector::First => Ok(&service.characteristics[0]),
    }
}

/// Turn an elapsed deadline into a transport error
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

/// `None` if shutdown completes first
async fn until_shutdown<S, F>(shutdown: Pin<&mut S>, fut: F) -> Option<F::Output>
where
    S: Future<Output = ()>,
    F: Future,
{
    tokio::select! {
        biased;
        _ = shutdown => None,
        value = fut => Some(value),
    }
}
