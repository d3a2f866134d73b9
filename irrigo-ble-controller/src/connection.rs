//! Connection lifecycle: Disconnected -> Connecting -> Connected -> Disconnected
//!
//! The state machine is the only owner of the device identity and the link
//! handle. Every transition publishes a [`ConnectionStatus`] snapshot on a
//! watch channel.

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::{Mutex, mpsc, watch};

use crate::error::ClientError;
use crate::transport::{LinkEvent, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot published on every transition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub device_name: Option<String>,
    /// Why the last attempt or link ended; `None` after a voluntary
    /// disconnect or a successful connect
    pub last_error: Option<String>,
}

/// The connected device. Lives exactly as long as the link.
#[derive(Debug)]
pub struct DeviceIdentity<D> {
    pub handle: D,
    pub name: String,
}

/// Events of a freshly established link, tagged with the connection
/// generation they belong to
pub struct LinkSession {
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
    pub generation: u64,
}

struct Inner<T: Transport> {
    state: ConnectionState,
    identity: Option<DeviceIdentity<T::Device>>,
    link: Option<Arc<T::Link>>,
    /// Bumped on every connect attempt and every drop to Disconnected, so a
    /// stale attempt or stale link-loss event cannot touch a newer link
    generation: u64,
    last_error: Option<String>,
}

pub struct Connection<T: Transport> {
    transport: T,
    name_filter: String,
    inner: Mutex<Inner<T>>,
    status: watch::Sender<ConnectionStatus>,
}

impl<T: Transport> Connection<T> {
    pub fn new(transport: T, name_filter: impl Into<String>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            transport,
            name_filter: name_filter.into(),
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                identity: None,
                link: None,
                generation: 0,
                last_error: None,
            }),
            status,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn device_name(&self) -> Option<String> {
        self.status.borrow().device_name.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.borrow().last_error.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    fn publish(&self, inner: &Inner<T>) {
        self.status.send_replace(ConnectionStatus {
            state: inner.state,
            device_name: inner.identity.as_ref().map(|id| id.name.clone()),
            last_error: inner.last_error.clone(),
        });
    }

    /// Find, connect and subscribe.
    ///
    /// On success the returned session carries the link's notifications and
    /// its loss event; the caller must feed them back through
    /// [`Connection::on_link_lost`].
    pub async fn connect(&self) -> Result<LinkSession, ClientError> {
        let generation = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                ConnectionState::Connecting => return Err(ClientError::AlreadyConnecting),
                ConnectionState::Connected => {
                    let name = inner.identity.as_ref().map(|id| id.name.clone());
                    return Err(ClientError::AlreadyConnected(name.unwrap_or_default()));
                }
                ConnectionState::Disconnected => {}
            }

            if !self.transport.is_supported().await {
                inner.last_error = Some(ClientError::UnsupportedTransport.to_string());
                self.publish(&inner);
                return Err(ClientError::UnsupportedTransport);
            }

            inner.generation += 1;
            inner.state = ConnectionState::Connecting;
            inner.last_error = None;
            self.publish(&inner);
            inner.generation
        };

        info!("Connecting to {:?}...", self.name_filter);

        let established = self.establish().await;
        let mut inner = self.inner.lock().await;

        if inner.generation != generation || inner.state != ConnectionState::Connecting {
            drop(inner);
            if let Ok((_, link, _)) = established {
                let _ = self.transport.disconnect(&link).await;
            }
            info!("Connection attempt cancelled");
            return Err(ClientError::ConnectCancelled);
        }

        match established {
            Ok((identity, link, events)) => {
                info!("Connected to {}", identity.name);
                inner.state = ConnectionState::Connected;
                inner.identity = Some(identity);
                inner.link = Some(Arc::new(link));
                self.publish(&inner);
                Ok(LinkSession { events, generation })
            }
            Err(e) => {
                warn!("Connection failed: {e}");
                inner.generation += 1;
                inner.state = ConnectionState::Disconnected;
                inner.last_error = Some(e.to_string());
                self.publish(&inner);
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
    ) -> Result<
        (
            DeviceIdentity<T::Device>,
            T::Link,
            mpsc::UnboundedReceiver<LinkEvent>,
        ),
        ClientError,
    > {
        let found = self.transport.request_device(&self.name_filter).await?;
        let link = self.transport.connect(&found.handle).await?;

        match self.transport.subscribe(&link).await {
            Ok(events) => {
                let identity = DeviceIdentity {
                    handle: found.handle,
                    name: found.name,
                };
                Ok((identity, link, events))
            }
            Err(e) => {
                let _ = self.transport.disconnect(&link).await;
                Err(e.into())
            }
        }
    }

    /// Voluntary teardown. From Connecting this cancels the attempt; from
    /// Disconnected it does nothing.
    pub async fn disconnect(&self) {
        let link = {
            let mut inner = self.inner.lock().await;
            if inner.state == ConnectionState::Disconnected {
                return;
            }
            inner.generation += 1;
            inner.state = ConnectionState::Disconnected;
            inner.identity = None;
            inner.last_error = None;
            self.publish(&inner);
            inner.link.take()
        };

        if let Some(link) = link {
            if let Err(e) = self.transport.disconnect(&link).await {
                warn!("Link teardown failed: {e}");
            }
            info!("Disconnected");
        }
    }

    /// The transport reported the link gone. Returns whether this changed
    /// the state, i.e. whether `generation` was still the live link.
    pub async fn on_link_lost(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation || inner.state == ConnectionState::Disconnected {
            return false;
        }
        warn!("Device disconnected");
        inner.generation += 1;
        inner.state = ConnectionState::Disconnected;
        inner.identity = None;
        inner.link = None;
        inner.last_error = Some(ClientError::LinkLost.to_string());
        self.publish(&inner);
        true
    }

    /// Write raw bytes to the command characteristic. Fails with
    /// `NotConnected` before touching the transport unless Connected.
    pub async fn write(&self, bytes: &[u8]) -> Result<(), ClientError> {
        let link = {
            let inner = self.inner.lock().await;
            match (&inner.state, &inner.link) {
                (ConnectionState::Connected, Some(link)) => Arc::clone(link),
                _ => return Err(ClientError::NotConnected),
            }
        };
        self.transport.write(&link, bytes).await?;
        Ok(())
    }
}
