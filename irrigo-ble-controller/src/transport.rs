//! The wireless link primitive the client drives
//!
//! [`Transport`] is the I/O boundary: discovery, connect (including GATT
//! service and characteristic discovery), writes, and a stream of link
//! events. [`crate::BtleTransport`] implements it with btleplug; tests use an
//! in-memory double.

use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,
    #[error("no device matching {0:?} found")]
    DeviceNotFound(String),
    #[error("irrigation service not found on device")]
    ServiceNotFound,
    #[error("{0} characteristic not found")]
    CharacteristicNotFound(&'static str),
    #[error("link closed")]
    LinkClosed,
    #[error(transparent)]
    Ble(#[from] btleplug::Error),
    #[error("{0}")]
    Other(String),
}

/// Something that happened on an established link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One complete message from the response characteristic
    Notification(Vec<u8>),
    /// The link dropped without being asked to
    Disconnected,
}

/// A device picked by [`Transport::request_device`]
#[derive(Debug, Clone)]
pub struct FoundDevice<D> {
    pub handle: D,
    pub name: String,
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Platform handle of a discovered, not yet connected device
    type Device: Send + Sync + 'static;
    /// Handle of an established link with the command and response
    /// characteristics resolved
    type Link: Send + Sync + 'static;

    /// Whether this platform can do BLE at all
    async fn is_supported(&self) -> bool;

    /// Find a device whose advertised name matches `name_filter`
    async fn request_device(
        &self,
        name_filter: &str,
    ) -> Result<FoundDevice<Self::Device>, TransportError>;

    /// Connect and resolve the controller's service and characteristics
    async fn connect(&self, device: &Self::Device) -> Result<Self::Link, TransportError>;

    /// Enable notifications; the receiver yields notifications and the
    /// link-loss event. The channel closing also means the link is gone.
    async fn subscribe(
        &self,
        link: &Self::Link,
    ) -> Result<mpsc::UnboundedReceiver<LinkEvent>, TransportError>;

    async fn write(&self, link: &Self::Link, bytes: &[u8]) -> Result<(), TransportError>;

    async fn disconnect(&self, link: &Self::Link) -> Result<(), TransportError>;
}
