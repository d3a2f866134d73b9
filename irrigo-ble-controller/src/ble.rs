//! btleplug implementation of [`Transport`]
//!
//! Scans for the controller by advertised name, connects, resolves the
//! command and response characteristics, and forwards response
//! notifications and adapter disconnect events as [`LinkEvent`]s.

use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use irrigo_proto::ble::{COMMAND_UUID, DEVICE_NAME, RESPONSE_UUID, SERVICE_UUID};

use crate::transport::{FoundDevice, LinkEvent, Transport, TransportError};

const SERVICE: Uuid = Uuid::from_u128(SERVICE_UUID);
const COMMAND_CHAR: Uuid = Uuid::from_u128(COMMAND_UUID);
const RESPONSE_CHAR: Uuid = Uuid::from_u128(RESPONSE_UUID);

/// A device seen during a scan
#[derive(Debug, Clone)]
pub struct IrrigationDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub is_controller: bool,
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, TransportError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(TransportError::NoAdapter)
}

/// Scan for BLE devices
///
/// Returns every advertiser seen. Controllers have `is_controller = true`.
pub async fn scan(
    adapter: &Adapter,
    duration: Duration,
) -> Result<Vec<IrrigationDevice>, TransportError> {
    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    let peripherals = adapter.peripherals().await?;
    let mut devices = Vec::new();

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let address = peripheral.address().to_string();
            let is_controller = name.contains(DEVICE_NAME);
            devices.push(IrrigationDevice {
                name,
                address,
                rssi: props.rssi,
                is_controller,
            });
        }
    }

    adapter.stop_scan().await?;
    Ok(devices)
}

/// An established link: the peripheral plus its two characteristics
#[derive(Debug, Clone)]
pub struct BtleLink {
    peripheral: Peripheral,
    command: Characteristic,
    response: Characteristic,
}

pub struct BtleTransport {
    adapter: Option<Adapter>,
    scan_duration: Duration,
}

impl BtleTransport {
    /// Opens the first adapter. Without one the transport still constructs
    /// but reports itself unsupported.
    pub async fn new(scan_duration: Duration) -> Self {
        let adapter = match get_adapter().await {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                warn!("Bluetooth unavailable: {e}");
                None
            }
        };
        Self { adapter, scan_duration }
    }

    pub fn adapter(&self) -> Result<&Adapter, TransportError> {
        self.adapter.as_ref().ok_or(TransportError::NoAdapter)
    }

    pub async fn scan(&self) -> Result<Vec<IrrigationDevice>, TransportError> {
        scan(self.adapter()?, self.scan_duration).await
    }
}

#[async_trait::async_trait]
impl Transport for BtleTransport {
    type Device = Peripheral;
    type Link = BtleLink;

    async fn is_supported(&self) -> bool {
        self.adapter.is_some()
    }

    async fn request_device(
        &self,
        name_filter: &str,
    ) -> Result<FoundDevice<Peripheral>, TransportError> {
        let adapter = self.adapter()?;

        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(self.scan_duration).await;

        let peripherals = adapter.peripherals().await?;

        for peripheral in peripherals {
            if let Some(props) = peripheral.properties().await? {
                let name = props.local_name.unwrap_or_default();
                if name.contains(name_filter) {
                    adapter.stop_scan().await?;
                    info!("Found device: {} ({})", name, peripheral.address());
                    return Ok(FoundDevice { handle: peripheral, name });
                }
            }
        }

        adapter.stop_scan().await?;
        Err(TransportError::DeviceNotFound(name_filter.to_string()))
    }

    async fn connect(&self, device: &Peripheral) -> Result<BtleLink, TransportError> {
        device.connect().await?;

        match resolve_link(device).await {
            Ok(link) => Ok(link),
            Err(e) => {
                let _ = device.disconnect().await;
                Err(e)
            }
        }
    }

    async fn subscribe(
        &self,
        link: &BtleLink,
    ) -> Result<mpsc::UnboundedReceiver<LinkEvent>, TransportError> {
        let adapter = self.adapter()?;

        link.peripheral.subscribe(&link.response).await?;
        let mut notifications = link.peripheral.notifications().await?;
        let mut events = adapter.events().await?;
        let id = link.peripheral.id();

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    notification = notifications.next() => match notification {
                        Some(n) if n.uuid == RESPONSE_CHAR => {
                            if tx.send(LinkEvent::Notification(n.value)).is_err() {
                                break;
                            }
                        }
                        Some(n) => debug!("ignoring notification from {}", n.uuid),
                        None => {
                            let _ = tx.send(LinkEvent::Disconnected);
                            break;
                        }
                    },
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(gone)) if gone == id => {
                            let _ = tx.send(LinkEvent::Disconnected);
                            break;
                        }
                        Some(_) => {}
                        None => {
                            let _ = tx.send(LinkEvent::Disconnected);
                            break;
                        }
                    },
                    _ = tx.closed() => break,
                }
            }
            debug!("link event forwarder stopped");
        });

        Ok(rx)
    }

    async fn write(&self, link: &BtleLink, bytes: &[u8]) -> Result<(), TransportError> {
        link.peripheral
            .write(&link.command, bytes, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn disconnect(&self, link: &BtleLink) -> Result<(), TransportError> {
        link.peripheral.disconnect().await?;
        Ok(())
    }
}

async fn resolve_link(device: &Peripheral) -> Result<BtleLink, TransportError> {
    device.discover_services().await?;

    let service = device
        .services()
        .into_iter()
        .find(|s| s.uuid == SERVICE)
        .ok_or(TransportError::ServiceNotFound)?;

    let command = service
        .characteristics
        .iter()
        .find(|c| c.uuid == COMMAND_CHAR)
        .cloned()
        .ok_or(TransportError::CharacteristicNotFound("Command"))?;

    let response = service
        .characteristics
        .iter()
        .find(|c| c.uuid == RESPONSE_CHAR)
        .cloned()
        .ok_or(TransportError::CharacteristicNotFound("Response"))?;

    Ok(BtleLink {
        peripheral: device.clone(),
        command,
        response,
    })
}
