//! Irrigo BLE Controller
//!
//! BLE client for operating an irrigation controller: connect to the
//! device by name, start and stop zones, read and write watering programs,
//! and keep the controller's clock in sync.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use irrigo_ble_controller::{BtleTransport, Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let transport = BtleTransport::new(config.scan_duration).await;
//!     let client = Client::new(transport, &config);
//!
//!     client.connect().await?;
//!
//!     // Water zone 2 for 15 minutes
//!     client.start_zone(2, 15).await?;
//!
//!     // Check the controller's clock
//!     if let Some(drift) = client.clock_drift().await? {
//!         println!("RTC drift: {drift}");
//!     }
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod clock;
mod client;
mod config;
mod connection;
mod correlator;
mod error;
#[cfg(test)]
mod mock;
mod transport;

pub use ble::{BtleTransport, IrrigationDevice};
pub use client::Client;
pub use clock::{Drift, IN_SYNC_THRESHOLD_SECS, RtcSample};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionState, ConnectionStatus, DeviceIdentity, LinkSession};
pub use correlator::Correlator;
pub use error::ClientError;
pub use transport::{FoundDevice, LinkEvent, Transport, TransportError};

pub use irrigo_proto as proto;
