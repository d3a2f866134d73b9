//! The client a front end holds: connection lifecycle plus typed verbs

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use irrigo_proto::{Command, Payload, Program, Response, SystemStatus, Verb};

use crate::clock::{self, Drift, RtcSample};
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState, ConnectionStatus, LinkSession};
use crate::correlator::Correlator;
use crate::error::ClientError;
use crate::transport::{LinkEvent, Transport};

/// One controller, one link.
///
/// Commands are strictly one at a time: the protocol cannot tell two
/// outstanding responses apart, so a command issued while another awaits
/// its response fails with [`ClientError::CommandPending`]. Callers
/// serialize their own sequences.
pub struct Client<T: Transport> {
    connection: Arc<Connection<T>>,
    correlator: Arc<Correlator<T>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        let connection = Arc::new(Connection::new(transport, config.device_name.clone()));
        let correlator = Arc::new(Correlator::new(
            Arc::clone(&connection),
            config.response_timeout,
        ));
        Self {
            connection,
            correlator,
            pump: Mutex::new(None),
        }
    }

    pub fn transport(&self) -> &T {
        self.connection.transport()
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        let session = self.connection.connect().await?;
        let handle = tokio::spawn(pump(
            Arc::clone(&self.connection),
            Arc::clone(&self.correlator),
            session,
        ));
        if let Some(old) = self.pump.lock().await.replace(handle) {
            old.abort();
        }
        Ok(())
    }

    /// Tear the link down; a command still waiting fails with `LinkLost`
    pub async fn disconnect(&self) {
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        self.connection.disconnect().await;
        self.correlator.fail_pending(ClientError::LinkLost).await;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn device_name(&self) -> Option<String> {
        self.connection.device_name()
    }

    pub fn last_error(&self) -> Option<String> {
        self.connection.last_error()
    }

    /// Connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    /// Every decoded response, including ones no command was waiting for
    pub fn subscribe_responses(&self) -> broadcast::Receiver<Response> {
        self.correlator.subscribe()
    }

    pub async fn send(&self, command: Command) -> Result<Payload, ClientError> {
        self.correlator.send(command).await
    }

    pub async fn get_status(&self) -> Result<SystemStatus, ClientError> {
        match self.send(Command::GetStatus).await? {
            Payload::Status(status) => Ok(status),
            _ => Err(ClientError::UnexpectedPayload(Verb::GetStatus)),
        }
    }

    pub async fn start_zone(&self, zone: u8, duration_minutes: u32) -> Result<(), ClientError> {
        self.send(Command::StartZone {
            zone,
            duration_minutes,
        })
        .await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ClientError> {
        self.send(Command::Stop).await?;
        Ok(())
    }

    pub async fn get_program(&self, zone: u8, program: u8) -> Result<Program, ClientError> {
        match self.send(Command::GetProgram { zone, program }).await? {
            Payload::Program(config) => Ok(config),
            _ => Err(ClientError::UnexpectedPayload(Verb::GetProgram)),
        }
    }

    pub async fn set_program(
        &self,
        zone: u8,
        program: u8,
        config: &Program,
    ) -> Result<(), ClientError> {
        self.send(Command::set_program(zone, program, config)).await?;
        Ok(())
    }

    /// Set the controller's clock; `None` sends local now. Returns the
    /// timestamp sent.
    pub async fn set_time(&self, time: Option<NaiveDateTime>) -> Result<String, ClientError> {
        let timestamp = match time {
            Some(t) => clock::format_set_time(t),
            None => clock::local_timestamp(),
        };
        self.send(Command::SetTime {
            timestamp: timestamp.clone(),
        })
        .await?;
        Ok(timestamp)
    }

    /// Read the controller's RTC and compare it to local time. `Ok(None)`
    /// when the controller has no valid clock reading.
    pub async fn clock_drift(&self) -> Result<Option<Drift>, ClientError> {
        let status = self.get_status().await?;
        Ok(status
            .rtc_time
            .as_deref()
            .and_then(RtcSample::received_now)
            .map(|sample| sample.drift()))
    }
}

/// Routes link events of one session until the link ends
async fn pump<T: Transport>(
    connection: Arc<Connection<T>>,
    correlator: Arc<Correlator<T>>,
    mut session: LinkSession,
) {
    while let Some(event) = session.events.recv().await {
        match event {
            LinkEvent::Notification(bytes) => correlator.on_notification(&bytes).await,
            LinkEvent::Disconnected => break,
        }
    }
    if connection.on_link_lost(session.generation).await {
        correlator.fail_pending(ClientError::LinkLost).await;
    }
}
