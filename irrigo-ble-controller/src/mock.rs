//! In-memory transport double: records writes, lets a test inject
//! notifications and link loss, and can answer commands like a controller.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, mpsc};

use irrigo_proto::Command;

use crate::transport::{FoundDevice, LinkEvent, Transport, TransportError};

type Responder = Box<dyn Fn(&Command) -> Option<String> + Send + Sync>;

#[derive(Default)]
pub(crate) struct MockShared {
    writes: Mutex<Vec<Vec<u8>>>,
    events: Mutex<Option<mpsc::UnboundedSender<LinkEvent>>>,
    disconnects: AtomicUsize,
    stalled: AtomicBool,
    requested: Notify,
    gate: Notify,
}

impl MockShared {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn last_command(&self) -> Option<Command> {
        let writes = self.writes.lock().unwrap();
        writes.last().map(|w| serde_json::from_slice(w).unwrap())
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn notify(&self, raw: &str) {
        self.send(LinkEvent::Notification(raw.as_bytes().to_vec()));
    }

    pub fn notify_bytes(&self, bytes: &[u8]) {
        self.send(LinkEvent::Notification(bytes.to_vec()));
    }

    /// While set, `write` records the bytes and then never completes
    pub fn stall_writes(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn drop_link(&self) {
        self.send(LinkEvent::Disconnected);
    }

    fn send(&self, event: LinkEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub async fn wait_for_request(&self) {
        self.requested.notified().await;
    }

    pub fn open_gate(&self) {
        self.gate.notify_one();
    }
}

pub(crate) struct MockTransport {
    supported: bool,
    device_name: String,
    gated: bool,
    fail_subscribe: bool,
    responder: Option<Responder>,
    next_link: AtomicU32,
    shared: Arc<MockShared>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            supported: true,
            device_name: "Irrigation Controller".to_string(),
            gated: false,
            fail_subscribe: false,
            responder: None,
            next_link: AtomicU32::new(1),
            shared: Arc::new(MockShared::default()),
        }
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// `request_device` blocks until [`MockShared::open_gate`]
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    pub fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Answer each written command with the returned JSON, if any
    pub fn responding(
        mut self,
        responder: impl Fn(&Command) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn shared(&self) -> Arc<MockShared> {
        Arc::clone(&self.shared)
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    type Device = String;
    type Link = u32;

    async fn is_supported(&self) -> bool {
        self.supported
    }

    async fn request_device(&self, name_filter: &str) -> Result<FoundDevice<String>, TransportError> {
        self.shared.requested.notify_one();
        if self.gated {
            self.shared.gate.notified().await;
        }
        if !self.device_name.contains(name_filter) {
            return Err(TransportError::DeviceNotFound(name_filter.to_string()));
        }
        Ok(FoundDevice {
            handle: self.device_name.clone(),
            name: self.device_name.clone(),
        })
    }

    async fn connect(&self, _device: &String) -> Result<u32, TransportError> {
        Ok(self.next_link.fetch_add(1, Ordering::SeqCst))
    }

    async fn subscribe(&self, _link: &u32) -> Result<mpsc::UnboundedReceiver<LinkEvent>, TransportError> {
        if self.fail_subscribe {
            return Err(TransportError::CharacteristicNotFound("Response"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn write(&self, _link: &u32, bytes: &[u8]) -> Result<(), TransportError> {
        self.shared.writes.lock().unwrap().push(bytes.to_vec());
        if self.shared.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(responder) = &self.responder {
            let command: Command = serde_json::from_slice(bytes)
                .map_err(|e| TransportError::Other(e.to_string()))?;
            if let Some(reply) = responder(&command) {
                self.shared.notify(&reply);
            }
        }
        Ok(())
    }

    async fn disconnect(&self, _link: &u32) -> Result<(), TransportError> {
        self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.shared.events.lock().unwrap() = None;
        Ok(())
    }
}
