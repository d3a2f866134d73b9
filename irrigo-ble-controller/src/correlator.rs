//! Pairs each command with the notification that answers it
//!
//! The wire protocol carries no request id; a response names only its verb.
//! So there is exactly one pending slot: a second command while one is
//! outstanding is rejected instead of queued, and the next notification
//! echoing the pending verb resolves it. Notifications for any other verb
//! are broadcast to subscribers but otherwise dropped.
//!
//! A reply that arrives after its command timed out cannot be told apart
//! from the reply to a newer command of the same verb. Each slot carries a
//! generation so a timed-out send never clears a newer slot, but the late
//! reply itself may still be taken by the next command of that verb.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::{Mutex, broadcast, oneshot};

use irrigo_proto::{Command, Payload, Response, Verb};

use crate::connection::Connection;
use crate::error::ClientError;
use crate::transport::Transport;

/// Capacity of the response event channel; slow subscribers lag rather
/// than block the link
const RESPONSE_EVENTS: usize = 32;

struct Pending {
    verb: Verb,
    generation: u64,
    reply: oneshot::Sender<Result<Payload, ClientError>>,
}

pub struct Correlator<T: Transport> {
    connection: Arc<Connection<T>>,
    pending: Mutex<Option<Pending>>,
    next_generation: AtomicU64,
    timeout: Duration,
    responses: broadcast::Sender<Response>,
}

impl<T: Transport> Correlator<T> {
    pub fn new(connection: Arc<Connection<T>>, timeout: Duration) -> Self {
        let (responses, _) = broadcast::channel(RESPONSE_EVENTS);
        Self {
            connection,
            pending: Mutex::new(None),
            next_generation: AtomicU64::new(1),
            timeout,
            responses,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Every decoded notification, solicited or not
    pub fn subscribe(&self) -> broadcast::Receiver<Response> {
        self.responses.subscribe()
    }

    /// Verb of the command awaiting its response, if any
    pub async fn pending_verb(&self) -> Option<Verb> {
        self.pending
            .lock()
            .await
            .as_ref()
            .filter(|p| !p.reply.is_closed())
            .map(|p| p.verb)
    }

    /// Send one command and wait for its response.
    ///
    /// An `"error"` response becomes [`ClientError::Controller`]; a
    /// notification that fails to decode while this command is pending
    /// becomes [`ClientError::Protocol`].
    pub async fn send(&self, command: Command) -> Result<Payload, ClientError> {
        let verb = command.verb();

        if !self.connection.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let bytes = command.encode()?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        // Register before writing so a fast reply cannot slip past
        {
            let mut pending = self.pending.lock().await;
            if let Some(p) = pending.as_ref() {
                // a caller that gave up waiting leaves a closed slot behind
                if !p.reply.is_closed() {
                    return Err(ClientError::CommandPending {
                        pending: p.verb,
                        attempted: verb,
                    });
                }
            }
            *pending = Some(Pending {
                verb,
                generation,
                reply: reply_tx,
            });
        }

        debug!("Sending command: {}", String::from_utf8_lossy(&bytes));

        // one deadline covers the write and the reply
        let exchange = async {
            if let Err(e) = self.connection.write(&bytes).await {
                self.clear(generation).await;
                return Err(e);
            }
            match reply_rx.await {
                Ok(result) => result,
                // slot dropped without an answer
                Err(_) => Err(ClientError::LinkLost),
            }
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                self.clear(generation).await;
                warn!(
                    "No response to {verb} within {:?}; a late {verb} reply may be taken for the next {verb}",
                    self.timeout
                );
                Err(ClientError::ResponseTimeout {
                    verb,
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Feed one inbound notification
    pub async fn on_notification(&self, bytes: &[u8]) {
        debug!("Received response: {}", String::from_utf8_lossy(bytes));

        let decoded = Response::decode(bytes);
        if let Ok(response) = &decoded {
            // no subscribers is fine
            let _ = self.responses.send(response.clone());
        }

        let mut pending = self.pending.lock().await;
        match decoded {
            Err(e) => match pending.take() {
                Some(p) => {
                    warn!("Malformed response to {}: {e}", p.verb);
                    let _ = p.reply.send(Err(ClientError::Protocol(e)));
                }
                None => debug!("Discarding malformed unsolicited message: {e}"),
            },
            Ok(response) => {
                let matches = pending
                    .as_ref()
                    .is_some_and(|p| response.verb() == Some(p.verb));
                if !matches {
                    debug!("Discarding response for {:?}: no matching command", response.verb());
                    return;
                }
                if let Some(p) = pending.take() {
                    let _ = p.reply.send(into_result(p.verb, response));
                }
            }
        }
    }

    /// Fail whatever is pending, e.g. on link loss or disconnect
    pub async fn fail_pending(&self, error: ClientError) {
        if let Some(p) = self.pending.lock().await.take() {
            debug!("Failing pending {}: {error}", p.verb);
            let _ = p.reply.send(Err(error));
        }
    }

    async fn clear(&self, generation: u64) {
        let mut pending = self.pending.lock().await;
        if pending.as_ref().is_some_and(|p| p.generation == generation) {
            *pending = None;
        }
    }
}

fn into_result(verb: Verb, response: Response) -> Result<Payload, ClientError> {
    match response {
        Response::Ok { payload, .. } => Ok(payload),
        Response::Error { message, .. } => Err(ClientError::Controller { verb, message }),
    }
}
