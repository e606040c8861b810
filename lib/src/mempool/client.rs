//! Thin handle to the mempool actor (§4.5): every call is one
//! request/one reply over a bounded channel plus a oneshot reply slot.
use tokio::sync::{mpsc, oneshot};

use crate::{
    errors::ProxyError,
    types::mempool_api::{MPRequest, MPResponse},
};

use super::server::Envelope;

#[derive(Clone)]
pub struct MempoolClient {
    outbox: mpsc::Sender<Envelope>,
}

impl MempoolClient {
    #[must_use]
    pub fn new(outbox: mpsc::Sender<Envelope>) -> Self {
        Self { outbox }
    }

    /// Sends `request` and awaits its matching reply. Fails with
    /// [`ProxyError::Reschedule`] if the actor's inbox is gone (shut down
    /// or overloaded past its channel bound) — the caller's own retry
    /// policy decides whether to requeue.
    pub async fn call(&self, request: MPRequest) -> Result<MPResponse, ProxyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.outbox
            .send(Envelope { request, reply: reply_tx })
            .await
            .map_err(|_| ProxyError::Reschedule)?;
        reply_rx.await.map_err(|_| ProxyError::Reschedule)
    }
}

/// Creates a bound client/actor-inbox pair. `capacity` bounds how many
/// in-flight requests the RPC worker may have outstanding before `call`
/// starts returning `Reschedule`.
#[must_use]
pub fn channel(capacity: usize) -> (MempoolClient, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity);
    (MempoolClient::new(tx), rx)
}
