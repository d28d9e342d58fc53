//! Isolated execution contexts connected only by message passing.
//!
//! A context is a tokio task owning a request channel. Callers hold a cloneable
//! [`ContextHandle`]; each request is copied into a JSON value, tagged with an
//! id, and answered on its own oneshot channel. The receiving side decodes the
//! value and hands it to a [`MessageHandler`] on a freshly spawned task, so
//! slow requests never block later ones.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::protocol::{RecognitionRequest, RecognitionResult};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0} context is not running")]
    Closed(&'static str),

    #[error("{0} context dropped the request without replying")]
    NoResponse(&'static str),

    #[error("failed to encode message: {0}")]
    Encode(#[from] anyhow::Error),
}

pub struct Envelope {
    pub id: Uuid,
    pub payload: serde_json::Value,
    pub reply: oneshot::Sender<RecognitionResult>,
}

#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, request: RecognitionRequest) -> RecognitionResult;
}

#[derive(Clone)]
pub struct ContextHandle {
    name: &'static str,
    tx: mpsc::Sender<Envelope>,
}

impl ContextHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Liveness probe: the serving task still owns the receiving end.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Send a request and wait for the reply. The reply channel stays open
    /// until the handler answers; there is no timeout.
    pub async fn request(
        &self,
        request: &RecognitionRequest,
    ) -> Result<RecognitionResult, TransportError> {
        let payload = request.encode()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        let id = Uuid::new_v4();

        log_debug!("-> {} {} ({})", self.name, request.action(), id);
        self.tx
            .send(Envelope {
                id,
                payload,
                reply: reply_tx,
            })
            .await
            .map_err(|_| TransportError::Closed(self.name))?;

        reply_rx
            .await
            .map_err(|_| TransportError::NoResponse(self.name))
    }
}

/// Start serving `handler` as the context `name` until `cancel` fires.
pub fn spawn_context<H: MessageHandler>(
    name: &'static str,
    handler: Arc<H>,
    cancel: CancellationToken,
) -> (ContextHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let task = tokio::spawn(serve(name, handler, rx, cancel));
    (ContextHandle { name, tx }, task)
}

async fn serve<H: MessageHandler>(
    name: &'static str,
    handler: Arc<H>,
    mut rx: mpsc::Receiver<Envelope>,
    cancel: CancellationToken,
) {
    log_info!("{} context started", name);
    loop {
        tokio::select! {
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                dispatch(name, Arc::clone(&handler), envelope);
            }
            _ = cancel.cancelled() => break,
        }
    }
    log_info!("{} context shutting down", name);
}

fn dispatch<H: MessageHandler>(name: &'static str, handler: Arc<H>, envelope: Envelope) {
    let Envelope { id, payload, reply } = envelope;
    tokio::spawn(async move {
        let result = match RecognitionRequest::decode(payload) {
            Ok(request) => handler.handle(request).await,
            Err(err) => {
                log_warn!("{} rejected message {}: {err:#}", name, id);
                RecognitionResult::failure(format!("{err:#}"))
            }
        };
        if reply.send(result).is_err() {
            log_warn!("{} reply for {} dropped: requester went away", name, id);
        }
    });
}
