//! Long-lived coordinator context: provisions the sandbox on demand and relays
//! solve requests to it.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    context::{spawn_context, ContextHandle, MessageHandler},
    protocol::{RecognitionRequest, RecognitionResult},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const COORDINATOR_CONTEXT: &str = "coordinator";

/// Creates a new sandbox context.
#[async_trait]
pub trait SandboxLauncher: Send + Sync {
    async fn launch(&self) -> Result<ContextHandle>;
}

pub struct Coordinator {
    launcher: Arc<dyn SandboxLauncher>,
    sandbox: Mutex<Option<ContextHandle>>,
}

impl Coordinator {
    pub fn new(launcher: Arc<dyn SandboxLauncher>) -> Self {
        Self {
            launcher,
            sandbox: Mutex::new(None),
        }
    }

    /// Start the coordinator as its own context.
    pub fn spawn(
        launcher: Arc<dyn SandboxLauncher>,
        cancel: CancellationToken,
    ) -> (ContextHandle, JoinHandle<()>) {
        spawn_context(COORDINATOR_CONTEXT, Arc::new(Self::new(launcher)), cancel)
    }

    /// Return the live sandbox, launching one only if none is running.
    ///
    /// The lock is held across the launch so concurrent requests observe the
    /// sandbox created by whichever request got there first.
    pub async fn ensure_sandbox(&self) -> Result<ContextHandle> {
        let mut slot = self.sandbox.lock().await;
        if let Some(handle) = slot.as_ref() {
            if handle.is_alive() {
                return Ok(handle.clone());
            }
            log_warn!("sandbox context is gone; launching a new one");
        }

        log_info!("Launching recognition sandbox");
        let handle = self.launcher.launch().await?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    async fn relay(&self, request: RecognitionRequest) -> RecognitionResult {
        let sandbox = match self.ensure_sandbox().await {
            Ok(handle) => handle,
            Err(err) => {
                log_error!("Error in background OCR: {err:#}");
                return RecognitionResult::failure(format!("sandbox unavailable: {err:#}"));
            }
        };

        match sandbox.request(&request).await {
            Ok(result) => result,
            Err(err) => {
                log_error!("Error in background OCR: {err}");
                RecognitionResult::failure(err.to_string())
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Coordinator {
    async fn handle(&self, request: RecognitionRequest) -> RecognitionResult {
        match request {
            RecognitionRequest::SolveCaptcha(descriptor) => {
                self.relay(RecognitionRequest::OcrRequest(descriptor)).await
            }
            other => {
                log_warn!("coordinator ignoring {} message", other.action());
                RecognitionResult::failure(format!(
                    "coordinator does not handle {}",
                    other.action()
                ))
            }
        }
    }
}
