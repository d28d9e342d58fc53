//! Recognition sandbox: the isolated context that owns the OCR engine.

pub mod engine;
pub mod imaging;
pub mod recognizer;
pub mod screen;
pub mod tesseract;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    context::{spawn_context, ContextHandle, MessageHandler},
    coordinator::SandboxLauncher,
    protocol::{RecognitionRequest, RecognitionResult},
};

pub use engine::{EngineLoader, EngineSlot, OcrEngine};
pub use recognizer::{Pass, Recognition, Recognizer};
pub use screen::{FileScreenSource, NoScreen, ScreenSource};
pub use tesseract::TesseractLoader;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_warn};

pub const SANDBOX_CONTEXT: &str = "sandbox";

/// Serves `OCR_REQUEST` messages.
pub struct Sandbox {
    recognizer: Recognizer,
}

impl Sandbox {
    pub fn new(recognizer: Recognizer) -> Self {
        Self { recognizer }
    }
}

#[async_trait]
impl MessageHandler for Sandbox {
    async fn handle(&self, request: RecognitionRequest) -> RecognitionResult {
        let descriptor = match request {
            RecognitionRequest::OcrRequest(descriptor) => descriptor,
            other => {
                log_warn!("sandbox ignoring {} message", other.action());
                return RecognitionResult::failure(format!(
                    "sandbox does not handle {}",
                    other.action()
                ));
            }
        };

        match self.recognizer.recognize(&descriptor).await {
            Ok(recognition) => RecognitionResult::solved(recognition.text),
            Err(err) => {
                log_error!("OCR Error: {err:#}");
                RecognitionResult::failure(format!("{err:#}"))
            }
        }
    }
}

/// Launches sandboxes as tasks in the current runtime. Every sandbox gets a
/// fresh engine slot, so a relaunched sandbox initializes its own engine.
pub struct LocalSandboxLauncher {
    loader: Arc<dyn EngineLoader>,
    screen: Arc<dyn ScreenSource>,
    binarize_threshold: u8,
    cancel: CancellationToken,
}

impl LocalSandboxLauncher {
    pub fn new(
        loader: Arc<dyn EngineLoader>,
        screen: Arc<dyn ScreenSource>,
        binarize_threshold: u8,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            loader,
            screen,
            binarize_threshold,
            cancel,
        }
    }
}

#[async_trait]
impl SandboxLauncher for LocalSandboxLauncher {
    async fn launch(&self) -> Result<ContextHandle> {
        let recognizer = Recognizer::new(
            EngineSlot::new(Arc::clone(&self.loader)),
            Arc::clone(&self.screen),
            self.binarize_threshold,
        );
        let (handle, _task) = spawn_context(
            SANDBOX_CONTEXT,
            Arc::new(Sandbox::new(recognizer)),
            self.cancel.child_token(),
        );
        Ok(handle)
    }
}
