//! Page-adjacent context: detection, capture and filling for one page.

pub mod capturer;
pub mod detector;
pub mod filler;

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::PipelineConfig,
    context::ContextHandle,
    page::{dom, NodeId, PageHost, SharedDocument},
    protocol::RecognitionRequest,
};

pub use capturer::Capturer;
pub use detector::{CaptchaTarget, Detector, PROCESSED_MARKER};
pub use filler::Filler;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// How one captcha ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Filled { input: NodeId, text: String },
    /// Recognized, but no input field was found next to the image.
    NoInput { text: String },
    Failed { error: String },
}

pub struct ContentScript {
    doc: SharedDocument,
    detector: Detector,
    capturer: Capturer,
    filler: Filler,
    runtime: ContextHandle,
}

impl ContentScript {
    pub fn new(
        config: &PipelineConfig,
        doc: SharedDocument,
        host: Arc<dyn PageHost>,
        enabled: watch::Receiver<bool>,
        runtime: ContextHandle,
    ) -> Self {
        Self {
            doc,
            detector: Detector::new(config.target_pattern.clone(), enabled),
            capturer: Capturer::new(host, config.settle_delay),
            filler: Filler::new(config.highlight.clone()),
            runtime,
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    /// Claim the captchas under `root` and start one solve task per image.
    pub fn scan(self: &Arc<Self>, root: NodeId) -> Vec<JoinHandle<SolveOutcome>> {
        let targets = {
            let mut doc = dom::lock(&self.doc);
            self.detector.detect(&mut doc, root)
        };

        targets
            .into_iter()
            .map(|target| {
                let script = Arc::clone(self);
                tokio::spawn(async move { script.solve(target).await })
            })
            .collect()
    }

    /// Process the existing page, then every inserted subtree until `cancel`
    /// fires.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let (body, mut insertions) = {
            let mut doc = dom::lock(&self.doc);
            (doc.body(), doc.watch_insertions())
        };

        tokio::spawn(async move {
            log_info!("Content script loaded");
            self.scan(body);
            loop {
                tokio::select! {
                    inserted = insertions.recv() => {
                        let Some(node) = inserted else { break };
                        self.scan(node);
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        })
    }

    pub async fn solve(&self, target: CaptchaTarget) -> SolveOutcome {
        log_info!("Found captcha: {}", target.src);
        match self.recognize(&target).await {
            Ok(text) => {
                log_info!("Solved: {}", text);
                let mut doc = dom::lock(&self.doc);
                match self.filler.fill(&mut doc, target.node, &text) {
                    Some(input) => SolveOutcome::Filled { input, text },
                    None => SolveOutcome::NoInput { text },
                }
            }
            Err(err) => {
                log_error!("Failed to solve {}: {err:#}", target.src);
                SolveOutcome::Failed {
                    error: format!("{err:#}"),
                }
            }
        }
    }

    async fn recognize(&self, target: &CaptchaTarget) -> Result<String> {
        let descriptor = self.capturer.capture(target).await?;

        log_info!("Sending for OCR ({} capture)...", descriptor.kind());
        let response = self
            .runtime
            .request(&RecognitionRequest::SolveCaptcha(descriptor))
            .await?;

        match (response.success, response.text) {
            (true, Some(text)) => Ok(text),
            (true, None) => bail!("solver reported success without text"),
            (false, _) => bail!(
                "{}",
                response
                    .error
                    .unwrap_or_else(|| "unknown solver error".to_string())
            ),
        }
    }
}
