pub mod config;
pub mod content;
pub mod context;
pub mod coordinator;
pub mod page;
pub mod protocol;
pub mod sandbox;
pub mod settings;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use config::PipelineConfig;
use content::ContentScript;
use context::ContextHandle;
use coordinator::{Coordinator, SandboxLauncher};
use page::{PageHost, SharedDocument};
use sandbox::{EngineLoader, LocalSandboxLauncher, ScreenSource};

pub use protocol::{CaptureDescriptor, RecognitionRequest, RecognitionResult, RegionRect};
pub use utils::init_logging;

const ENABLE_LOGS: bool = true;

/// A running pipeline: the coordinator context plus any attached pages.
///
/// The sandbox is not started here; the coordinator launches it on the first
/// solve request.
pub struct AutoCaptcha {
    config: PipelineConfig,
    coordinator: ContextHandle,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl AutoCaptcha {
    pub fn start(config: PipelineConfig, launcher: Arc<dyn SandboxLauncher>) -> Self {
        Self::start_with(config, launcher, CancellationToken::new())
    }

    /// Start with local sandboxes that recognize through `loader` and take
    /// screenshots from `screen`. They stop together with the pipeline.
    pub fn with_engine(
        config: PipelineConfig,
        loader: Arc<dyn EngineLoader>,
        screen: Arc<dyn ScreenSource>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let launcher = Arc::new(LocalSandboxLauncher::new(
            loader,
            screen,
            config.binarize_threshold,
            cancel.child_token(),
        ));
        Self::start_with(config, launcher, cancel)
    }

    fn start_with(
        config: PipelineConfig,
        launcher: Arc<dyn SandboxLauncher>,
        cancel: CancellationToken,
    ) -> Self {
        let (coordinator, task) = Coordinator::spawn(launcher, cancel.child_token());
        log_info!("Coordinator ready");
        Self {
            config,
            coordinator,
            cancel,
            tasks: vec![task],
        }
    }

    pub fn coordinator(&self) -> &ContextHandle {
        &self.coordinator
    }

    /// Attach a page: scan it now and watch it for inserted captchas.
    pub fn attach_page(
        &mut self,
        doc: SharedDocument,
        host: Arc<dyn PageHost>,
        enabled: watch::Receiver<bool>,
    ) -> Arc<ContentScript> {
        let script = Arc::new(ContentScript::new(
            &self.config,
            doc,
            host,
            enabled,
            self.coordinator.clone(),
        ));
        let task = Arc::clone(&script).start(self.cancel.child_token());
        self.tasks.push(task);
        script
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                log_warn!("pipeline task ended abnormally: {err}");
            }
        }
        log_info!("Pipeline stopped");
    }
}
