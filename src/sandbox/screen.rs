use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Full visible-page screenshot, available only inside the sandbox.
#[async_trait]
pub trait ScreenSource: Send + Sync {
    /// PNG bytes in device pixels.
    async fn capture_visible(&self) -> Result<Vec<u8>>;
}

/// Serves a screenshot saved to disk. Used by the CLI.
pub struct FileScreenSource {
    path: PathBuf,
}

impl FileScreenSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ScreenSource for FileScreenSource {
    async fn capture_visible(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read screenshot {}", self.path.display()))
    }
}

/// Stand-in for environments with no screen; every capture fails.
pub struct NoScreen;

#[async_trait]
impl ScreenSource for NoScreen {
    async fn capture_visible(&self) -> Result<Vec<u8>> {
        anyhow::bail!("screen capture is not available in this sandbox")
    }
}
