//! Tesseract engine driven through its command-line runtime.
//!
//! The runtime executable and the trained-language file are provisioned out of
//! band; loading fails when either is missing.

use std::{process::Stdio, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};

use crate::config::EngineAssets;

use super::engine::{EngineLoader, OcrEngine};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

pub struct TesseractLoader {
    assets: EngineAssets,
}

impl TesseractLoader {
    pub fn new(assets: EngineAssets) -> Self {
        Self { assets }
    }
}

#[async_trait]
impl EngineLoader for TesseractLoader {
    async fn load(&self) -> Result<Arc<dyn OcrEngine>> {
        let trained = self.assets.trained_data();
        if !tokio::fs::try_exists(&trained).await.unwrap_or(false) {
            bail!("trained data not found at {}", trained.display());
        }

        let output = Command::new(&self.assets.tesseract_bin)
            .arg("--version")
            .output()
            .await
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => anyhow!(
                    "OCR runtime not found at {} (install tesseract-ocr)",
                    self.assets.tesseract_bin.display()
                ),
                _ => anyhow!(err).context("failed to start OCR runtime"),
            })?;
        if !output.status.success() {
            bail!(
                "OCR runtime check failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let version = String::from_utf8_lossy(&output.stdout);
        log_debug!(
            "Using {}",
            version.lines().next().unwrap_or("tesseract (unknown version)")
        );

        Ok(Arc::new(TesseractEngine {
            assets: self.assets.clone(),
        }))
    }
}

pub struct TesseractEngine {
    assets: EngineAssets,
}

impl TesseractEngine {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.assets.tesseract_bin);
        command
            .arg("stdin")
            .arg("stdout")
            .arg("--tessdata-dir")
            .arg(self.assets.tessdata_dir())
            .args(["-l", &self.assets.language]);
        if let Some(psm) = self.assets.page_seg_mode {
            command.args(["--psm", &psm.to_string()]);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, png: &[u8]) -> Result<String> {
        let mut child = self.command().spawn().context("failed to spawn tesseract")?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("tesseract stdin unavailable"))?;
        stdin
            .write_all(png)
            .await
            .context("failed to stream image to tesseract")?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .context("tesseract did not finish")?;
        if !output.status.success() {
            bail!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
