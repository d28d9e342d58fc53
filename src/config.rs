use std::{path::PathBuf, time::Duration};

/// Substring identifying captcha image sources on the target site.
pub const DEFAULT_TARGET_PATTERN: &str = "voCode";

/// Configuration for the capture-and-recognize pipeline with tunable values.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Images whose `src` contains this substring are treated as captchas
    pub target_pattern: String,

    /// Wait after scrolling a tainted image into view before measuring it
    pub settle_delay: Duration,

    /// Binarization cut-off used by the enhanced recognition pass
    pub binarize_threshold: u8,

    /// Visual feedback applied to a filled input
    pub highlight: HighlightStyle,

    pub engine: EngineAssets,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_pattern: DEFAULT_TARGET_PATTERN.into(),
            settle_delay: Duration::from_millis(100),
            binarize_threshold: 140,
            highlight: HighlightStyle::default(),
            engine: EngineAssets::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with `AUTOCAPTCHA_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(pattern) = std::env::var("AUTOCAPTCHA_PATTERN") {
            if !pattern.is_empty() {
                config.target_pattern = pattern;
            }
        }
        if let Ok(dir) = std::env::var("AUTOCAPTCHA_ASSETS_DIR") {
            config.engine.assets_dir = PathBuf::from(dir);
        }
        if let Ok(bin) = std::env::var("AUTOCAPTCHA_TESSERACT") {
            config.engine.tesseract_bin = PathBuf::from(bin);
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightStyle {
    pub background_color: String,
    pub border: String,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            background_color: "#e6fffa".into(),
            border: "2px solid #38b2ac".into(),
        }
    }
}

/// Locations of the pre-provisioned OCR runtime and trained data.
#[derive(Debug, Clone)]
pub struct EngineAssets {
    pub assets_dir: PathBuf,
    pub tesseract_bin: PathBuf,
    pub language: String,
    /// Passed as `--psm` when set; the engine default otherwise.
    pub page_seg_mode: Option<u8>,
}

impl Default for EngineAssets {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            tesseract_bin: PathBuf::from("tesseract"),
            language: "eng".into(),
            page_seg_mode: None,
        }
    }
}

impl EngineAssets {
    pub fn tessdata_dir(&self) -> PathBuf {
        self.assets_dir.join("tessdata")
    }

    pub fn trained_data(&self) -> PathBuf {
        self.tessdata_dir()
            .join(format!("{}.traineddata", self.language))
    }
}
