//! Messages exchanged between the content, coordinator and sandbox contexts.
//!
//! Every message crosses a context boundary as a JSON value and is decoded on
//! arrival, so an unknown `action` is rejected at the receiving side instead of
//! being silently dropped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Screen region of an element in CSS pixels, plus the ratio needed to map it
/// onto a device-pixel screenshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

/// What the sandbox should recognize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CaptureDescriptor {
    /// Self-contained pixels as a `data:image/png;base64,...` URL.
    InlineImage { image: String },
    /// Geometry only; resolved against a screenshot inside the sandbox.
    RegionCapture(RegionRect),
}

impl CaptureDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            CaptureDescriptor::InlineImage { .. } => "inline",
            CaptureDescriptor::RegionCapture(_) => "region",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecognitionRequest {
    /// Content context asks the coordinator to solve a captcha.
    SolveCaptcha(CaptureDescriptor),
    /// Coordinator relays the same descriptor to the sandbox.
    OcrRequest(CaptureDescriptor),
}

impl RecognitionRequest {
    pub fn action(&self) -> &'static str {
        match self {
            RecognitionRequest::SolveCaptcha(_) => "SOLVE_CAPTCHA",
            RecognitionRequest::OcrRequest(_) => "OCR_REQUEST",
        }
    }

    pub fn descriptor(&self) -> &CaptureDescriptor {
        match self {
            RecognitionRequest::SolveCaptcha(descriptor)
            | RecognitionRequest::OcrRequest(descriptor) => descriptor,
        }
    }

    pub fn encode(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).context("failed to encode recognition request")
    }

    pub fn decode(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).context("unrecognized or malformed message")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecognitionResult {
    pub fn solved(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: Some(text.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            error: Some(error.into()),
        }
    }
}
