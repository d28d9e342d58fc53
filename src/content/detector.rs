use tokio::sync::watch;

use crate::page::{Document, NodeId};

/// Dataset key marking an image as already submitted for recognition.
pub const PROCESSED_MARKER: &str = "ocrProcessed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptchaTarget {
    pub node: NodeId,
    pub src: String,
}

pub struct Detector {
    pattern: String,
    enabled: watch::Receiver<bool>,
}

impl Detector {
    pub fn new(pattern: impl Into<String>, enabled: watch::Receiver<bool>) -> Self {
        Self {
            pattern: pattern.into(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Claim every unprocessed captcha image in the subtree at `root`.
    ///
    /// The marker is written here, before the caller starts any async work, so
    /// a later overlapping scan never claims the same image again.
    pub fn detect(&self, doc: &mut Document, root: NodeId) -> Vec<CaptchaTarget> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut targets = Vec::new();
        for node in doc.subtree(root) {
            let Some(src) = self.captcha_src(doc, node) else {
                continue;
            };
            doc.set_data(node, PROCESSED_MARKER, "true");
            targets.push(CaptchaTarget { node, src });
        }
        targets
    }

    fn captcha_src(&self, doc: &Document, node: NodeId) -> Option<String> {
        let element = doc.element(node);
        if !element.is("img") || element.data(PROCESSED_MARKER).is_some() {
            return None;
        }
        element
            .attribute("src")
            .filter(|src| src.contains(self.pattern.as_str()))
            .map(str::to_string)
    }
}
