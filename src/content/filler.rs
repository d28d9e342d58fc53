use crate::{
    config::HighlightStyle,
    page::{Document, NodeId},
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Containers searched when no sibling input exists.
const CONTAINER_TAGS: [&str; 4] = ["div", "tr", "p", "form"];

pub struct Filler {
    highlight: HighlightStyle,
}

impl Filler {
    pub fn new(highlight: HighlightStyle) -> Self {
        Self { highlight }
    }

    /// Write `text` into the input belonging to the captcha `image`.
    /// Returns the filled input, or `None` when nothing plausible was found.
    pub fn fill(&self, doc: &mut Document, image: NodeId, text: &str) -> Option<NodeId> {
        let Some(input) = find_input(doc, image) else {
            log_warn!("Could not find input field for captcha");
            return None;
        };

        log_info!("Filling input {:?}", input);
        doc.set_value(input, text);
        doc.dispatch_event(input, "input");
        doc.dispatch_event(input, "change");
        doc.set_style(input, "background-color", &self.highlight.background_color);
        doc.set_style(input, "border", &self.highlight.border);
        Some(input)
    }
}

/// Sibling text inputs first, then the first text input inside the nearest
/// enclosing container.
pub fn find_input(doc: &Document, image: NodeId) -> Option<NodeId> {
    doc.siblings(image)
        .into_iter()
        .find(|node| doc.element(*node).is_text_input())
        .or_else(|| {
            let container = doc.closest(image, &CONTAINER_TAGS)?;
            doc.find_descendant(container, |element| element.is_text_input())
        })
}
