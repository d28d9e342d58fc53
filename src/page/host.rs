use async_trait::async_trait;
use thiserror::Error;

use super::dom::NodeId;

/// Why an image's pixels could not be read back.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The image origin forbids pixel readout (tainted surface).
    #[error("security error: {0}")]
    Tainted(String),

    #[error("raster failed: {0}")]
    Failed(String),
}

/// Bounding rectangle in CSS pixels relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClientRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Rendering capabilities the page-adjacent context borrows from the browser.
#[async_trait]
pub trait PageHost: Send + Sync {
    /// Draw the image at its natural size onto an offscreen surface and
    /// serialize that surface as PNG.
    async fn rasterize_image(&self, image: NodeId, src: &str) -> Result<Vec<u8>, RasterError>;

    /// Scroll so the element sits centered in the viewport.
    fn scroll_into_view(&self, node: NodeId);

    fn bounding_rect(&self, node: NodeId) -> ClientRect;

    fn device_pixel_ratio(&self) -> f64;
}
