use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};

use crate::{
    page::{PageHost, RasterError},
    protocol::{CaptureDescriptor, RegionRect},
    sandbox::imaging::encode_data_url,
};

use super::detector::CaptchaTarget;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Turns a detected image into exactly one capture descriptor.
pub struct Capturer {
    host: Arc<dyn PageHost>,
    settle_delay: Duration,
}

impl Capturer {
    pub fn new(host: Arc<dyn PageHost>, settle_delay: Duration) -> Self {
        Self { host, settle_delay }
    }

    /// Inline pixels when the image can be read back; a screen region when
    /// the read is refused for security reasons. Other read failures abort.
    pub async fn capture(&self, target: &CaptchaTarget) -> Result<CaptureDescriptor> {
        log_info!("Attempting Canvas capture...");
        match self.host.rasterize_image(target.node, &target.src).await {
            Ok(png) => {
                log_info!("Canvas capture successful.");
                Ok(CaptureDescriptor::InlineImage {
                    image: encode_data_url(&png),
                })
            }
            Err(RasterError::Tainted(reason)) => {
                log_warn!("Canvas capture failed ({reason}). Falling back to Screenshot.");
                Ok(CaptureDescriptor::RegionCapture(self.locate(target).await))
            }
            Err(err) => Err(anyhow!(err).context("image capture failed")),
        }
    }

    async fn locate(&self, target: &CaptchaTarget) -> RegionRect {
        self.host.scroll_into_view(target.node);
        tokio::time::sleep(self.settle_delay).await;

        let rect = self.host.bounding_rect(target.node);
        RegionRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            device_pixel_ratio: self.host.device_pixel_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ClientRect, Document, NodeId};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Readout {
        Pixels,
        Tainted,
        Broken,
    }

    struct FakeHost {
        readout: Readout,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeHost {
        fn new(readout: Readout) -> Arc<Self> {
            Arc::new(Self {
                readout,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageHost for FakeHost {
        async fn rasterize_image(&self, _image: NodeId, _src: &str) -> Result<Vec<u8>, RasterError> {
            self.calls.lock().unwrap().push("rasterize");
            match self.readout {
                Readout::Pixels => Ok(vec![1, 2, 3]),
                Readout::Tainted => Err(RasterError::Tainted("canvas has been tainted".into())),
                Readout::Broken => Err(RasterError::Failed("image not decoded".into())),
            }
        }

        fn scroll_into_view(&self, _node: NodeId) {
            self.calls.lock().unwrap().push("scroll");
        }

        fn bounding_rect(&self, _node: NodeId) -> ClientRect {
            self.calls.lock().unwrap().push("rect");
            ClientRect {
                x: 12.0,
                y: 34.0,
                width: 90.0,
                height: 30.0,
            }
        }

        fn device_pixel_ratio(&self) -> f64 {
            1.5
        }
    }

    fn target() -> CaptchaTarget {
        let mut doc = Document::new();
        let node = doc.create_element("img");
        CaptchaTarget {
            node,
            src: "https://portal.example/voCode".into(),
        }
    }

    #[tokio::test]
    async fn readable_image_is_inlined() {
        let host = FakeHost::new(Readout::Pixels);
        let capturer = Capturer::new(host.clone(), Duration::from_millis(100));

        let descriptor = capturer.capture(&target()).await.unwrap();

        assert_eq!(
            descriptor,
            CaptureDescriptor::InlineImage {
                image: "data:image/png;base64,AQID".into()
            }
        );
        assert_eq!(host.calls(), vec!["rasterize"]);
    }

    #[tokio::test]
    async fn tainted_image_falls_back_to_region() {
        let host = FakeHost::new(Readout::Tainted);
        let capturer = Capturer::new(host.clone(), Duration::from_millis(100));

        let started = Instant::now();
        let descriptor = capturer.capture(&target()).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(100));
        assert_eq!(
            descriptor,
            CaptureDescriptor::RegionCapture(RegionRect {
                x: 12.0,
                y: 34.0,
                width: 90.0,
                height: 30.0,
                device_pixel_ratio: 1.5,
            })
        );
        assert_eq!(host.calls(), vec!["rasterize", "scroll", "rect"]);
    }

    #[tokio::test]
    async fn other_read_failures_do_not_fall_back() {
        let host = FakeHost::new(Readout::Broken);
        let capturer = Capturer::new(host.clone(), Duration::from_millis(100));

        assert!(capturer.capture(&target()).await.is_err());
        assert_eq!(host.calls(), vec!["rasterize"]);
    }
}
