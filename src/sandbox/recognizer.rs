use std::sync::Arc;

use anyhow::{Context, Result};
use image::DynamicImage;

use crate::{
    protocol::CaptureDescriptor,
    validation::{clean_text, is_valid_result},
};

use super::{
    engine::{EngineSlot, OcrEngine},
    imaging,
    screen::ScreenSource,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Which pass produced the returned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Raw,
    Enhanced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub text: String,
    pub pass: Pass,
    /// Whether `text` satisfies the validation predicate. Informational only.
    pub valid: bool,
}

pub struct Recognizer {
    engine: EngineSlot,
    screen: Arc<dyn ScreenSource>,
    binarize_threshold: u8,
}

impl Recognizer {
    pub fn new(engine: EngineSlot, screen: Arc<dyn ScreenSource>, binarize_threshold: u8) -> Self {
        Self {
            engine,
            screen,
            binarize_threshold,
        }
    }

    /// Raw pass first; one binarized retry when the raw text does not
    /// validate. The retry's text is returned whether or not it validates.
    pub async fn recognize(&self, descriptor: &CaptureDescriptor) -> Result<Recognition> {
        let engine = self.engine.get().await?;
        let source = self.resolve_pixels(descriptor).await?;

        log_info!("OCR Attempt 1 (Raw)...");
        let raw_png = encode_blocking(source.clone()).await?;
        let text = run_pass(engine.as_ref(), &raw_png).await?;
        if is_valid_result(&text) {
            log_info!("Valid result found: {}", text);
            return Ok(Recognition {
                text,
                pass: Pass::Raw,
                valid: true,
            });
        }

        log_info!("Invalid result '{}'. Retrying with filter...", text);
        let threshold = self.binarize_threshold;
        let enhanced_png = tokio::task::spawn_blocking(move || {
            let filtered = imaging::binarize(&source, threshold);
            imaging::encode_png(&DynamicImage::ImageRgba8(filtered))
        })
        .await
        .context("binarize worker join failed")??;

        let text = run_pass(engine.as_ref(), &enhanced_png).await?;
        let valid = is_valid_result(&text);
        if valid {
            log_info!("Valid result found after retry: {}", text);
        } else {
            log_info!("Retry finished. Best-effort result: '{}'", text);
        }
        Ok(Recognition {
            text,
            pass: Pass::Enhanced,
            valid,
        })
    }

    async fn resolve_pixels(&self, descriptor: &CaptureDescriptor) -> Result<DynamicImage> {
        match descriptor {
            CaptureDescriptor::InlineImage { image } => {
                let image = image.clone();
                tokio::task::spawn_blocking(move || imaging::decode_data_url(&image))
                    .await
                    .context("decode worker join failed")?
            }
            CaptureDescriptor::RegionCapture(rect) => {
                let screenshot = self
                    .screen
                    .capture_visible()
                    .await
                    .context("screen capture failed")?;
                log_debug!("Screenshot: {} bytes, cropping {:?}", screenshot.len(), rect);
                let rect = *rect;
                tokio::task::spawn_blocking(move || {
                    let full = imaging::decode_png(&screenshot)?;
                    imaging::crop_region(&full, &rect)
                })
                .await
                .context("crop worker join failed")?
            }
        }
    }
}

async fn encode_blocking(image: DynamicImage) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || imaging::encode_png(&image))
        .await
        .context("encode worker join failed")?
}

async fn run_pass(engine: &dyn OcrEngine, png: &[u8]) -> Result<String> {
    let raw = engine.recognize(png).await.context("recognition failed")?;
    Ok(clean_text(raw.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::engine::EngineLoader;
    use crate::sandbox::screen::NoScreen;
    use crate::protocol::RegionRect;
    use anyhow::bail;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::{collections::VecDeque, sync::Mutex};

    /// Replies with queued outputs and remembers every image it was given.
    struct Scripted {
        outputs: Mutex<VecDeque<Result<String, String>>>,
        seen: Mutex<Vec<DynamicImage>>,
    }

    impl Scripted {
        fn new(outputs: Vec<Result<&str, &str>>) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(
                    outputs
                        .into_iter()
                        .map(|o| o.map(String::from).map_err(String::from))
                        .collect(),
                ),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl OcrEngine for Scripted {
        async fn recognize(&self, png: &[u8]) -> Result<String> {
            self.seen.lock().unwrap().push(imaging::decode_png(png)?);
            match self.outputs.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(err)) => bail!(err),
                None => bail!("no scripted output left"),
            }
        }
    }

    struct Ready(Arc<Scripted>);

    #[async_trait]
    impl EngineLoader for Ready {
        async fn load(&self) -> Result<Arc<dyn OcrEngine>> {
            Ok(self.0.clone())
        }
    }

    struct Shot(Vec<u8>);

    #[async_trait]
    impl ScreenSource for Shot {
        async fn capture_visible(&self) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }

    fn grey_image(level: u8) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 4, Rgba([level, level, level, 255])))
    }

    fn inline(level: u8) -> CaptureDescriptor {
        let png = imaging::encode_png(&grey_image(level)).unwrap();
        CaptureDescriptor::InlineImage {
            image: imaging::encode_data_url(&png),
        }
    }

    fn recognizer(engine: Arc<Scripted>, screen: Arc<dyn ScreenSource>) -> Recognizer {
        Recognizer::new(EngineSlot::new(Arc::new(Ready(engine))), screen, 140)
    }

    #[tokio::test]
    async fn valid_raw_pass_skips_retry() {
        let engine = Scripted::new(vec![Ok(" A1B2\n")]);
        let recognizer = recognizer(engine.clone(), Arc::new(NoScreen));

        let result = recognizer.recognize(&inline(200)).await.unwrap();

        assert_eq!(result.text, "A1B2");
        assert_eq!(result.pass, Pass::Raw);
        assert!(result.valid);
        assert_eq!(engine.calls(), 1);
    }

    #[tokio::test]
    async fn invalid_raw_pass_retries_on_binarized_crop() {
        let engine = Scripted::new(vec![Ok("X9!"), Ok("X9")]);
        let recognizer = recognizer(engine.clone(), Arc::new(NoScreen));

        let result = recognizer.recognize(&inline(150)).await.unwrap();

        assert_eq!(result.text, "X9");
        assert_eq!(result.pass, Pass::Enhanced);
        assert!(!result.valid);

        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].to_rgba8().get_pixel(0, 0).0, [150, 150, 150, 255]);
        assert_eq!(seen[1].to_rgba8().get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn retry_can_produce_a_valid_result() {
        let engine = Scripted::new(vec![Ok("Q"), Ok("Q7W3")]);
        let recognizer = recognizer(engine, Arc::new(NoScreen));

        let result = recognizer.recognize(&inline(90)).await.unwrap();

        assert_eq!(result.text, "Q7W3");
        assert!(result.valid);
    }

    #[tokio::test]
    async fn region_capture_crops_the_screenshot() {
        let shot = RgbaImage::from_fn(100, 60, |x, _| {
            if x >= 20 && x < 60 { Rgba([10, 10, 10, 255]) } else { Rgba([250, 250, 250, 255]) }
        });
        let png = imaging::encode_png(&DynamicImage::ImageRgba8(shot)).unwrap();
        let engine = Scripted::new(vec![Ok("K3M9")]);
        let recognizer = recognizer(engine.clone(), Arc::new(Shot(png)));

        let descriptor = CaptureDescriptor::RegionCapture(RegionRect {
            x: 10.0,
            y: 5.0,
            width: 20.0,
            height: 10.0,
            device_pixel_ratio: 2.0,
        });
        recognizer.recognize(&descriptor).await.unwrap();

        let seen = engine.seen.lock().unwrap();
        assert_eq!((seen[0].width(), seen[0].height()), (40, 20));
        assert_eq!(seen[0].to_rgba8().get_pixel(0, 0).0, [10, 10, 10, 255]);
    }

    #[tokio::test]
    async fn engine_errors_propagate() {
        let engine = Scripted::new(vec![Err("engine crashed")]);
        let recognizer = recognizer(engine, Arc::new(NoScreen));

        let err = recognizer.recognize(&inline(200)).await.unwrap_err();
        assert!(format!("{err:#}").contains("engine crashed"));
    }

    #[tokio::test]
    async fn missing_screen_fails_region_capture() {
        let engine = Scripted::new(vec![]);
        let recognizer = recognizer(engine.clone(), Arc::new(NoScreen));
        let descriptor = CaptureDescriptor::RegionCapture(RegionRect {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            device_pixel_ratio: 1.0,
        });

        assert!(recognizer.recognize(&descriptor).await.is_err());
        assert_eq!(engine.calls(), 0);
    }
}
