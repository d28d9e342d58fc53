use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::protocol::RegionRect;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

pub fn encode_data_url(png: &[u8]) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png))
}

/// Decode a base64 `data:` URL into an image. Any image media type is accepted.
pub fn decode_data_url(uri: &str) -> Result<DynamicImage> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| anyhow!("not a data URL"))?;
    if !header.starts_with("data:") || !header.ends_with(";base64") {
        bail!("unsupported data URL header '{header}'");
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .context("invalid base64 image payload")?;
    image::load_from_memory(&bytes).context("failed to decode inline image")
}

pub fn decode_png(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png).context("failed to decode screenshot")
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(out.into_inner())
}

/// Cut `rect` (CSS pixels) out of a device-pixel screenshot.
///
/// The source rectangle is the region scaled by its device pixel ratio and the
/// output keeps that scaled size. The rectangle is clamped to the screenshot.
pub fn crop_region(screenshot: &DynamicImage, rect: &RegionRect) -> Result<DynamicImage> {
    let scale = rect.device_pixel_ratio;
    if !(scale.is_finite() && scale > 0.0) {
        bail!("invalid device pixel ratio {scale}");
    }

    let (img_w, img_h) = (screenshot.width() as f64, screenshot.height() as f64);
    let left = (rect.x * scale).round().clamp(0.0, img_w);
    let top = (rect.y * scale).round().clamp(0.0, img_h);
    let right = ((rect.x + rect.width) * scale).round().clamp(0.0, img_w);
    let bottom = ((rect.y + rect.height) * scale).round().clamp(0.0, img_h);

    let width = (right - left).max(0.0) as u32;
    let height = (bottom - top).max(0.0) as u32;
    if width == 0 || height == 0 {
        bail!(
            "capture region {}x{} at ({}, {}) is outside the screenshot",
            rect.width,
            rect.height,
            rect.x,
            rect.y
        );
    }

    Ok(screenshot.crop_imm(left as u32, top as u32, width, height))
}

/// Black/white threshold on the per-pixel average of R, G and B.
/// Averages above `threshold` become white, the rest black. Alpha is kept.
pub fn binarize(image: &DynamicImage, threshold: u8) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    // avg > t  <=>  r + g + b > 3t, without integer division rounding
    let cutoff = u16::from(threshold) * 3;
    for pixel in rgba.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let sum = u16::from(r) + u16::from(g) + u16::from(b);
        let value = if sum > cutoff { 255 } else { 0 };
        pixel.0[0] = value;
        pixel.0[1] = value;
        pixel.0[2] = value;
    }
    rgba
}
