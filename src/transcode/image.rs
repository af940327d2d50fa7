//! Image transcoding: WebP conversion and optional re-encoding.
//!
//! Re-encoding keeps the original bytes whenever the new encoding is not
//! smaller, so optimizing never grows a file.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};

use super::TranscodeError;

/// Encode a raster image as lossless WebP.
pub fn to_webp(bytes: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let img = decode(bytes)?;
    // The WebP encoder takes 8-bit RGB(A) only
    let img = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    let mut out = Vec::new();
    img.write_with_encoder(WebPEncoder::new_lossless(&mut out))
        .map_err(|e| TranscodeError::Image(e.to_string()))?;
    Ok(out)
}

/// Re-encode by extension: PNG with best compression, JPEG at `quality`,
/// SVG re-serialized through usvg. Other formats are returned unchanged.
pub fn optimize(ext: &str, bytes: &[u8], quality: u8) -> Result<Vec<u8>, TranscodeError> {
    let encoded = match ext.to_ascii_lowercase().as_str() {
        "png" => {
            let img = decode(bytes)?;
            let mut out = Vec::new();
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut out,
                CompressionType::Best,
                FilterType::Adaptive,
            ))
            .map_err(|e| TranscodeError::Image(e.to_string()))?;
            out
        }
        "jpg" | "jpeg" => {
            let img = DynamicImage::ImageRgb8(decode(bytes)?.to_rgb8());
            let mut out = Vec::new();
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
                .map_err(|e| TranscodeError::Image(e.to_string()))?;
            out
        }
        "svg" => optimize_svg(bytes)?,
        _ => return Ok(bytes.to_vec()),
    };

    Ok(if encoded.len() < bytes.len() {
        encoded
    } else {
        bytes.to_vec()
    })
}

/// Re-serialize SVG through usvg (drops editor metadata, normalizes paths).
pub fn optimize_svg(bytes: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let tree = usvg::Tree::from_data(bytes, &usvg::Options::default())
        .map_err(|e| TranscodeError::Image(format!("failed to parse SVG: {e}")))?;
    let write_options = usvg::WriteOptions {
        indent: usvg::Indent::None,
        ..Default::default()
    };
    Ok(tree.to_string(&write_options).into_bytes())
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, TranscodeError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TranscodeError::Image(e.to_string()))?
        .decode()
        .map_err(|e| TranscodeError::Image(e.to_string()))
}

/// Detected raster format, if any.
pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}
