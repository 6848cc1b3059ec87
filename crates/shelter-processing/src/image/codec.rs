use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, RgbImage};
use shelter_core::constants::{CANONICAL_IMAGE_CONTENT_TYPE, JPEG_QUALITY, MAX_IMAGE_EDGE};

use crate::error::CodecError;

/// Output of [`normalize_image`].
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub content_type: &'static str,
}

/// Compute the output dimensions for an image of `width`×`height`.
///
/// Images whose longer edge is at most `max_edge` keep their size. Larger
/// ones are scaled so the longer edge is exactly `max_edge`; the shorter edge
/// is scaled proportionally, rounded to the nearest pixel and never below 1.
pub fn target_dimensions(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width.max(height) <= max_edge {
        return (width, height);
    }

    let scale = |short: u32, long: u32| -> u32 {
        let scaled = (short as u64 * max_edge as u64 + long as u64 / 2) / long as u64;
        (scaled as u32).max(1)
    };

    if width >= height {
        (max_edge, scale(height, width))
    } else {
        (scale(width, height), max_edge)
    }
}

/// Decode, conditionally downscale and re-encode an uploaded image.
///
/// The format is sniffed from the bytes; `claimed_content_type` is only used
/// when sniffing fails. The result is always JPEG at [`JPEG_QUALITY`],
/// whatever the input format was. Transparent pixels are composited onto white.
pub fn normalize_image(
    data: &[u8],
    claimed_content_type: &str,
) -> Result<NormalizedImage, CodecError> {
    let img = decode(data, claimed_content_type)?;
    let (orig_width, orig_height) = img.dimensions();
    let (width, height) = target_dimensions(orig_width, orig_height, MAX_IMAGE_EDGE);

    let img = if (width, height) == (orig_width, orig_height) {
        img
    } else {
        tracing::debug!(
            orig_width,
            orig_height,
            width,
            height,
            "Downscaling image to canonical size"
        );
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    let rgb = flatten_to_rgb(&img);
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| CodecError::Encode(e.to_string()))?;

    let size_bytes = buffer.len() as u64;
    Ok(NormalizedImage {
        data: buffer,
        width: rgb.width(),
        height: rgb.height(),
        size_bytes,
        content_type: CANONICAL_IMAGE_CONTENT_TYPE,
    })
}

fn decode(data: &[u8], claimed_content_type: &str) -> Result<DynamicImage, CodecError> {
    if data.is_empty() {
        return Err(CodecError::Decode("empty payload".to_string()));
    }

    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(e.to_string()))?;

    if reader.format().is_none() {
        let hinted = ImageFormat::from_mime_type(claimed_content_type).ok_or_else(|| {
            CodecError::Decode(format!(
                "unrecognized image data (claimed type '{}')",
                claimed_content_type
            ))
        })?;
        reader.set_format(hinted);
    }

    reader
        .decode()
        .map_err(|e| CodecError::Decode(e.to_string()))
}

fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u16;
        let blend = |c: u8| ((c as u16 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}
