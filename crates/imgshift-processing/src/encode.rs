//! Per-format encoders.
//!
//! Every encoder starts from decoded pixels, so nothing from the source container
//! (EXIF, ICC profiles, text chunks, timestamps) survives into the output.

use crate::error::TranscodeError;
use bytes::Bytes;
use image::codecs::gif::GifEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, GenericImageView};
use imgshift_core::OutputFormat;

/// Quality for the lossy encoders (JPEG and WebP).
pub const LOSSY_QUALITY: f32 = 85.0;
/// libwebp compression method, 0 (fast) to 6 (smallest output).
pub const WEBP_METHOD: i32 = 6;
/// NeuQuant sampling factor used when reducing to the 256-colour GIF palette.
pub const GIF_QUANTIZER_SPEED: i32 = 10;

const WEBP_MAX_DIMENSION: u32 = 16383;
const JPEG_MAX_DIMENSION: u32 = 65535;
const GIF_MAX_DIMENSION: u32 = 65535;

/// Quality passed to the encoder, `None` for lossless and palette formats.
pub fn quality_for(format: OutputFormat) -> Option<f32> {
    format.is_lossy().then_some(LOSSY_QUALITY)
}

pub fn encode(img: &DynamicImage, format: OutputFormat) -> Result<Bytes, TranscodeError> {
    match (format, quality_for(format)) {
        (OutputFormat::Jpeg, Some(quality)) => encode_jpeg(img, quality),
        (OutputFormat::WebP, Some(quality)) => encode_webp(img, quality),
        (OutputFormat::Gif, None) if format.is_palette_based() => encode_gif(img),
        (OutputFormat::Png, None) => encode_png(img),
        (format, _) => Err(encode_failed(format, "no encoder policy for this format")),
    }
}

fn check_dimensions(img: &DynamicImage, max: u32, format: OutputFormat) -> Result<(), TranscodeError> {
    let (width, height) = img.dimensions();
    if width > max || height > max {
        return Err(TranscodeError::DimensionsTooLarge {
            width,
            height,
            max,
            format,
        });
    }
    Ok(())
}

fn encode_failed(format: OutputFormat, reason: impl ToString) -> TranscodeError {
    TranscodeError::Encode {
        format,
        reason: reason.to_string(),
    }
}

/// Progressive JPEG through mozjpeg. Alpha is dropped.
fn encode_jpeg(img: &DynamicImage, quality: f32) -> Result<Bytes, TranscodeError> {
    check_dimensions(img, JPEG_MAX_DIMENSION, OutputFormat::Jpeg)?;
    let rgb_img = img.to_rgb8();
    let (width, height) = rgb_img.dimensions();

    let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
    comp.set_size(width as usize, height as usize);
    comp.set_quality(quality);
    comp.set_progressive_mode();
    comp.set_optimize_coding(true);

    let mut comp = comp
        .start_compress(Vec::new())
        .map_err(|e| encode_failed(OutputFormat::Jpeg, e))?;
    comp.write_scanlines(&rgb_img)
        .map_err(|e| encode_failed(OutputFormat::Jpeg, e))?;
    let jpeg_data = comp
        .finish()
        .map_err(|e| encode_failed(OutputFormat::Jpeg, e))?;

    Ok(Bytes::from(jpeg_data))
}

/// Lossless PNG at maximum deflate effort.
fn encode_png(img: &DynamicImage) -> Result<Bytes, TranscodeError> {
    let mut buffer = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buffer, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| encode_failed(OutputFormat::Png, e))?;
    Ok(Bytes::from(buffer))
}

fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Bytes, TranscodeError> {
    check_dimensions(img, WEBP_MAX_DIMENSION, OutputFormat::WebP)?;
    let (width, height) = img.dimensions();
    let rgba_img = img.to_rgba8();

    let mut config = webp::WebPConfig::new()
        .map_err(|_| encode_failed(OutputFormat::WebP, "invalid encoder configuration"))?;
    config.quality = quality;
    config.method = WEBP_METHOD;

    let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
    let webp_data = encoder
        .encode_advanced(&config)
        .map_err(|e| encode_failed(OutputFormat::WebP, format!("{:?}", e)))?;

    Ok(Bytes::copy_from_slice(&webp_data))
}

/// Single-frame GIF quantized to a 256-colour palette.
fn encode_gif(img: &DynamicImage) -> Result<Bytes, TranscodeError> {
    check_dimensions(img, GIF_MAX_DIMENSION, OutputFormat::Gif)?;
    let rgba_img = img.to_rgba8();
    let (width, height) = rgba_img.dimensions();

    let mut buffer = Vec::new();
    {
        let mut encoder = GifEncoder::new_with_speed(&mut buffer, GIF_QUANTIZER_SPEED);
        encoder
            .encode(rgba_img.as_raw(), width, height, ExtendedColorType::Rgba8)
            .map_err(|e| encode_failed(OutputFormat::Gif, e))?;
    }
    Ok(Bytes::from(buffer))
}
