use crate::encode;
use crate::error::TranscodeError;
use crate::orientation::apply_exif_orientation;
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader, Limits};
use imgshift_core::OutputFormat;
use std::io::Cursor;

/// Images wider than this are downscaled to it.
pub const MAX_OUTPUT_WIDTH: u32 = 4000;

/// Decoder limits for untrusted input.
const MAX_DECODE_DIMENSION: u32 = 16384;
const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

/// Output of a successful transcode.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub data: Bytes,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Re-encodes image bytes into a target format.
///
/// Implementations are synchronous and CPU-bound; run them through
/// [`run_transcode`](crate::run_transcode) from async code.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, source: &[u8], format: OutputFormat) -> Result<Transcoded, TranscodeError>;
}

/// Transcoder built on the `image` crate: decode, orient, downscale, encode.
#[derive(Debug, Clone)]
pub struct ImageTranscoder {
    max_width: u32,
}

impl ImageTranscoder {
    pub fn new() -> Self {
        Self {
            max_width: MAX_OUTPUT_WIDTH,
        }
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    fn decode(&self, source: &[u8]) -> Result<DynamicImage, TranscodeError> {
        let mut reader = ImageReader::new(Cursor::new(source))
            .with_guessed_format()
            .map_err(|e| TranscodeError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(TranscodeError::UnrecognizedInput);
        }

        let mut limits = Limits::default();
        limits.max_image_width = Some(MAX_DECODE_DIMENSION);
        limits.max_image_height = Some(MAX_DECODE_DIMENSION);
        limits.max_alloc = Some(MAX_DECODE_ALLOC);
        reader.limits(limits);

        reader
            .decode()
            .map_err(|e| TranscodeError::Decode(e.to_string()))
    }

    /// Downscale to `max_width` preserving aspect ratio; never enlarges.
    fn fit_width(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = img.dimensions();
        if width <= self.max_width {
            return img;
        }
        tracing::debug!(
            from_width = width,
            from_height = height,
            to_width = self.max_width,
            "Downscaling image"
        );
        img.resize(self.max_width, height, FilterType::Lanczos3)
    }
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder for ImageTranscoder {
    fn transcode(&self, source: &[u8], format: OutputFormat) -> Result<Transcoded, TranscodeError> {
        let start = std::time::Instant::now();

        let img = self.decode(source)?;
        let img = apply_exif_orientation(img, source);
        let img = self.fit_width(img);
        let (width, height) = img.dimensions();
        let data = encode::encode(&img, format)?;

        tracing::info!(
            format = %format,
            width = width,
            height = height,
            input_bytes = source.len(),
            output_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image transcoded"
        );

        Ok(Transcoded {
            data,
            format,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orientation::tests::jpeg_with_orientation;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 251) as u8, (y % 241) as u8, 90, 255])
        }));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_converts_to_every_format() {
        let source = png(120, 80);
        let transcoder = ImageTranscoder::new();
        for (format, expected) in [
            (OutputFormat::Png, ImageFormat::Png),
            (OutputFormat::Jpeg, ImageFormat::Jpeg),
            (OutputFormat::WebP, ImageFormat::WebP),
            (OutputFormat::Gif, ImageFormat::Gif),
        ] {
            let out = transcoder.transcode(&source, format).unwrap();
            assert_eq!(out.format, format);
            assert_eq!((out.width, out.height), (120, 80));
            assert_eq!(image::guess_format(&out.data).unwrap(), expected);
        }
    }

    #[test]
    fn test_wide_images_are_downscaled() {
        let source = png(5000, 3000);
        let out = ImageTranscoder::new()
            .transcode(&source, OutputFormat::Png)
            .unwrap();
        assert_eq!((out.width, out.height), (4000, 2400));
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!(decoded.dimensions(), (4000, 2400));
    }

    #[test]
    fn test_small_images_are_not_enlarged() {
        let source = png(300, 900);
        let out = ImageTranscoder::new()
            .transcode(&source, OutputFormat::WebP)
            .unwrap();
        assert_eq!((out.width, out.height), (300, 900));
    }

    #[test]
    fn test_exactly_max_width_is_untouched() {
        let source = png(4000, 10);
        let out = ImageTranscoder::new()
            .transcode(&source, OutputFormat::Png)
            .unwrap();
        assert_eq!((out.width, out.height), (4000, 10));
    }

    #[test]
    fn test_orientation_is_normalized_before_encoding() {
        let source = jpeg_with_orientation(60, 20, 6);
        let out = ImageTranscoder::new()
            .transcode(&source, OutputFormat::Png)
            .unwrap();
        assert_eq!((out.width, out.height), (20, 60));
    }

    #[test]
    fn test_output_carries_no_exif() {
        let source = jpeg_with_orientation(60, 20, 6);
        let out = ImageTranscoder::new()
            .transcode(&source, OutputFormat::Jpeg)
            .unwrap();
        assert_eq!(crate::orientation::read_exif_orientation(&out.data), 1);
        assert!(!out.data.windows(6).any(|w| w == b"Exif\0\0"));
    }

    #[test]
    fn test_garbage_input_is_rejected() {
        let err = ImageTranscoder::new()
            .transcode(b"definitely not an image", OutputFormat::Png)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::UnrecognizedInput));
    }

    #[test]
    fn test_truncated_input_is_rejected() {
        let mut source = png(64, 64);
        source.truncate(source.len() / 2);
        let err = ImageTranscoder::new()
            .transcode(&source, OutputFormat::WebP)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Decode(_)));
    }

    #[test]
    fn test_same_input_same_output() {
        let source = png(200, 150);
        let transcoder = ImageTranscoder::new();
        for format in [OutputFormat::Png, OutputFormat::Jpeg, OutputFormat::WebP, OutputFormat::Gif] {
            let a = transcoder.transcode(&source, format).unwrap();
            let b = transcoder.transcode(&source, format).unwrap();
            assert_eq!(a.data, b.data, "{}", format);
        }
    }
}
