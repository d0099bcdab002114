//! Test fixtures: generated images and multipart forms.

use axum_test::multipart::{MultipartForm, Part};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// A PNG with a colour gradient, so every encoder has real work to do.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode test PNG");
    buf.into_inner()
}

/// A single-colour PNG; large dimensions stay well under the upload limit.
pub fn create_solid_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("Failed to encode test PNG");
    buf.into_inner()
}

/// Bytes that start like a PNG but stop before any image data.
pub fn create_truncated_png() -> Vec<u8> {
    let mut png = create_test_png(32, 32);
    png.truncate(40);
    png
}

pub fn file_part(data: Vec<u8>, file_name: &str) -> Part {
    Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_type("application/octet-stream")
}

/// `format` first, then `file`.
pub fn convert_form(data: Vec<u8>, format: &str) -> MultipartForm {
    MultipartForm::new()
        .add_text("format", format.to_string())
        .add_part("file", file_part(data, "input.png"))
}

/// A conversion request that belongs to a batch.
pub fn batch_form(data: Vec<u8>, format: &str, batch_size: i64, session_id: Option<&str>) -> MultipartForm {
    let form = convert_form(data, format).add_text("batch_size", batch_size.to_string());
    match session_id {
        Some(id) => form.add_text("session_id", id.to_string()),
        None => form,
    }
}
