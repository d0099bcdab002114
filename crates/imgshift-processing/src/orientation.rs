use image::{imageops, DynamicImage};
use std::io::Cursor;

/// Rotation and flips that bring an image stored with EXIF `orientation` upright.
///
/// Returns (clockwise rotation, flip horizontal, flip vertical); the rotation is
/// applied first.
pub fn orientation_transforms(orientation: u32) -> (Option<u16>, bool, bool) {
    match orientation {
        2 => (None, true, false),
        3 => (Some(180), false, false),
        4 => (None, false, true),
        5 => (Some(90), true, false),
        6 => (Some(90), false, false),
        7 => (Some(270), true, false),
        8 => (Some(270), false, false),
        _ => (None, false, false),
    }
}

/// Read the EXIF orientation tag, defaulting to 1 (upright) when absent or unreadable.
pub fn read_exif_orientation(data: &[u8]) -> u32 {
    let reader = exif::Reader::new();
    let Ok(exif) = reader.read_from_container(&mut Cursor::new(data)) else {
        return 1;
    };
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .filter(|value| (1..=8).contains(value))
        .unwrap_or(1)
}

/// Apply the EXIF orientation found in `data` to its decoded image.
pub fn apply_exif_orientation(img: DynamicImage, data: &[u8]) -> DynamicImage {
    let orientation = read_exif_orientation(data);
    if orientation == 1 {
        return img;
    }
    let (rotate, flip_h, flip_v) = orientation_transforms(orientation);

    tracing::debug!(
        orientation = orientation,
        rotate = ?rotate,
        flip_horizontal = flip_h,
        flip_vertical = flip_v,
        "Applying EXIF orientation"
    );

    let mut img = match rotate {
        Some(90) => DynamicImage::ImageRgba8(imageops::rotate90(&img.to_rgba8())),
        Some(180) => DynamicImage::ImageRgba8(imageops::rotate180(&img.to_rgba8())),
        Some(270) => DynamicImage::ImageRgba8(imageops::rotate270(&img.to_rgba8())),
        _ => img,
    };
    if flip_h {
        img = DynamicImage::ImageRgba8(imageops::flip_horizontal(&img.to_rgba8()));
    }
    if flip_v {
        img = DynamicImage::ImageRgba8(imageops::flip_vertical(&img.to_rgba8()));
    }
    img
}
