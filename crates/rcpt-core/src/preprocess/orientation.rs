//! EXIF orientation handling.

use std::io::Cursor;

use image::DynamicImage;
use tracing::debug;

/// Read the EXIF orientation tag (1-8). Missing or unreadable metadata is 1.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

/// Rotate or mirror an image so it displays upright.
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    if orientation != 1 {
        debug!("Applying EXIF orientation {}", orientation);
    }
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
