//! HEIC decode and Exif access
//!
//! Backed by libheif-rs when built with the `heic` feature. Without it, HEIC
//! files fail to decode per file and carry no metadata.

use image::DynamicImage;
use std::path::Path;

use shared_utils::metadata::jpeg::EXIF_HEADER;
use shared_utils::Result;

/// Strip the HEIF Exif item framing down to the TIFF payload.
///
/// The item starts with a 4-byte big-endian offset to the TIFF header; some
/// writers also put `Exif\0\0` in front of it.
pub fn tiff_from_heif_exif(block: &[u8]) -> Option<&[u8]> {
    let offset_bytes: [u8; 4] = block.get(..4)?.try_into().ok()?;
    let offset = u32::from_be_bytes(offset_bytes) as usize;
    let mut tiff = block.get(4usize.checked_add(offset)?..)?;
    if tiff.starts_with(EXIF_HEADER) {
        tiff = &tiff[EXIF_HEADER.len()..];
    }
    if tiff.starts_with(b"II") || tiff.starts_with(b"MM") {
        Some(tiff)
    } else {
        None
    }
}

#[cfg(feature = "heic")]
mod backend {
    use image::{DynamicImage, RgbImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};
    use std::path::Path;

    use shared_utils::{AppError, Result};

    const BYTES_PER_PIXEL: usize = 3;

    pub fn decode(data: &[u8], path: &Path) -> Result<DynamicImage> {
        let lib_heif = LibHeif::new();
        let ctx = HeifContext::read_from_bytes(data)
            .map_err(|e| AppError::decode(path, format!("failed to read HEIC: {}", e)))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| AppError::decode(path, format!("failed to get primary image: {}", e)))?;

        let decoded = lib_heif
            .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
            .map_err(|e| AppError::decode(path, format!("failed to decode HEIC: {}", e)))?;
        let planes = decoded.planes();
        let plane = planes
            .interleaved
            .ok_or_else(|| AppError::decode(path, "no interleaved RGB plane"))?;

        // rows may be padded past width * 3
        let row_len = plane.width as usize * BYTES_PER_PIXEL;
        let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
        for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
            let row = row
                .get(..row_len)
                .ok_or_else(|| AppError::decode(path, "HEIC row shorter than image width"))?;
            pixels.extend_from_slice(row);
        }

        RgbImage::from_raw(plane.width, plane.height, pixels)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| AppError::decode(path, "HEIC plane does not match its dimensions"))
    }

    pub fn extract_exif(data: &[u8]) -> std::result::Result<Option<Vec<u8>>, String> {
        let ctx = HeifContext::read_from_bytes(data).map_err(|e| format!("failed to read HEIC: {}", e))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| format!("failed to get primary image: {}", e))?;
        let Some(id) = handle.metadata_block_ids(b"Exif").first().copied() else {
            return Ok(None);
        };
        let block = handle
            .metadata(id)
            .map_err(|e| format!("failed to read Exif block: {}", e))?;
        Ok(super::tiff_from_heif_exif(&block).map(<[u8]>::to_vec))
    }
}

#[cfg(not(feature = "heic"))]
mod backend {
    use image::DynamicImage;
    use std::path::Path;

    use shared_utils::{AppError, Result};

    pub fn decode(_data: &[u8], path: &Path) -> Result<DynamicImage> {
        Err(AppError::decode(
            path,
            "HEIC support not compiled in (rebuild with --features heic)",
        ))
    }

    pub fn extract_exif(_data: &[u8]) -> std::result::Result<Option<Vec<u8>>, String> {
        Ok(None)
    }
}

pub fn decode(data: &[u8], path: &Path) -> Result<DynamicImage> {
    backend::decode(data, path)
}

/// TIFF payload of the primary image's Exif item, if any.
pub fn extract_exif(data: &[u8]) -> std::result::Result<Option<Vec<u8>>, String> {
    backend::extract_exif(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiff_after_offset() {
        let mut block = vec![0, 0, 0, 0];
        block.extend_from_slice(b"MM\0*rest");
        assert_eq!(tiff_from_heif_exif(&block), Some(&b"MM\0*rest"[..]));
    }

    #[test]
    fn test_tiff_after_exif_header_and_offset() {
        let mut block = vec![0, 0, 0, 6];
        block.extend_from_slice(b"Exif\0\0");
        block.extend_from_slice(b"Exif\0\0II*\0");
        assert_eq!(tiff_from_heif_exif(&block), Some(&b"II*\0"[..]));
    }

    #[test]
    fn test_malformed_blocks() {
        assert_eq!(tiff_from_heif_exif(&[0, 0]), None);
        assert_eq!(tiff_from_heif_exif(&[0, 0, 0, 200, b'I', b'I']), None);
        assert_eq!(tiff_from_heif_exif(&[0xFF, 0xFF, 0xFF, 0xFF, b'I']), None);
        assert_eq!(tiff_from_heif_exif(&[0, 0, 0, 0, b'X', b'X']), None);
    }

    #[cfg(not(feature = "heic"))]
    #[test]
    fn test_decode_without_feature_is_a_decode_error() {
        let err = decode(b"whatever", Path::new("a.heic")).unwrap_err();
        assert!(matches!(err, shared_utils::AppError::Decode { .. }));
        assert_eq!(extract_exif(b"whatever").unwrap(), None);
    }
}
