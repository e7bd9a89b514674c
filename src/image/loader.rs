use crate::utils::error::OcrError;
use crate::Result;
use image::{DynamicImage, ImageFormat};

pub struct ImageLoader;

impl ImageLoader {
    /// Decode raw upload bytes, refusing anything above `max_bytes` before decoding.
    pub fn from_bytes(bytes: &[u8], max_bytes: usize) -> Result<DynamicImage> {
        if bytes.len() > max_bytes {
            return Err(OcrError::UploadTooLarge {
                size: Some(bytes.len()),
                limit: max_bytes,
            });
        }

        if bytes.is_empty() {
            return Err(OcrError::InvalidImageFormat("empty upload".to_string()));
        }

        let format = Self::detect_format(bytes).ok_or_else(|| {
            OcrError::InvalidImageFormat("unrecognized image encoding".to_string())
        })?;

        if !Self::is_supported_format(format) {
            return Err(OcrError::InvalidImageFormat(format!(
                "unsupported image format {:?}",
                format
            )));
        }

        let image = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| OcrError::InvalidImageFormat(e.to_string()))?;

        tracing::debug!(
            "Decoded {:?} image: {}x{}",
            format,
            image.width(),
            image.height()
        );

        Ok(image)
    }

    /// Sniff the container format from magic bytes.
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// Formats accepted for uploads.
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Gif
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decodes_png() {
        let image = ImageLoader::from_bytes(&png_bytes(12, 7), 1024 * 1024).unwrap();
        assert_eq!((image.width(), image.height()), (12, 7));
    }

    #[test]
    fn test_oversized_upload_rejected_before_decode() {
        let ceiling = 64;
        // Garbage bytes: a decode attempt would yield InvalidImageFormat instead.
        let blob = vec![0xAB; ceiling + 1];
        let err = ImageLoader::from_bytes(&blob, ceiling).unwrap_err();
        assert!(matches!(
            err,
            OcrError::UploadTooLarge { size: Some(65), limit: 64 }
        ));
    }

    #[test]
    fn test_upload_at_ceiling_is_decoded() {
        let bytes = png_bytes(4, 4);
        assert!(ImageLoader::from_bytes(&bytes, bytes.len()).is_ok());
    }

    #[test]
    fn test_garbage_bytes_are_invalid_format() {
        let err = ImageLoader::from_bytes(b"definitely not an image", 1024).unwrap_err();
        assert!(matches!(err, OcrError::InvalidImageFormat(_)));
    }

    #[test]
    fn test_truncated_png_is_invalid_format() {
        let bytes = png_bytes(32, 32);
        let err = ImageLoader::from_bytes(&bytes[..bytes.len() / 2], 1024 * 1024).unwrap_err();
        assert!(matches!(err, OcrError::InvalidImageFormat(_)));
    }
}
