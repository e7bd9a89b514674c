use crate::image::ImageLoader;
use crate::Result;
use image::imageops::FilterType;
use image::DynamicImage;
use serde::Serialize;

/// Pixel layout handed to the feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Rgb,
    /// Single-channel grayscale for the small-input setup.
    Luma,
}

/// Whether the bounded downscale happens before or after color conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeOrder {
    #[default]
    ResizeThenConvert,
    ConvertThenResize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeOptions {
    /// Upper bound for either side, in pixels.
    pub max_side: u32,
    pub color_mode: ColorMode,
    pub resize_order: ResizeOrder,
    /// Byte ceiling checked before any decode.
    pub max_bytes: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_side: 1000,
            color_mode: ColorMode::Rgb,
            resize_order: ResizeOrder::ResizeThenConvert,
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// A decoded, color-fixed, size-bounded image ready for feature extraction.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    image: DynamicImage,
    color_mode: ColorMode,
}

impl NormalizedImage {
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    options: NormalizeOptions,
}

impl ImageNormalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// Decode raw upload bytes and bring them into canonical form.
    pub fn normalize(&self, raw_bytes: &[u8]) -> Result<NormalizedImage> {
        let decoded = ImageLoader::from_bytes(raw_bytes, self.options.max_bytes)?;
        Ok(self.normalize_image(decoded))
    }

    /// Apply color conversion and bounded downscale to an already decoded image.
    pub fn normalize_image(&self, image: DynamicImage) -> NormalizedImage {
        let image = match self.options.resize_order {
            ResizeOrder::ResizeThenConvert => self.convert(self.bound(image)),
            ResizeOrder::ConvertThenResize => self.bound(self.convert(image)),
        };

        NormalizedImage {
            image,
            color_mode: self.options.color_mode,
        }
    }

    fn convert(&self, image: DynamicImage) -> DynamicImage {
        match self.options.color_mode {
            ColorMode::Rgb => DynamicImage::ImageRgb8(image.into_rgb8()),
            ColorMode::Luma => DynamicImage::ImageLuma8(image.into_luma8()),
        }
    }

    /// Shrink so neither side exceeds `max_side`, keeping aspect ratio. Never upscales.
    fn bound(&self, image: DynamicImage) -> DynamicImage {
        let max_side = self.options.max_side;
        let (width, height) = (image.width(), image.height());
        if width <= max_side && height <= max_side {
            return image;
        }

        let resized = image.resize(max_side, max_side, FilterType::Lanczos3);
        tracing::debug!(
            "Downscaled image {}x{} -> {}x{}",
            width,
            height,
            resized.width(),
            resized.height()
        );
        resized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::OcrError;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 100, 50])))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn normalizer(max_side: u32, color_mode: ColorMode, resize_order: ResizeOrder) -> ImageNormalizer {
        ImageNormalizer::new(NormalizeOptions {
            max_side,
            color_mode,
            resize_order,
            ..NormalizeOptions::default()
        })
    }

    #[test]
    fn test_downscales_preserving_aspect_ratio() {
        let n = normalizer(384, ColorMode::Rgb, ResizeOrder::ResizeThenConvert);
        let image = n.normalize(&png_bytes(1200, 600)).unwrap();
        assert_eq!(image.dimensions(), (384, 192));
    }

    #[test]
    fn test_tall_image_bounded_by_height() {
        let n = normalizer(512, ColorMode::Rgb, ResizeOrder::ConvertThenResize);
        let image = n.normalize(&png_bytes(300, 1024)).unwrap();
        assert_eq!(image.dimensions().1, 512);
        assert!(image.dimensions().0 <= 512);
    }

    #[test]
    fn test_never_upscales() {
        let n = normalizer(1000, ColorMode::Rgb, ResizeOrder::ResizeThenConvert);
        let image = n.normalize(&png_bytes(40, 20)).unwrap();
        assert_eq!(image.dimensions(), (40, 20));
    }

    #[test]
    fn test_luma_mode_yields_single_channel() {
        for order in [ResizeOrder::ResizeThenConvert, ResizeOrder::ConvertThenResize] {
            let n = normalizer(64, ColorMode::Luma, order);
            let image = n.normalize(&png_bytes(128, 32)).unwrap();
            assert_eq!(image.color_mode(), ColorMode::Luma);
            assert!(matches!(image.image(), DynamicImage::ImageLuma8(_)));
            assert_eq!(image.dimensions(), (64, 16));
        }
    }

    #[test]
    fn test_rgb_mode_drops_alpha() {
        let n = normalizer(1000, ColorMode::Rgb, ResizeOrder::ResizeThenConvert);
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::new(8, 8));
        assert!(matches!(n.normalize_image(rgba).image(), DynamicImage::ImageRgb8(_)));
    }

    #[test]
    fn test_undecodable_bytes() {
        let n = ImageNormalizer::new(NormalizeOptions::default());
        assert!(matches!(
            n.normalize(b"GIF89a-but-not-really"),
            Err(OcrError::InvalidImageFormat(_))
        ));
    }
}
