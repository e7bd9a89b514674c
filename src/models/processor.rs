use crate::image::NormalizedImage;
use crate::utils::error::OcrError;
use crate::Result;
use image::imageops::FilterType;
use ndarray::Array4;
use serde::Deserialize;
use std::path::Path;

/// `size` is either a square edge or an explicit height/width pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ImageSize {
    Square(u32),
    Dims { height: u32, width: u32 },
}

/// Subset of a Hugging Face `preprocessor_config.json` used by vision encoders.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_true")]
    do_resize: bool,
    #[serde(default = "default_size")]
    size: ImageSize,
    /// PIL resample id: 0 nearest, 1 lanczos, 2 bilinear, 3 bicubic.
    #[serde(default = "default_resample")]
    resample: u8,
    #[serde(default = "default_true")]
    do_rescale: bool,
    #[serde(default = "default_rescale_factor")]
    rescale_factor: f32,
    #[serde(default = "default_true")]
    do_normalize: bool,
    #[serde(default = "default_mean_std")]
    image_mean: Vec<f32>,
    #[serde(default = "default_mean_std")]
    image_std: Vec<f32>,
}

fn default_true() -> bool {
    true
}

fn default_size() -> ImageSize {
    ImageSize::Square(384)
}

fn default_resample() -> u8 {
    2
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_mean_std() -> Vec<f32> {
    vec![0.5, 0.5, 0.5]
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: default_size(),
            resample: default_resample(),
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: default_mean_std(),
            image_std: default_mean_std(),
        }
    }
}

/// Turns a normalized image into the `[1, 3, H, W]` pixel tensor the encoder consumes.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    height: u32,
    width: u32,
    do_resize: bool,
    filter: FilterType,
    scale: f32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ImageProcessor {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OcrError::ModelLoad(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ProcessorConfig = serde_json::from_str(&content).map_err(|e| {
            OcrError::ModelLoad(format!("Malformed {}: {}", path.display(), e))
        })?;
        Self::from_config(config)
    }

    pub fn from_config(config: ProcessorConfig) -> Result<Self> {
        let (height, width) = match config.size {
            ImageSize::Square(edge) => (edge, edge),
            ImageSize::Dims { height, width } => (height, width),
        };
        if height == 0 || width == 0 {
            return Err(OcrError::ModelLoad(format!(
                "Invalid processor input size {}x{}", width, height
            )));
        }

        let mean = expand_channels(&config.image_mean, "image_mean")?;
        let std = expand_channels(&config.image_std, "image_std")?;
        if std.iter().any(|s| *s == 0.0) {
            return Err(OcrError::ModelLoad("image_std must be non-zero".to_string()));
        }

        let filter = match config.resample {
            0 => FilterType::Nearest,
            1 => FilterType::Lanczos3,
            3 => FilterType::CatmullRom,
            _ => FilterType::Triangle,
        };

        Ok(Self {
            height,
            width,
            do_resize: config.do_resize,
            filter,
            scale: if config.do_rescale { config.rescale_factor } else { 1.0 },
            mean: if config.do_normalize { mean } else { [0.0; 3] },
            std: if config.do_normalize { std } else { [1.0; 3] },
        })
    }

    /// Target `(height, width)` of the encoder input.
    pub fn input_size(&self) -> (u32, u32) {
        (self.height, self.width)
    }

    /// Build the NCHW pixel tensor. Single-channel input is replicated across RGB.
    pub fn extract(&self, image: &NormalizedImage) -> Result<Array4<f32>> {
        let source = image.image();
        let rgb = if self.do_resize {
            source.resize_exact(self.width, self.height, self.filter).to_rgb8()
        } else {
            source.to_rgb8()
        };

        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::Inference("Empty image after resize".to_string()));
        }

        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel[c] as f32 * self.scale;
                tensor[[0, c, y as usize, x as usize]] = (value - self.mean[c]) / self.std[c];
            }
        }

        Ok(tensor)
    }
}

fn expand_channels(values: &[f32], name: &str) -> Result<[f32; 3]> {
    match values {
        [v] => Ok([*v; 3]),
        [r, g, b] => Ok([*r, *g, *b]),
        _ => Err(OcrError::ModelLoad(format!(
            "{} must have 1 or 3 entries, got {}", name, values.len()
        ))),
    }
}
