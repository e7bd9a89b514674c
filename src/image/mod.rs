pub mod loader;
pub mod normalizer;

pub use loader::ImageLoader;
pub use normalizer::{ColorMode, ImageNormalizer, NormalizeOptions, NormalizedImage, ResizeOrder};
