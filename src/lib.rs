pub mod config;
pub mod export;
pub mod image;
pub mod models;
pub mod ocr;
pub mod utils;
pub mod web;

pub use config::Config;
pub use ocr::RecognitionResult;
pub use utils::error::OcrError;

pub type Result<T> = std::result::Result<T, OcrError>;
