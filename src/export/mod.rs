pub mod accumulator;
pub mod workbook;

pub use accumulator::{ExportAccumulator, ExportConfig};
