//! Optical character recognition
//!
//! - `preprocess`: image cleanup before recognition
//! - `engine`: external tesseract invocation and output cleanup

pub mod engine;
pub mod preprocess;

pub use engine::OcrEngine;
pub use preprocess::ImagePreprocessor;
