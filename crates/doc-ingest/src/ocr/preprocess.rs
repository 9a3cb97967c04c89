//! Image cleanup applied before recognition

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::open;

use crate::error::{Error, Result};

/// Grayscale, 3×3 median denoise, Otsu binarization, 1×1 morphological opening
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Run the filter chain on an in-memory image
    pub fn preprocess(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let denoised = median_filter(&gray, 1, 1);
        let level = otsu_level(&denoised);
        let binary = threshold(&denoised, level, ThresholdType::Binary);
        // radius 0 is a 1×1 structuring element
        open(&binary, Norm::LInf, 0)
    }

    /// Load `input`, preprocess it and save a PNG into `dir`
    pub fn preprocess_file(&self, input: &Path, dir: &Path) -> Result<PathBuf> {
        let image = image::open(input)
            .map_err(|e| Error::external_tool("preprocess", format!("cannot decode image: {}", e)))?;
        let processed = self.preprocess(&image);

        let output = dir.join("preprocessed.png");
        processed
            .save(&output)
            .map_err(|e| Error::external_tool("preprocess", format!("cannot save image: {}", e)))?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn sample() -> DynamicImage {
        // Dark 8x8 square on a light background, with a few stray pixels
        let mut img = RgbImage::from_pixel(32, 32, Rgb([230, 230, 230]));
        for x in 12..20 {
            for y in 12..20 {
                img.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        img.put_pixel(2, 2, Rgb([0, 0, 0]));
        img.put_pixel(28, 5, Rgb([0, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_output_is_binary() {
        let out = ImagePreprocessor::new().preprocess(&sample());
        assert_eq!(out.dimensions(), (32, 32));
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_keeps_shapes_and_drops_specks() {
        let out = ImagePreprocessor::new().preprocess(&sample());
        assert_eq!(*out.get_pixel(15, 15), Luma([0]));
        assert_eq!(*out.get_pixel(2, 2), Luma([255]));
        assert_eq!(*out.get_pixel(28, 5), Luma([255]));
    }

    #[test]
    fn test_preprocess_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("scan.png");
        sample().save(&input).unwrap();

        let output = ImagePreprocessor::new()
            .preprocess_file(&input, dir.path())
            .unwrap();
        let reloaded = image::open(&output).unwrap();
        assert_eq!(reloaded.width(), 32);
    }

    #[test]
    fn test_undecodable_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.png");
        std::fs::write(&input, b"not an image").unwrap();

        let err = ImagePreprocessor::new()
            .preprocess_file(&input, dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool { .. }));
    }
}
