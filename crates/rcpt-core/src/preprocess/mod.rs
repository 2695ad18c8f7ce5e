//! Image normalization and OCR variant generation.
//!
//! A decoded photo is turned upright (EXIF), converted to grayscale, bounded
//! in size and trimmed of its margins. Several independent recipes then
//! render variants that favor different lighting and print conditions; the
//! OCR arbiter tries them all and keeps the best reading.

pub mod filters;
pub mod orientation;
pub mod perspective;
mod variant;

pub use variant::{ImageVariant, VariantKind, VariantSet};

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use imageproc::contrast::equalize_histogram;
use imageproc::distance_transform::Norm;
use imageproc::filter::{bilateral_filter, gaussian_blur_f32, median_filter};
use imageproc::morphology::close;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::models::config::{PreprocessConfig, ScanMode};

use filters::{
    adaptive_threshold_gaussian, adaptive_threshold_mean, brighten, clahe, gamma,
    intensity_stats, unsharp,
};

/// Builds OCR variants from receipt photos.
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Create a new preprocessor with default settings.
    pub fn new() -> Self {
        Self::with_config(PreprocessConfig::default())
    }

    pub fn with_config(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Decode image bytes and apply EXIF orientation.
    pub fn load(&self, bytes: &[u8]) -> Result<DynamicImage, ScanError> {
        if bytes.is_empty() {
            return Err(ScanError::UnreadableImage("empty input".to_string()));
        }
        let image = image::load_from_memory(bytes)
            .map_err(|e| ScanError::UnreadableImage(e.to_string()))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(ScanError::UnreadableImage("zero-sized image".to_string()));
        }
        Ok(orientation::apply_orientation(
            image,
            orientation::read_exif_orientation(bytes),
        ))
    }

    /// Render the variants for `mode`, in generation order.
    pub fn produce_variants(&self, image: &DynamicImage, mode: ScanMode) -> VariantSet {
        let gray = self.bounded_gray(image);

        let unwarped = if self.config.detect_perspective {
            perspective::find_receipt_quad(&gray, self.config.min_quad_area_ratio)
                .and_then(|corners| perspective::unwarp(&gray, corners))
        } else {
            None
        };

        let cropped = self.crop_margins(&gray);

        let mut kinds = match mode {
            ScanMode::Full => vec![
                VariantKind::Standard,
                VariantKind::HighContrast,
                VariantKind::Denoised,
                VariantKind::Sharpened,
                VariantKind::Adaptive,
            ],
            ScanMode::Fast => vec![VariantKind::Standard, VariantKind::Adaptive],
        };
        if unwarped.is_some() {
            match mode {
                ScanMode::Full => kinds.push(VariantKind::Perspective),
                ScanMode::Fast => {
                    kinds.push(VariantKind::PerspectiveStandard);
                    kinds.push(VariantKind::PerspectiveAdaptive);
                }
            }
        }

        let variants: VariantSet = kinds
            .par_iter()
            .filter_map(|kind| {
                let rendered = match kind {
                    VariantKind::Standard => self.standard(&cropped),
                    VariantKind::HighContrast => high_contrast(&cropped),
                    VariantKind::Denoised => denoised(&cropped),
                    VariantKind::Sharpened => sharpened(&cropped),
                    VariantKind::Adaptive => adaptive(&cropped),
                    VariantKind::Perspective => unwarped.clone()?,
                    VariantKind::PerspectiveStandard => self.standard(unwarped.as_ref()?),
                    VariantKind::PerspectiveAdaptive => adaptive(unwarped.as_ref()?),
                };
                Some(ImageVariant::new(*kind, rendered))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect();

        info!(
            "Produced {} variants ({:?} mode): {:?}",
            variants.len(),
            mode,
            variants.kinds()
        );
        variants
    }

    /// Grayscale, scaled down so neither side exceeds `max_dimension`.
    fn bounded_gray(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let (width, height) = gray.dimensions();
        let max_dim = width.max(height);

        if max_dim <= self.config.max_dimension {
            return gray;
        }

        let (new_width, new_height) = scaled(width, height, self.config.max_dimension as f32 / max_dim as f32);
        debug!("Bounding {}x{} to {}x{}", width, height, new_width, new_height);
        imageops::resize(&gray, new_width, new_height, FilterType::Lanczos3)
    }

    /// Drop the configured border fractions, unless that leaves too little.
    fn crop_margins(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let cfg = &self.config;

        let left = (width as f32 * cfg.crop_left) as u32;
        let right = (width as f32 * cfg.crop_right) as u32;
        let top = (height as f32 * cfg.crop_top) as u32;
        let bottom = (height as f32 * cfg.crop_bottom) as u32;

        let crop_width = width.saturating_sub(left + right);
        let crop_height = height.saturating_sub(top + bottom);

        if crop_width < cfg.min_crop_dimension || crop_height < cfg.min_crop_dimension {
            warn!(
                "Crop of {}x{} image would leave {}x{}, keeping it uncropped",
                width, height, crop_width, crop_height
            );
            return gray.clone();
        }

        imageops::crop_imm(gray, left, top, crop_width, crop_height).to_image()
    }

    /// CLAHE, edge-preserving smoothing, gaussian threshold, small close.
    fn standard(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let resized = if width > self.config.standard_width {
            let (w, h) = scaled(width, height, self.config.standard_width as f32 / width as f32);
            imageops::resize(gray, w, h, FilterType::Lanczos3)
        } else {
            gray.clone()
        };

        let equalized = clahe(&resized, 3.0, 8);
        let smoothed = bilateral_filter(&equalized, 9, 75.0, 75.0);
        let binary = adaptive_threshold_gaussian(&smoothed, 11, 2);
        close(&binary, Norm::LInf, 1)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Global equalization, gamma lift, mean threshold.
fn high_contrast(gray: &GrayImage) -> GrayImage {
    let equalized = equalize_histogram(gray);
    let lifted = gamma(&equalized, 1.5);
    adaptive_threshold_mean(&lifted, 15, 8)
}

/// Median then gaussian smoothing for speckled prints.
fn denoised(gray: &GrayImage) -> GrayImage {
    let smoothed = median_filter(gray, 2, 2);
    let blurred = gaussian_blur_f32(&smoothed, 1.0);
    adaptive_threshold_gaussian(&blurred, 9, 2)
}

/// Unsharp mask for faint or blurry text.
fn sharpened(gray: &GrayImage) -> GrayImage {
    let sharp = unsharp(gray, 2.0);
    let equalized = clahe(&sharp, 2.0, 8);
    adaptive_threshold_gaussian(&equalized, 11, 2)
}

/// Contrast treatment chosen from the image's own brightness statistics.
fn adaptive(gray: &GrayImage) -> GrayImage {
    let (mean, std_dev) = intensity_stats(gray);

    let equalized = if mean < 100.0 {
        debug!("Dark image (mean {:.1}), brightening", mean);
        clahe(&brighten(gray, 1.5, 30.0), 4.0, 8)
    } else if std_dev < 30.0 {
        debug!("Flat image (stddev {:.1}), strong CLAHE", std_dev);
        clahe(gray, 5.0, 8)
    } else {
        clahe(gray, 2.0, 8)
    };

    adaptive_threshold_gaussian(&equalized, 11, 2)
}

fn scaled(width: u32, height: u32, scale: f32) -> (u32, u32) {
    (
        ((width as f32 * scale) as u32).max(1),
        ((height as f32 * scale) as u32).max(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Luma};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn receipt_like(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            if y % 12 < 3 && x % 9 < 6 { Luma([30]) } else { Luma([220]) }
        }))
    }

    #[test]
    fn test_full_mode_variants_in_order() {
        let set = ImagePreprocessor::new().produce_variants(&receipt_like(120, 160), ScanMode::Full);
        assert_eq!(
            set.kinds(),
            vec![
                VariantKind::Standard,
                VariantKind::HighContrast,
                VariantKind::Denoised,
                VariantKind::Sharpened,
                VariantKind::Adaptive,
            ]
        );
    }

    #[test]
    fn test_fast_mode_variants() {
        let set = ImagePreprocessor::new().produce_variants(&receipt_like(120, 160), ScanMode::Fast);
        assert_eq!(set.kinds(), vec![VariantKind::Standard, VariantKind::Adaptive]);
    }

    #[test]
    fn test_large_image_bounded() {
        let config = PreprocessConfig {
            max_dimension: 100,
            ..PreprocessConfig::default()
        };
        let gray = ImagePreprocessor::with_config(config).bounded_gray(&receipt_like(400, 200));
        assert_eq!(gray.dimensions(), (100, 50));
    }

    #[test]
    fn test_crop_margins() {
        let pre = ImagePreprocessor::new();
        let gray = receipt_like(200, 400).to_luma8();
        assert_eq!(pre.crop_margins(&gray).dimensions(), (160, 360));

        let tiny = receipt_like(20, 20).to_luma8();
        assert_eq!(pre.crop_margins(&tiny).dimensions(), (20, 20));
    }

    #[test]
    fn test_standard_width_limit() {
        let config = PreprocessConfig {
            standard_width: 50,
            ..PreprocessConfig::default()
        };
        let out = ImagePreprocessor::with_config(config).standard(&receipt_like(100, 80).to_luma8());
        assert_eq!(out.dimensions(), (50, 40));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let pre = ImagePreprocessor::new();
        assert!(matches!(pre.load(b""), Err(ScanError::UnreadableImage(_))));
        assert!(matches!(pre.load(b"definitely not a jpeg"), Err(ScanError::UnreadableImage(_))));
    }

    #[test]
    fn test_load_png() {
        let mut bytes = Vec::new();
        receipt_like(30, 40)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let image = ImagePreprocessor::new().load(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (30, 40));
    }
}
