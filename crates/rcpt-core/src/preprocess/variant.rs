//! Preprocessed image variants.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RcptError, Result};

/// Name of a preprocessing recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    Standard,
    HighContrast,
    Denoised,
    Sharpened,
    Adaptive,
    Perspective,
    PerspectiveStandard,
    PerspectiveAdaptive,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Standard => "standard",
            VariantKind::HighContrast => "high_contrast",
            VariantKind::Denoised => "denoised",
            VariantKind::Sharpened => "sharpened",
            VariantKind::Adaptive => "adaptive",
            VariantKind::Perspective => "perspective",
            VariantKind::PerspectiveStandard => "perspective_standard",
            VariantKind::PerspectiveAdaptive => "perspective_adaptive",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One preprocessed grayscale rendition of the input.
///
/// The pixel buffer is shared so attempts on several threads can hold the
/// same variant without copying it.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub image: Arc<GrayImage>,
}

impl ImageVariant {
    pub fn new(kind: VariantKind, image: GrayImage) -> Self {
        Self {
            kind,
            image: Arc::new(image),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// Variants in generation order.
#[derive(Debug, Clone, Default)]
pub struct VariantSet {
    variants: Vec<ImageVariant>,
}

impl VariantSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variant, replacing any earlier one of the same kind in place.
    pub fn push(&mut self, variant: ImageVariant) {
        match self.variants.iter_mut().find(|v| v.kind == variant.kind) {
            Some(existing) => *existing = variant,
            None => self.variants.push(variant),
        }
    }

    pub fn get(&self, kind: VariantKind) -> Option<&ImageVariant> {
        self.variants.iter().find(|v| v.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageVariant> {
        self.variants.iter()
    }

    pub fn kinds(&self) -> Vec<VariantKind> {
        self.variants.iter().map(|v| v.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Write each variant to `<dir>/<name>.png`.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for variant in &self.variants {
            let path = dir.join(format!("{}.png", variant.name()));
            variant.image.save(&path).map_err(RcptError::Image)?;
            debug!("Saved variant {}", path.display());
        }
        Ok(())
    }
}

impl FromIterator<ImageVariant> for VariantSet {
    fn from_iter<I: IntoIterator<Item = ImageVariant>>(iter: I) -> Self {
        let mut set = VariantSet::new();
        for variant in iter {
            set.push(variant);
        }
        set
    }
}
