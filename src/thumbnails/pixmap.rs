//! Shared, immutable RGBA bitmaps and aspect-preserving rescaling.

use std::fmt;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Largest size with this aspect ratio that fits in `bound` x `bound`.
    ///
    /// Scales up as well as down. `None` when either side is zero.
    pub fn fit_within(&self, bound: u32) -> Option<Size> {
        if !self.is_valid() || bound == 0 {
            return None;
        }
        let (w, h, b) = (self.width as f64, self.height as f64, bound as f64);
        let scale = (b / w).min(b / h);
        let width = ((w * scale).round() as u32).clamp(1, bound);
        let height = ((h * scale).round() as u32).clamp(1, bound);
        Some(Size::new(width, height))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resampling quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    /// Nearest neighbour; cheap enough to run while painting.
    Fast,
    /// Catmull-Rom; run from the smoothing queue.
    Smooth,
}

impl Transformation {
    fn filter(self) -> FilterType {
        match self {
            Self::Fast => FilterType::Nearest,
            Self::Smooth => FilterType::CatmullRom,
        }
    }
}

/// Reference-counted RGBA image. Clones share pixel storage.
#[derive(Clone)]
pub struct Pixmap {
    image: Arc<RgbaImage>,
}

impl Pixmap {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.into_rgba8())
    }

    pub fn filled(size: Size, color: Rgba<u8>) -> Self {
        Self::new(RgbaImage::from_pixel(size.width, size.height, color))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn max_dimension(&self) -> u32 {
        self.size().max_dimension()
    }

    pub fn is_empty(&self) -> bool {
        !self.size().is_valid()
    }

    /// True when both handles point at the same pixel storage.
    pub fn ptr_eq(&self, other: &Pixmap) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }

    /// Rescale to fit in `bound` x `bound`, keeping the aspect ratio.
    ///
    /// Returns `None` for zero-sized pixmaps or a zero bound.
    pub fn scaled(&self, bound: u32, transformation: Transformation) -> Option<Pixmap> {
        let target = self.size().fit_within(bound)?;
        if target == self.size() {
            return Some(self.clone());
        }
        Some(Self::new(imageops::resize(
            self.image.as_ref(),
            target.width,
            target.height,
            transformation.filter(),
        )))
    }

    /// Copy with every alpha value multiplied by `opacity`.
    pub fn with_opacity(&self, opacity: f32) -> Pixmap {
        let opacity = opacity.clamp(0.0, 1.0);
        let mut image = (*self.image).clone();
        for pixel in image.pixels_mut() {
            pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
        }
        Self::new(image)
    }
}

impl PartialEq for Pixmap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.size() == other.size() && self.image.as_raw() == other.image.as_raw())
    }
}

impl Eq for Pixmap {}

impl fmt::Debug for Pixmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pixmap({})", self.size())
    }
}
