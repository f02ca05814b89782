//! Group-resolution thumbnail rendering using the image crate.
//!
//! Thumbnails fit in a `group.pixel_size()` square, keep their aspect ratio
//! and are never upscaled. The full image size is reported alongside.

use std::io::Cursor;
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{GenericImageView, ImageFormat, ImageReader, RgbaImage};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::group::ThumbnailGroup;
use super::pixmap::{Pixmap, Size};
use crate::error::LoadError;
use crate::image_loader;

/// A freshly rendered thumbnail.
#[derive(Debug, Clone)]
pub struct RenderedThumbnail {
    pub pixmap: Pixmap,
    /// Size of the source image; `None` for directory previews.
    pub full_size: Option<Size>,
}

pub struct ThumbnailRenderer;

impl ThumbnailRenderer {
    /// Render a thumbnail for an image file.
    pub fn render(src: &Path, group: ThumbnailGroup) -> Result<RenderedThumbnail, LoadError> {
        let img = image_loader::open_image(src)?;
        let (src_width, src_height) = img.dimensions();
        if src_width == 0 || src_height == 0 {
            return Err(LoadError::EmptyImage {
                path: src.to_path_buf(),
            });
        }

        let bound = group.pixel_size();
        let (thumb_width, thumb_height) = Self::calculate_dimensions(src_width, src_height, bound);
        debug!(
            ?src,
            src_width, src_height, thumb_width, thumb_height, "Rendering thumbnail"
        );

        let thumbnail = if (thumb_width, thumb_height) == (src_width, src_height) {
            img
        } else {
            // CatmullRom provides good quality/speed balance for downscaling
            img.resize_exact(thumb_width, thumb_height, FilterType::CatmullRom)
        };

        Ok(RenderedThumbnail {
            pixmap: Pixmap::from_dynamic(thumbnail),
            full_size: Some(Size::new(src_width, src_height)),
        })
    }

    /// Render a folder preview from the first renderable image directly inside `dir`.
    pub fn render_directory(
        dir: &Path,
        group: ThumbnailGroup,
    ) -> Result<RenderedThumbnail, LoadError> {
        let candidate = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .find(|p| Self::can_render(p))
            .ok_or_else(|| LoadError::EmptyDirectory {
                path: dir.to_path_buf(),
            })?;

        trace!(?dir, ?candidate, "Using directory preview image");
        let rendered = Self::render(&candidate, group)?;

        // Center on a full group square so the preview is never mistaken for
        // a too-small icon
        let bound = group.pixel_size();
        let mut canvas = RgbaImage::new(bound, bound);
        let preview = rendered.pixmap.image();
        let x = (bound - preview.width().min(bound)) / 2;
        let y = (bound - preview.height().min(bound)) / 2;
        imageops::overlay(&mut canvas, preview, x as i64, y as i64);
        Ok(RenderedThumbnail {
            pixmap: Pixmap::new(canvas),
            full_size: None,
        })
    }

    /// Determine image format from file extension.
    fn format_from_extension(path: &Path) -> Option<ImageFormat> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "webp" => Some(ImageFormat::WebP),
            "gif" => Some(ImageFormat::Gif),
            "bmp" => Some(ImageFormat::Bmp),
            "tiff" | "tif" => Some(ImageFormat::Tiff),
            _ => None,
        }
    }

    /// Check if a source file can be processed as an image.
    pub fn can_render(path: &Path) -> bool {
        Self::format_from_extension(path).is_some()
    }

    /// Fit `src` in a `bound` square preserving aspect ratio, never upscaling.
    fn calculate_dimensions(src_width: u32, src_height: u32, bound: u32) -> (u32, u32) {
        if src_width == 0 || src_height == 0 {
            return (bound, bound);
        }
        if src_width <= bound && src_height <= bound {
            return (src_width, src_height);
        }
        Size::new(src_width, src_height)
            .fit_within(bound)
            .map(|s| (s.width, s.height))
            .unwrap_or((bound, bound))
    }

    /// Encode a pixmap as PNG (keeps alpha for icons and transparent images).
    pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, image::ImageError> {
        let mut buffer = Vec::new();
        pixmap
            .image()
            .write_with_encoder(PngEncoder::new(&mut buffer))?;
        Ok(buffer)
    }

    /// Decode a stored PNG thumbnail.
    pub fn decode_png(bytes: &[u8]) -> Result<Pixmap, image::ImageError> {
        let img = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png).decode()?;
        Ok(Pixmap::from_dynamic(img))
    }
}
