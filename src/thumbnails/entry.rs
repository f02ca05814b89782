use super::group::ThumbnailGroup;
use super::pixmap::{Pixmap, Size, Transformation};
use crate::models::RowId;

/// Cached thumbnail state for one url.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    /// Row the entry was created for; stale once the row is removed.
    pub row: RowId,
    pub modification_time: i64,
    /// Pixmap at one of the standard group resolutions.
    pub group_pixmap: Option<Pixmap>,
    /// `group_pixmap` rescaled to the current thumbnail size.
    pub adjusted_pixmap: Option<Pixmap>,
    /// Size of the full image, or a placeholder square for icons.
    pub full_size: Size,
    /// Size of the full image when the thumbnail comes from a raster image.
    pub real_full_size: Option<Size>,
    /// Whether `adjusted_pixmap` came from a fast rescale.
    pub rough: bool,
    /// Whether `group_pixmap` should still be replaced by a real thumbnail.
    pub waiting_for_thumbnail: bool,
}

impl Thumbnail {
    pub fn new(row: RowId, modification_time: i64) -> Self {
        Self {
            row,
            modification_time,
            group_pixmap: None,
            adjusted_pixmap: None,
            full_size: Size::default(),
            real_full_size: None,
            rough: true,
            waiting_for_thumbnail: true,
        }
    }

    /// Use an icon in place of a real thumbnail.
    pub fn init_as_icon(&mut self, pixmap: Pixmap) {
        self.group_pixmap = Some(pixmap);
        self.full_size = Size::square(ThumbnailGroup::Large.pixel_size());
    }

    /// Store a pixmap delivered by the generator or the document provider.
    pub fn set_loaded(&mut self, pixmap: Pixmap, full_size: Option<Size>) {
        let full_size = full_size.filter(Size::is_valid);
        self.group_pixmap = Some(pixmap);
        self.adjusted_pixmap = None;
        self.full_size =
            full_size.unwrap_or_else(|| Size::square(ThumbnailGroup::Large.pixel_size()));
        self.real_full_size = full_size;
        self.waiting_for_thumbnail = false;
    }

    /// Whether the group pixmap is good enough for display at `size`.
    pub fn is_group_pixmap_adapted_for_size(&self, size: u32) -> bool {
        if self.waiting_for_thumbnail {
            return false;
        }
        let Some(group) = &self.group_pixmap else {
            return false;
        };
        let group_size = group.max_dimension();
        if group_size >= size {
            return true;
        }
        // Smaller than requested, but it may already be the full image.
        group_size == self.full_size.max_dimension()
    }

    /// Forget everything loaded so far; the file changed on disk.
    pub fn prepare_for_refresh(&mut self, modification_time: i64) {
        self.modification_time = modification_time;
        self.group_pixmap = None;
        self.adjusted_pixmap = None;
        self.full_size = Size::default();
        self.real_full_size = None;
        self.rough = true;
        self.waiting_for_thumbnail = true;
    }

    /// Compute `adjusted_pixmap` with a fast rescale.
    ///
    /// When the group pixmap already is the full image and fits, it is used
    /// as-is and nothing is left to smooth. A zero-sized group pixmap leaves
    /// the entry untouched.
    pub fn rough_adjust(&mut self, thumbnail_size: u32) {
        let Some(group) = &self.group_pixmap else {
            return;
        };
        let group_size = group.max_dimension();
        let full_size = self.full_size.max_dimension();
        if full_size == group_size && group_size <= thumbnail_size {
            self.adjusted_pixmap = Some(group.clone());
            self.rough = false;
        } else if let Some(scaled) = group.scaled(thumbnail_size, Transformation::Fast) {
            self.adjusted_pixmap = Some(scaled);
            self.rough = true;
        }
    }

    /// Replace `adjusted_pixmap` with a high-quality rescale.
    pub fn smooth_adjust(&mut self, thumbnail_size: u32) -> bool {
        let Some(scaled) = self
            .group_pixmap
            .as_ref()
            .and_then(|group| group.scaled(thumbnail_size, Transformation::Smooth))
        else {
            return false;
        };
        self.adjusted_pixmap = Some(scaled);
        self.rough = false;
        true
    }
}
