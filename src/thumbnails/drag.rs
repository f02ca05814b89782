//! Pixmap shown under the cursor while dragging a selection.

use image::{imageops, Rgba, RgbaImage};

use super::pixmap::{Pixmap, Transformation};
use super::view::ThumbnailView;
use crate::models::{ItemModel, RowId};

/// Thumbnails shown before switching to "first two, ellipsis, last".
const MAX_THUMBNAIL_COUNT: usize = 3;

/// Largest dimension of a thumbnail inside the drag pixmap.
const THUMBNAIL_MAX_SIZE: u32 = 64;

/// Gap around and between thumbnails.
const SPACING: u32 = 4;

/// Tooltip yellow.
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 220, 255]);

const ELLIPSIS_COLOR: Rgba<u8> = Rgba([60, 60, 60, 255]);

/// Side of one ellipsis dot.
const ELLIPSIS_DOT: u32 = 3;

/// Three dots separated by a dot-wide gap.
const ELLIPSIS_WIDTH: u32 = ELLIPSIS_DOT * 5;

impl ThumbnailView {
    /// Compose the drag pixmap for `rows`, `None` when nothing can be shown.
    ///
    /// Only thumbnails already adjusted for display are used; rows that were
    /// never painted are left out.
    pub fn create_drag_pixmap(&self, model: &ItemModel, rows: &[RowId]) -> Option<Pixmap> {
        let more = rows.len() > MAX_THUMBNAIL_COUNT;
        let picked: Vec<RowId> = if more {
            rows[..MAX_THUMBNAIL_COUNT - 1]
                .iter()
                .chain(rows.last())
                .copied()
                .collect()
        } else {
            rows.to_vec()
        };

        let thumbnails: Vec<Pixmap> = picked
            .into_iter()
            .filter_map(|row| model.get(row))
            .filter_map(|item| self.cached(&item.url)?.adjusted_pixmap.clone())
            .filter_map(|pixmap| {
                let bound = pixmap.max_dimension().min(THUMBNAIL_MAX_SIZE);
                pixmap.scaled(bound, Transformation::Smooth)
            })
            .collect();
        compose_drag_pixmap(&thumbnails, more)
    }
}

/// Lay `thumbnails` out side by side on a tooltip-coloured background.
///
/// With `more`, an ellipsis marker is drawn before the last thumbnail.
pub fn compose_drag_pixmap(thumbnails: &[Pixmap], more: bool) -> Option<Pixmap> {
    if thumbnails.is_empty() {
        return None;
    }
    let content_height = thumbnails.iter().map(Pixmap::height).max().unwrap_or(0);
    let mut width = SPACING + thumbnails.iter().map(|t| t.width() + SPACING).sum::<u32>();
    if more {
        width += ELLIPSIS_WIDTH + SPACING;
    }
    let height = content_height + 2 * SPACING;

    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    let mut x = SPACING;
    let last = thumbnails.len() - 1;
    for (index, thumbnail) in thumbnails.iter().enumerate() {
        if more && index == last {
            draw_ellipsis(&mut canvas, x, height / 2);
            x += ELLIPSIS_WIDTH + SPACING;
        }
        let y = SPACING + (content_height - thumbnail.height()) / 2;
        imageops::overlay(&mut canvas, thumbnail.image(), x as i64, y as i64);
        x += thumbnail.width() + SPACING;
    }
    Some(Pixmap::new(canvas))
}

fn draw_ellipsis(canvas: &mut RgbaImage, x: u32, center_y: u32) {
    let top = center_y.saturating_sub(ELLIPSIS_DOT / 2);
    for dot in 0..3 {
        let left = x + dot * 2 * ELLIPSIS_DOT;
        for dx in 0..ELLIPSIS_DOT {
            for dy in 0..ELLIPSIS_DOT {
                if let Some(pixel) = canvas.get_pixel_mut_checked(left + dx, top + dy) {
                    *pixel = ELLIPSIS_COLOR;
                }
            }
        }
    }
}
