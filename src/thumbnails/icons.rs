//! Built-in stand-in icons for items without a real thumbnail.
//!
//! Icons are drawn procedurally and memoized per (icon, size).

use std::collections::HashMap;

use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::pixmap::Pixmap;
use crate::models::{Item, ItemKind};

static ICON_CACHE: Lazy<Mutex<HashMap<(Icon, u32), Pixmap>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icon {
    Folder,
    Archive,
    Video,
    Document,
    ImageMissing,
    /// Shown while a thumbnail is being generated.
    Chronometer,
}

impl Icon {
    /// Mimetype-style icon for an item.
    pub fn for_item(item: &Item) -> Self {
        match item.kind {
            ItemKind::Directory => Self::Folder,
            ItemKind::Archive => Self::Archive,
            ItemKind::File if item.is_video() => Self::Video,
            ItemKind::File => Self::Document,
        }
    }

    fn colors(self) -> (Rgba<u8>, Rgba<u8>) {
        match self {
            Self::Folder => (Rgba([232, 176, 64, 255]), Rgba([196, 140, 40, 255])),
            Self::Archive => (Rgba([150, 110, 80, 255]), Rgba([230, 220, 200, 255])),
            Self::Video => (Rgba([60, 60, 70, 255]), Rgba([240, 240, 240, 255])),
            Self::Document => (Rgba([245, 245, 245, 255]), Rgba([120, 150, 200, 255])),
            Self::ImageMissing => (Rgba([235, 235, 235, 255]), Rgba([200, 40, 40, 255])),
            Self::Chronometer => (Rgba([90, 90, 90, 255]), Rgba([250, 250, 250, 255])),
        }
    }
}

/// Icon rendered at `size` x `size`.
pub fn icon(icon: Icon, size: u32) -> Pixmap {
    let size = size.max(1);
    ICON_CACHE
        .lock()
        .entry((icon, size))
        .or_insert_with(|| Pixmap::new(render(icon, size)))
        .clone()
}

/// Icon matching the item's kind.
pub fn icon_for_item(item: &Item, size: u32) -> Pixmap {
    icon(Icon::for_item(item), size)
}

fn fill(image: &mut RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgba<u8>) {
    let x1 = x1.min(image.width());
    let y1 = y1.min(image.height());
    for y in y0..y1 {
        for x in x0..x1 {
            image.put_pixel(x, y, color);
        }
    }
}

fn render(icon: Icon, size: u32) -> RgbaImage {
    let mut image = RgbaImage::new(size, size);
    let (body, mark) = icon.colors();
    let unit = (size / 8).max(1);

    match icon {
        Icon::Folder => {
            fill(&mut image, 0, unit, size / 2, 2 * unit, mark);
            fill(&mut image, 0, 2 * unit, size, size - unit, body);
        }
        Icon::Archive => {
            fill(&mut image, unit, 0, size - unit, size, body);
            let zip_x = size / 2 - unit / 2;
            let mut y = 0;
            while y < size {
                fill(&mut image, zip_x, y, zip_x + unit, y + unit / 2 + 1, mark);
                y += unit;
            }
        }
        Icon::Video => {
            fill(&mut image, 0, unit, size, size - unit, body);
            for row in 0..(size / 4) {
                let y = size / 2 - size / 8 + row / 2;
                fill(&mut image, 3 * unit, y, 3 * unit + row / 2 + 1, y + 1, mark);
            }
        }
        Icon::Document => {
            fill(&mut image, unit, 0, size - unit, size, body);
            let mut y = 2 * unit;
            while y + unit < size {
                fill(&mut image, 2 * unit, y, size - 2 * unit, y + unit / 2 + 1, mark);
                y += 2 * unit;
            }
        }
        Icon::ImageMissing => {
            fill(&mut image, unit, unit, size - unit, size - unit, body);
            for i in unit..(size - unit) {
                fill(&mut image, i, i, i + unit / 2 + 1, i + 1, mark);
                let j = size - 1 - i;
                fill(&mut image, j, i, j + unit / 2 + 1, i + 1, mark);
            }
        }
        Icon::Chronometer => {
            let center = size as f32 / 2.0;
            let radius = center - unit as f32 / 2.0;
            for (x, y, pixel) in image.enumerate_pixels_mut() {
                let dx = x as f32 + 0.5 - center;
                let dy = y as f32 + 0.5 - center;
                if dx * dx + dy * dy <= radius * radius {
                    *pixel = body;
                }
            }
            let c = size / 2;
            fill(&mut image, c, unit * 2, c + unit / 2 + 1, c + 1, mark);
            fill(&mut image, c, c, size.saturating_sub(2 * unit), c + unit / 2 + 1, mark);
        }
    }

    image
}
