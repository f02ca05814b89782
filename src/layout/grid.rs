use crate::thumbnails::pixmap::Size;

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Grow the right and bottom edges.
    pub fn expanded(&self, dw: i64, dh: i64) -> Self {
        Self::new(self.x, self.y, self.width + dw, self.height + dh)
    }

    /// Empty rectangles never intersect anything.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// How items flow across the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Left to right, wrapping into rows.
    #[default]
    Wrap,
    /// A single horizontal strip.
    Linear,
}

impl Flow {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wrap" | "grid" => Some(Self::Wrap),
            "linear" | "strip" => Some(Self::Linear),
            _ => None,
        }
    }
}

/// Uniform-cell grid geometry.
///
/// Every item occupies a square cell of `thumbnail_size + 2 * item_margin`.
/// Positions are display ordinals, not row handles.
#[derive(Debug, Clone)]
pub struct GridLayout {
    pub flow: Flow,
    pub item_margin: u32,
    pub viewport: Size,
    pub scroll_x: i64,
    pub scroll_y: i64,
}

impl GridLayout {
    pub fn new(flow: Flow, item_margin: u32) -> Self {
        Self {
            flow,
            item_margin,
            viewport: Size::default(),
            scroll_x: 0,
            scroll_y: 0,
        }
    }

    pub fn cell_size(&self, thumbnail_size: u32) -> u32 {
        thumbnail_size.saturating_add(self.item_margin.saturating_mul(2))
    }

    pub fn viewport_rect(&self) -> Rect {
        Rect::new(
            0,
            0,
            self.viewport.width as i64,
            self.viewport.height as i64,
        )
    }

    /// Number of columns in wrapping flow, `None` when the cell size is zero.
    pub fn columns(&self, thumbnail_size: u32) -> Option<usize> {
        let cell = self.cell_size(thumbnail_size);
        if cell == 0 {
            return None;
        }
        match self.flow {
            Flow::Wrap => Some(((self.viewport.width / cell) as usize).max(1)),
            Flow::Linear => Some(usize::MAX),
        }
    }

    /// Viewport grown so that the next rows (wrap) or half a screen (linear)
    /// are generated ahead of time. `None` for an empty viewport.
    pub fn prefetch_rect(&self, thumbnail_size: u32) -> Option<Rect> {
        let rect = self.viewport_rect();
        if rect.is_empty() {
            return None;
        }
        Some(match self.flow {
            Flow::Wrap => rect.expanded(0, thumbnail_size as i64 * 2),
            Flow::Linear => rect.expanded(rect.width / 2, 0),
        })
    }

    /// Rectangle of the item at display `position`.
    pub fn visual_rect(&self, position: usize, thumbnail_size: u32) -> Option<Rect> {
        let cell = self.cell_size(thumbnail_size) as i64;
        let columns = self.columns(thumbnail_size)?;
        let (column, row) = match self.flow {
            Flow::Wrap => (position % columns, position / columns),
            Flow::Linear => (position, 0),
        };
        Some(Rect::new(
            column as i64 * cell - self.scroll_x,
            row as i64 * cell - self.scroll_y,
            cell,
            cell,
        ))
    }
}
