use super::pixmap::{Pixmap, Size};
use crate::models::{Item, ModelEvent, RowId, Url};

/// Everything the view reacts to, delivered through `ThumbnailView::dispatch`.
#[derive(Debug, Clone)]
pub enum Message {
    Shown,
    Hidden,
    Resized { width: u32, height: u32 },
    /// Absolute scroll offsets of the content.
    Scrolled { x: i64, y: i64 },
    Model(ModelEvent),
    ThumbnailReady {
        url: Url,
        pixmap: Pixmap,
        full_size: Option<Size>,
    },
    ThumbnailFailed { item: Item },
    BusyStateChanged { row: RowId, busy: bool },
    DocumentChanged { row: RowId },
}

impl From<ModelEvent> for Message {
    fn from(event: ModelEvent) -> Self {
        Message::Model(event)
    }
}

/// Notifications the view emits for its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// The row's cell must be redrawn.
    Repaint(RowId),
    ThumbnailSizeChanged(u32),
}
