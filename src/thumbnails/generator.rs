//! Contract between the view and whatever produces group thumbnails.

use super::group::ThumbnailGroup;
use super::message::Message;
use super::pixmap::{Pixmap, Size};
use crate::models::{Item, Url};

/// Asynchronous thumbnail generation job.
///
/// Results are delivered back to the view as `GeneratorEvent`s, in any order,
/// at any time after submission.
pub trait ThumbnailGenerator {
    /// Start a new job for `items` at `group` resolution.
    fn submit(&mut self, items: Vec<Item>, group: ThumbnailGroup);

    /// Add items to the running job.
    fn append(&mut self, items: Vec<Item>);

    /// Change the resolution of items not yet processed.
    fn retarget(&mut self, group: ThumbnailGroup);

    /// Withdraw items that have not been processed yet.
    fn cancel(&mut self, urls: &[Url]);

    /// Items submitted but not processed yet.
    fn pending(&self) -> Vec<Url>;

    /// Whether a job is in flight.
    fn is_active(&self) -> bool;

    /// Drop any persisted thumbnail for `item`.
    fn forget(&mut self, _item: &Item) {}
}

#[derive(Debug, Clone)]
pub enum GeneratorEvent {
    Ready {
        item: Item,
        pixmap: Pixmap,
        full_size: Option<Size>,
    },
    Failed {
        item: Item,
        error: String,
    },
}

impl From<GeneratorEvent> for Message {
    fn from(event: GeneratorEvent) -> Self {
        match event {
            GeneratorEvent::Ready {
                item,
                pixmap,
                full_size,
            } => Message::ThumbnailReady {
                url: item.url,
                pixmap,
                full_size,
            },
            GeneratorEvent::Failed { item, .. } => Message::ThumbnailFailed { item },
        }
    }
}
