use super::group::ThumbnailGroup;
use super::pixmap::{Pixmap, Size};
use crate::models::Url;

/// Live document state owned by the rest of the application.
///
/// Changes are reported to the view as `Message::BusyStateChanged` and
/// `Message::DocumentChanged`.
pub trait DocumentInfoProvider {
    /// Whether the document has unsaved changes.
    fn is_modified(&self, url: &Url) -> bool;

    /// Whether a background operation is running on the document.
    fn is_busy(&self, url: &Url) -> bool;

    /// Preview of the document in its current, possibly unsaved, state.
    fn thumbnail_for_document(
        &self,
        url: &Url,
        group: ThumbnailGroup,
    ) -> Option<(Pixmap, Option<Size>)>;
}
