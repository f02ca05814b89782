//! Test doubles for the view's collaborators.

use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use image::Rgba;

use super::document_info::DocumentInfoProvider;
use super::generator::ThumbnailGenerator;
use super::group::ThumbnailGroup;
use super::message::Message;
use super::pixmap::{Pixmap, Size};
use super::view::ThumbnailView;
use crate::config::ViewConfig;
use crate::models::{Item, ItemKind, ItemModel, Url};

#[derive(Debug, Default)]
pub struct GeneratorLog {
    pub submissions: Vec<(Vec<Url>, ThumbnailGroup)>,
    pub appended: Vec<Vec<Url>>,
    pub retargets: Vec<ThumbnailGroup>,
    pub cancelled: Vec<Url>,
    pub forgotten: Vec<Url>,
    pub pending: Vec<Url>,
    pub active: bool,
}

/// Generator that only records what it was asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator(Rc<RefCell<GeneratorLog>>);

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Ref<'_, GeneratorLog> {
        self.0.borrow()
    }

    /// Pretend the running job processed everything.
    pub fn finish(&self) {
        let mut log = self.0.borrow_mut();
        log.pending.clear();
        log.active = false;
    }

    pub fn set_active(&self, active: bool) {
        self.0.borrow_mut().active = active;
    }
}

fn urls(items: &[Item]) -> Vec<Url> {
    items.iter().map(|item| item.url.clone()).collect()
}

impl ThumbnailGenerator for MockGenerator {
    fn submit(&mut self, items: Vec<Item>, group: ThumbnailGroup) {
        let mut log = self.0.borrow_mut();
        let urls = urls(&items);
        log.pending.extend(urls.iter().cloned());
        log.submissions.push((urls, group));
        log.active = true;
    }

    fn append(&mut self, items: Vec<Item>) {
        let mut log = self.0.borrow_mut();
        let urls = urls(&items);
        log.pending.extend(urls.iter().cloned());
        log.appended.push(urls);
    }

    fn retarget(&mut self, group: ThumbnailGroup) {
        self.0.borrow_mut().retargets.push(group);
    }

    fn cancel(&mut self, urls: &[Url]) {
        let mut log = self.0.borrow_mut();
        log.pending.retain(|url| !urls.contains(url));
        log.cancelled.extend(urls.iter().cloned());
    }

    fn pending(&self) -> Vec<Url> {
        self.0.borrow().pending.clone()
    }

    fn is_active(&self) -> bool {
        self.0.borrow().active
    }

    fn forget(&mut self, item: &Item) {
        self.0.borrow_mut().forgotten.push(item.url.clone());
    }
}

#[derive(Debug, Default)]
pub struct ProviderState {
    pub modified: HashSet<Url>,
    pub busy: HashSet<Url>,
    pub preview: Option<(Pixmap, Option<Size>)>,
    pub preview_requests: Vec<(Url, ThumbnailGroup)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockProvider(Rc<RefCell<ProviderState>>);

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, ProviderState> {
        self.0.borrow()
    }

    pub fn set_modified(&self, url: &Url, modified: bool) {
        let mut state = self.0.borrow_mut();
        if modified {
            state.modified.insert(url.clone());
        } else {
            state.modified.remove(url);
        }
    }

    pub fn set_preview(&self, pixmap: Pixmap, full_size: Option<Size>) {
        self.0.borrow_mut().preview = Some((pixmap, full_size));
    }
}

impl DocumentInfoProvider for MockProvider {
    fn is_modified(&self, url: &Url) -> bool {
        self.0.borrow().modified.contains(url)
    }

    fn is_busy(&self, url: &Url) -> bool {
        self.0.borrow().busy.contains(url)
    }

    fn thumbnail_for_document(
        &self,
        url: &Url,
        group: ThumbnailGroup,
    ) -> Option<(Pixmap, Option<Size>)> {
        let mut state = self.0.borrow_mut();
        state.preview_requests.push((url.clone(), group));
        state.preview.clone()
    }
}

pub fn image(name: &str, mtime: i64) -> Item {
    Item::new(format!("file:///pics/{name}"), mtime, ItemKind::File)
}

pub fn directory(name: &str) -> Item {
    Item::new(format!("file:///pics/{name}"), 1, ItemKind::Directory)
}

pub fn archive(name: &str) -> Item {
    Item::new(format!("file:///pics/{name}"), 1, ItemKind::Archive)
}

pub fn solid(width: u32, height: u32) -> Pixmap {
    Pixmap::filled(Size::new(width, height), Rgba([200, 80, 40, 255]))
}

/// A view with a 600x400 viewport that has been shown; nothing has run yet.
pub fn shown_view(model: &ItemModel, generator: &MockGenerator) -> ThumbnailView {
    let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator.clone()));
    view.dispatch(model, Message::Resized { width: 600, height: 400 });
    view.dispatch(model, Message::Shown);
    view
}
