//! Per-url thumbnail cache with debounced generation and progressive smoothing.
//!
//! The view owns its cache. Model changes, generator results and document
//! notifications arrive through `dispatch`; timers run through `advance`.
//! Painting code asks `thumbnail()` what to draw and listens for
//! `ViewEvent::Repaint`.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, trace, warn};

use super::document_info::DocumentInfoProvider;
use super::entry::Thumbnail;
use super::generator::ThumbnailGenerator;
use super::group::ThumbnailGroup;
use super::icons::{self, Icon};
use super::message::{Message, ViewEvent};
use super::pixmap::{Pixmap, Size};
use super::smooth_queue::SmoothQueue;
use crate::config::{clamp_thumbnail_size, ViewConfig};
use crate::layout::{Flow, GridLayout};
use crate::models::{Item, ItemKind, ItemModel, ModelEvent, RowId, Url};
use crate::scheduler::{Scheduler, Task};

/// Number of frames in the busy animation loop.
pub const BUSY_FRAME_COUNT: usize = 8;

const WHEEL_ZOOM_MULTIPLIER: i32 = 4;

const MISSING_IMAGE_ICON_SIZE: u32 = 48;

/// Floor for self-rescheduling tasks so a zero delay cannot spin forever.
const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

fn waiting_thumbnail_for(thumbnail_size: u32) -> Pixmap {
    let icon_size = if thumbnail_size > 64 { 48 } else { 32 };
    icons::icon(Icon::Chronometer, icon_size).with_opacity(0.5)
}

fn now_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct ThumbnailView {
    config: ViewConfig,
    thumbnail_size: u32,
    layout: GridLayout,
    visible: bool,
    generator: Box<dyn ThumbnailGenerator>,
    document_info: Option<Box<dyn DocumentInfoProvider>>,
    thumbnails: HashMap<Url, Thumbnail>,
    smooth_queue: SmoothQueue,
    /// Urls evicted by a reload while still queued for smoothing.
    evicted: HashSet<Url>,
    busy_rows: HashSet<RowId>,
    busy_frame: usize,
    waiting_thumbnail: Pixmap,
    scheduler: Scheduler,
    events: Vec<ViewEvent>,
}

impl ThumbnailView {
    pub fn new(config: ViewConfig, generator: Box<dyn ThumbnailGenerator>) -> Self {
        let thumbnail_size = clamp_thumbnail_size(config.thumbnail_size);
        Self {
            layout: GridLayout::new(config.flow, config.item_margin),
            thumbnail_size,
            visible: false,
            generator,
            document_info: None,
            thumbnails: HashMap::new(),
            smooth_queue: SmoothQueue::new(),
            evicted: HashSet::new(),
            busy_rows: HashSet::new(),
            busy_frame: 0,
            waiting_thumbnail: waiting_thumbnail_for(thumbnail_size),
            scheduler: Scheduler::new(),
            events: Vec::new(),
            config,
        }
    }

    pub fn set_document_info_provider(&mut self, provider: Option<Box<dyn DocumentInfoProvider>>) {
        self.document_info = provider;
    }

    pub fn thumbnail_size(&self) -> u32 {
        self.thumbnail_size
    }

    pub fn layout(&self) -> &GridLayout {
        &self.layout
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn generator(&self) -> &dyn ThumbnailGenerator {
        self.generator.as_ref()
    }

    /// Placeholder shown while a thumbnail is being generated.
    pub fn waiting_thumbnail(&self) -> &Pixmap {
        &self.waiting_thumbnail
    }

    pub fn cached(&self, url: &Url) -> Option<&Thumbnail> {
        self.thumbnails.get(url)
    }

    pub fn cache_len(&self) -> usize {
        self.thumbnails.len()
    }

    pub fn is_queued_for_smoothing(&self, url: &Url) -> bool {
        self.smooth_queue.contains(url)
    }

    pub fn smoothing_queue_len(&self) -> usize {
        self.smooth_queue.len()
    }

    pub fn busy_rows(&self) -> impl Iterator<Item = RowId> + '_ {
        self.busy_rows.iter().copied()
    }

    /// Current frame of the busy animation, in `0..BUSY_FRAME_COUNT`.
    pub fn busy_frame(&self) -> usize {
        self.busy_frame
    }

    pub fn is_busy_animation_running(&self) -> bool {
        self.scheduler.is_active(Task::BusyFrame)
    }

    /// Drain repaint requests and notifications accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<ViewEvent> {
        std::mem::take(&mut self.events)
    }

    /// Logical time of the view's clock.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.scheduler.has_pending()
    }

    pub fn set_flow(&mut self, flow: Flow) {
        if self.layout.flow == flow {
            return;
        }
        self.layout.flow = flow;
        self.schedule_generation_for_visible_items();
    }

    pub fn set_thumbnail_size(&mut self, size: u32) {
        let size = clamp_thumbnail_size(size);
        if size == self.thumbnail_size {
            return;
        }
        self.thumbnail_size = size;
        self.waiting_thumbnail = waiting_thumbnail_for(size);

        // Stop smoothing
        self.scheduler.stop(Task::SmoothNext);
        self.smooth_queue.clear();

        for thumbnail in self.thumbnails.values_mut() {
            thumbnail.adjusted_pixmap = None;
        }

        debug!(size, "Thumbnail size changed");
        self.events.push(ViewEvent::ThumbnailSizeChanged(size));
        self.schedule_generation_for_visible_items();
    }

    /// Ctrl+wheel zoom: one notch changes the size by a few pixels.
    pub fn zoom_by_wheel(&mut self, delta: i32) {
        if delta == 0 {
            return;
        }
        let step = delta.signum() * WHEEL_ZOOM_MULTIPLIER;
        let size = (self.thumbnail_size as i32 + step).max(0) as u32;
        self.set_thumbnail_size(size);
    }

    /// Single entry point for external events.
    pub fn dispatch(&mut self, model: &ItemModel, message: Message) {
        match message {
            Message::Shown => {
                self.visible = true;
                self.schedule_generation_for_visible_items();
            }
            Message::Hidden => {
                self.visible = false;
            }
            Message::Resized { width, height } => {
                self.layout.viewport = Size::new(width, height);
                self.schedule_generation_for_visible_items();
            }
            Message::Scrolled { x, y } => {
                if (self.layout.scroll_x, self.layout.scroll_y) == (x, y) {
                    return;
                }
                self.layout.scroll_x = x;
                self.layout.scroll_y = y;
                self.schedule_generation_for_visible_items();
            }
            Message::Model(event) => self.on_model_event(model, event),
            Message::ThumbnailReady {
                url,
                pixmap,
                full_size,
            } => self.set_thumbnail(&url, pixmap, full_size),
            Message::ThumbnailFailed { item } => self.set_broken_thumbnail(&item),
            Message::BusyStateChanged { row, busy } => self.update_busy_state(model, row, busy),
            Message::DocumentChanged { row } => self.update_thumbnail(model, row),
        }
    }

    /// Run every task that falls due within the next `elapsed` of logical time.
    pub fn advance(&mut self, model: &ItemModel, elapsed: Duration) {
        let target = self.scheduler.now() + elapsed;
        self.run_until(model, target);
    }

    /// Run every task due at or before `time`, in deadline order.
    pub fn run_until(&mut self, model: &ItemModel, time: Duration) {
        while let Some(task) = self.scheduler.pop_due(time) {
            trace!(?task, now = ?self.scheduler.now(), "Running task");
            match task {
                Task::GenerateVisible => self.generate_thumbnails_for_visible_items(model),
                Task::SmoothNext => self.smooth_next_thumbnail(model),
                Task::BusyFrame => self.advance_busy_animation(),
            }
        }
        self.scheduler.advance_to(time);
    }

    /// Pixmap to draw for `row` and the full size of the image it represents.
    ///
    /// Never blocks on generation: returns the waiting placeholder until a
    /// thumbnail arrives, then a roughly scaled pixmap that is queued for
    /// smoothing. `None` for an invalid row.
    pub fn thumbnail(&mut self, model: &ItemModel, row: RowId) -> Option<(Pixmap, Option<Size>)> {
        let Some(item) = model.get(row) else {
            trace!(?row, "Invalid row");
            return None;
        };
        let url = &item.url;
        let size = self.thumbnail_size;

        if !self.thumbnails.contains_key(url) {
            self.evicted.remove(url);
            self.thumbnails
                .insert(url.clone(), Thumbnail::new(row, item.mtime));
        }
        let thumbnail = self.thumbnails.get_mut(url)?;

        // Directories and archives start from their icon
        if matches!(item.kind, ItemKind::Archive | ItemKind::Directory) {
            let group_size = ThumbnailGroup::from_pixel_size(size).pixel_size();
            let too_small = thumbnail
                .group_pixmap
                .as_ref()
                .map_or(true, |pix| pix.width() < group_size);
            if too_small {
                thumbnail.init_as_icon(icons::icon_for_item(item, group_size));
                // Archives never get a real thumbnail
                thumbnail.waiting_for_thumbnail = item.kind == ItemKind::Directory;
            }
        }

        if thumbnail.group_pixmap.is_none() {
            return Some((self.waiting_thumbnail.clone(), None));
        }

        if thumbnail.adjusted_pixmap.is_none() {
            thumbnail.rough_adjust(size);
        }
        let Some(adjusted) = thumbnail.adjusted_pixmap.clone() else {
            trace!(%url, "Group pixmap cannot be scaled");
            return Some((self.waiting_thumbnail.clone(), None));
        };

        if thumbnail.rough
            && self.smooth_queue.push(url.clone())
            && !self.scheduler.is_active(Task::SmoothNext)
        {
            self.scheduler.start(Task::SmoothNext, self.config.smooth_delay);
        }
        Some((adjusted, thumbnail.real_full_size))
    }

    pub fn thumbnail_for_url(
        &mut self,
        model: &ItemModel,
        url: &Url,
    ) -> Option<(Pixmap, Option<Size>)> {
        let row = model.row_for_url(url)?;
        self.thumbnail(model, row)
    }

    /// Rows whose cell intersects the viewport, in display order.
    pub fn visible_rows(&self, model: &ItemModel) -> Vec<RowId> {
        let viewport = self.layout.viewport_rect();
        model
            .iter()
            .enumerate()
            .filter(|(position, _)| {
                self.layout
                    .visual_rect(*position, self.thumbnail_size)
                    .is_some_and(|rect| viewport.intersects(&rect))
            })
            .map(|(_, (row, _))| row)
            .collect()
    }

    pub fn is_modified(&self, model: &ItemModel, row: RowId) -> bool {
        model
            .get(row)
            .is_some_and(|item| self.document_is_modified(&item.url))
    }

    pub fn is_busy(&self, model: &ItemModel, row: RowId) -> bool {
        let Some(provider) = &self.document_info else {
            return false;
        };
        model.get(row).is_some_and(|item| provider.is_busy(&item.url))
    }

    /// Throw away the thumbnail of `row`, including any persisted copy, and
    /// regenerate visible thumbnails right away.
    pub fn reload_thumbnail(&mut self, model: &ItemModel, row: RowId) {
        let Some(item) = model.get(row) else {
            warn!(?row, "Invalid row for reload");
            return;
        };
        self.generator.forget(item);
        if self.thumbnails.remove(&item.url).is_none() {
            return;
        }
        if self.smooth_queue.contains(&item.url) {
            self.evicted.insert(item.url.clone());
        }
        debug!(url = %item.url, "Reloading thumbnail");
        self.generate_thumbnails_for_visible_items(model);
    }

    fn repaint(&mut self, row: RowId) {
        self.events.push(ViewEvent::Repaint(row));
    }

    fn document_is_modified(&self, url: &Url) -> bool {
        self.document_info
            .as_ref()
            .is_some_and(|provider| provider.is_modified(url))
    }

    fn restart_generation_timer(&mut self) {
        self.scheduler
            .start(Task::GenerateVisible, self.config.generation_delay);
    }

    /// Withdraw outdated requests and restart the debounce timer.
    fn schedule_generation_for_visible_items(&mut self) {
        let pending = self.generator.pending();
        if !pending.is_empty() {
            trace!(count = pending.len(), "Withdrawing pending thumbnail requests");
            self.generator.cancel(&pending);
        }
        self.smooth_queue.clear();
        self.evicted.clear();
        self.restart_generation_timer();
    }

    fn generate_thumbnails_for_visible_items(&mut self, model: &ItemModel) {
        if !self.visible {
            return;
        }
        let size = self.thumbnail_size;
        let Some(visible_rect) = self.layout.prefetch_rect(size) else {
            trace!("Empty viewport, skipping thumbnail generation");
            return;
        };

        let mut batch = Vec::new();
        for (position, (row, item)) in model.iter().enumerate() {
            let Some(rect) = self.layout.visual_rect(position, size) else {
                return;
            };
            if !visible_rect.intersects(&rect) {
                continue;
            }

            if item.kind == ItemKind::Archive {
                continue;
            }

            // Modified documents bypass the generator
            if self.document_is_modified(&item.url) {
                self.update_thumbnail_for_modified_document(row, item);
                continue;
            }

            match self.thumbnails.get(&item.url) {
                Some(thumbnail) if thumbnail.is_group_pixmap_adapted_for_size(size) => continue,
                Some(_) => {}
                None => {
                    // Register interest so the result can be matched back by url
                    self.evicted.remove(&item.url);
                    self.thumbnails
                        .insert(item.url.clone(), Thumbnail::new(row, item.mtime));
                }
            }
            batch.push(item.clone());
        }

        if !batch.is_empty() {
            self.generate_thumbnails_for_items(batch);
        }
    }

    fn generate_thumbnails_for_items(&mut self, items: Vec<Item>) {
        let group = ThumbnailGroup::from_pixel_size(self.thumbnail_size);
        if self.generator.is_active() {
            trace!(count = items.len(), ?group, "Appending to running generation job");
            self.generator.retarget(group);
            self.generator.append(items);
        } else {
            debug!(count = items.len(), ?group, "Starting generation job");
            self.generator.submit(items, group);
        }
    }

    fn update_thumbnail_for_modified_document(&mut self, row: RowId, item: &Item) {
        let Some(provider) = &self.document_info else {
            return;
        };
        let group = ThumbnailGroup::from_pixel_size(self.thumbnail_size);
        let preview = provider.thumbnail_for_document(&item.url, group);

        self.evicted.remove(&item.url);
        self.thumbnails
            .insert(item.url.clone(), Thumbnail::new(row, now_timestamp()));
        match preview {
            Some((pixmap, full_size)) => self.set_thumbnail(&item.url, pixmap, full_size),
            None => debug!(url = %item.url, "No preview for modified document"),
        }
    }

    fn set_thumbnail(&mut self, url: &Url, pixmap: Pixmap, full_size: Option<Size>) {
        let Some(thumbnail) = self.thumbnails.get_mut(url) else {
            trace!(%url, "Dropping thumbnail for uncached url");
            return;
        };
        thumbnail.set_loaded(pixmap, full_size);
        let row = thumbnail.row;
        self.repaint(row);
    }

    fn set_broken_thumbnail(&mut self, item: &Item) {
        let group_size = ThumbnailGroup::from_pixel_size(self.thumbnail_size).pixel_size();
        let Some(thumbnail) = self.thumbnails.get_mut(&item.url) else {
            return;
        };

        if item.is_dir() {
            // Folders without previewable images keep their folder icon
            thumbnail.waiting_for_thumbnail = false;
            return;
        }

        if item.is_video() {
            // No video support in the generator: show the mimetype icon
            // rather than a broken image
            thumbnail.init_as_icon(icons::icon_for_item(item, group_size));
        } else {
            let icon = icons::icon(Icon::ImageMissing, MISSING_IMAGE_ICON_SIZE);
            thumbnail.init_as_icon(icon.clone());
            thumbnail.full_size = icon.size();
        }
        thumbnail.adjusted_pixmap = None;
        thumbnail.waiting_for_thumbnail = false;
        let row = thumbnail.row;
        self.repaint(row);
    }

    fn on_model_event(&mut self, model: &ItemModel, event: ModelEvent) {
        match event {
            ModelEvent::RowsInserted { .. } => self.restart_generation_timer(),
            ModelEvent::RowsRemoved { items } => self.on_rows_removed(items),
            ModelEvent::DataChanged { rows } => self.on_data_changed(model, &rows),
            ModelEvent::Compacted { remap } => self.on_compacted(remap),
        }
    }

    fn on_rows_removed(&mut self, items: Vec<(RowId, Item)>) {
        let mut urls = Vec::with_capacity(items.len());
        for (row, item) in items {
            self.thumbnails.remove(&item.url);
            self.smooth_queue.remove(&item.url);
            self.evicted.remove(&item.url);
            self.busy_rows.remove(&row);
            urls.push(item.url);
        }
        debug!(count = urls.len(), "Evicted thumbnails of removed rows");

        if !urls.is_empty() {
            self.generator.cancel(&urls);
        }
        if self.busy_rows.is_empty() {
            self.scheduler.stop(Task::BusyFrame);
        }

        // Removing rows might make new items visible
        self.restart_generation_timer();
    }

    fn on_data_changed(&mut self, model: &ItemModel, rows: &[RowId]) {
        let mut needs_refresh = false;
        for &row in rows {
            let Some(item) = model.get(row) else {
                warn!(?row, "Data changed for an invalid row");
                continue;
            };
            // Views that never displayed the url have nothing to refresh
            let Some(thumbnail) = self.thumbnails.get_mut(&item.url) else {
                continue;
            };
            // Metadata-only updates keep the modification time and must not
            // trigger a refresh
            if thumbnail.modification_time == item.mtime {
                continue;
            }
            thumbnail.prepare_for_refresh(item.mtime);
            self.smooth_queue.remove(&item.url);
            self.repaint(row);
            needs_refresh = true;
        }
        if needs_refresh {
            self.restart_generation_timer();
        }
    }

    fn on_compacted(&mut self, remap: Vec<(RowId, RowId)>) {
        let remap: HashMap<RowId, RowId> = remap.into_iter().collect();
        for thumbnail in self.thumbnails.values_mut() {
            if let Some(&row) = remap.get(&thumbnail.row) {
                thumbnail.row = row;
            }
        }
        self.busy_rows = self
            .busy_rows
            .drain()
            .filter_map(|row| remap.get(&row).copied())
            .collect();
        if self.busy_rows.is_empty() {
            self.scheduler.stop(Task::BusyFrame);
        }
    }

    /// A document was edited or saved.
    fn update_thumbnail(&mut self, model: &ItemModel, row: RowId) {
        let Some(item) = model.get(row) else {
            warn!(?row, "Document changed for an invalid row");
            return;
        };
        if self.document_is_modified(&item.url) {
            self.update_thumbnail_for_modified_document(row, item);
        } else {
            self.generate_thumbnails_for_items(vec![item.clone()]);
        }
    }

    fn update_busy_state(&mut self, model: &ItemModel, row: RowId, busy: bool) {
        if busy {
            if !model.contains(row) {
                trace!(?row, "Ignoring busy state of an invalid row");
                return;
            }
            if !self.busy_rows.insert(row) {
                return;
            }
            self.repaint(row);
            if !self.scheduler.is_active(Task::BusyFrame) {
                self.busy_frame = 0;
                self.scheduler
                    .start(Task::BusyFrame, self.config.busy_frame_interval.max(MIN_RETRY_DELAY));
            }
        } else if self.busy_rows.remove(&row) {
            self.repaint(row);
            if self.busy_rows.is_empty() {
                self.scheduler.stop(Task::BusyFrame);
            }
        }
    }

    fn advance_busy_animation(&mut self) {
        if self.busy_rows.is_empty() {
            return;
        }
        self.busy_frame = (self.busy_frame + 1) % BUSY_FRAME_COUNT;
        let mut rows: Vec<RowId> = self.busy_rows.iter().copied().collect();
        rows.sort();
        for row in rows {
            self.repaint(row);
        }
        self.scheduler
            .start(Task::BusyFrame, self.config.busy_frame_interval.max(MIN_RETRY_DELAY));
    }

    fn smooth_next_thumbnail(&mut self, model: &ItemModel) {
        if self.smooth_queue.is_empty() {
            return;
        }

        if self.generator.is_active() {
            // Give the generation job priority over smoothing
            self.scheduler
                .start(Task::SmoothNext, self.config.smooth_delay.max(MIN_RETRY_DELAY));
            return;
        }

        let Some(url) = self.smooth_queue.pop() else {
            return;
        };
        let size = self.thumbnail_size;
        let smoothed_row = match self.thumbnails.get_mut(&url) {
            Some(thumbnail) => thumbnail.smooth_adjust(size).then_some(thumbnail.row),
            None => {
                if self.evicted.remove(&url) {
                    trace!(%url, "Skipping smoothing of evicted thumbnail");
                } else {
                    warn!(%url, "Url queued for smoothing is not cached");
                }
                None
            }
        };

        if let Some(row) = smoothed_row {
            if model.contains(row) {
                self.repaint(row);
            } else {
                warn!(%url, ?row, "Smoothed thumbnail has no valid row");
            }
        }

        if !self.smooth_queue.is_empty() {
            self.scheduler.start(Task::SmoothNext, Duration::ZERO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thumbnails::testing::{
        archive, directory, image, shown_view, solid, MockGenerator, MockProvider,
    };

    const MS: Duration = Duration::from_millis(1);

    fn url(name: &str) -> Url {
        image(name, 0).url
    }

    fn ready(name: &str, width: u32, height: u32) -> Message {
        Message::ThumbnailReady {
            url: url(name),
            pixmap: solid(width, height),
            full_size: Some(Size::new(width, height)),
        }
    }

    fn submitted(generator: &MockGenerator) -> Vec<Vec<Url>> {
        generator
            .log()
            .submissions
            .iter()
            .map(|(urls, _)| urls.clone())
            .collect()
    }

    #[test]
    fn test_thumbnail_lifecycle_for_image_and_directory() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 10), directory("b")]);
        let a = model.nth(0).unwrap();
        let b = model.nth(1).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator.clone()));

        let (pix, full_size) = view.thumbnail(&model, a).unwrap();
        assert_eq!(&pix, view.waiting_thumbnail());
        assert_eq!(full_size, None);

        view.dispatch(&model, ready("a.jpg", 500, 500));
        assert_eq!(view.take_events(), vec![ViewEvent::Repaint(a)]);

        let (pix, full_size) = view.thumbnail(&model, a).unwrap();
        assert_eq!(pix.size(), Size::square(128));
        assert_eq!(full_size, Some(Size::new(500, 500)));
        assert!(view.cached(&url("a.jpg")).unwrap().rough);
        assert!(view.is_queued_for_smoothing(&url("a.jpg")));

        view.advance(&model, 499 * MS);
        assert!(view.cached(&url("a.jpg")).unwrap().rough);

        view.advance(&model, MS);
        assert!(view.take_events().contains(&ViewEvent::Repaint(a)));
        let (pix, _) = view.thumbnail(&model, a).unwrap();
        assert_eq!(pix.size(), Size::square(128));
        assert!(!view.cached(&url("a.jpg")).unwrap().rough);
        assert!(!view.is_queued_for_smoothing(&url("a.jpg")));

        let (dir_pix, dir_size) = view.thumbnail(&model, b).unwrap();
        assert_eq!(dir_pix.size(), Size::square(128));
        assert_eq!(dir_size, None);
        assert!(view.cached(&directory("b").url).unwrap().waiting_for_thumbnail);
        assert!(generator.log().submissions.is_empty());
    }

    #[test]
    fn test_rapid_scrolling_produces_one_batch() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items((0..10).map(|i| image(&format!("{i}.jpg"), 1)));
        let mut view = shown_view(&model, &generator);

        for i in 1..=5 {
            view.dispatch(&model, Message::Scrolled { x: 0, y: i * 10 });
            view.advance(&model, 100 * MS);
        }
        assert!(generator.log().submissions.is_empty());

        view.advance(&model, 500 * MS);
        let batches = submitted(&generator);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 10);

        view.advance(&model, 5000 * MS);
        assert_eq!(generator.log().submissions.len(), 1);
    }

    #[test]
    fn test_scan_only_covers_viewport_plus_prefetch() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items((0..100).map(|i| image(&format!("{i}.jpg"), 1)));
        let mut view = shown_view(&model, &generator);

        view.advance(&model, 500 * MS);

        // 4 columns; rows at y = 0..576 intersect 400 + 2 * 128 px
        let batches = submitted(&generator);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 20);
        assert_eq!(view.cache_len(), 20);
        assert_eq!(generator.log().submissions[0].1, ThumbnailGroup::Normal);
    }

    #[test]
    fn test_linear_flow_prefetches_half_a_screen() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items((0..30).map(|i| image(&format!("{i}.jpg"), 1)));
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator.clone()));
        view.set_flow(Flow::Linear);
        view.dispatch(&model, Message::Resized { width: 600, height: 200 });
        view.dispatch(&model, Message::Shown);

        view.advance(&model, 500 * MS);

        // cells of 144px starting before x = 900
        assert_eq!(submitted(&generator)[0].len(), 7);
    }

    #[test]
    fn test_hidden_view_does_not_generate() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator.clone()));
        view.dispatch(&model, Message::Resized { width: 600, height: 400 });

        view.advance(&model, 1000 * MS);
        assert!(generator.log().submissions.is_empty());
    }

    #[test]
    fn test_loaded_thumbnails_are_not_requested_again() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1), image("b.jpg", 1)]);
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);
        view.dispatch(&model, ready("a.jpg", 400, 300));
        generator.finish();

        view.dispatch(&model, Message::Scrolled { x: 0, y: 5 });
        view.advance(&model, 500 * MS);

        let batches = submitted(&generator);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], vec![url("b.jpg")]);
    }

    #[test]
    fn test_scrolling_withdraws_pending_requests() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1), image("b.jpg", 1)]);
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);
        assert_eq!(generator.log().pending.len(), 2);

        view.dispatch(&model, Message::Scrolled { x: 0, y: 20 });

        assert!(generator.log().pending.is_empty());
        assert_eq!(generator.log().cancelled.len(), 2);
    }

    #[test]
    fn test_running_job_is_retargeted_and_extended() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1), image("b.jpg", 1)]);
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);

        view.set_thumbnail_size(200);
        view.advance(&model, 500 * MS);

        let log = generator.log();
        assert_eq!(log.submissions.len(), 1);
        assert_eq!(log.retargets, vec![ThumbnailGroup::Large]);
        assert_eq!(log.appended, vec![vec![url("a.jpg"), url("b.jpg")]]);
    }

    #[test]
    fn test_removing_rows_evicts_and_cancels() {
        let generator = MockGenerator::new();
        let mut model = ItemModel::from_items(
            ["a.jpg", "b.jpg", "c.jpg", "d.jpg"].map(|name| image(name, 1)),
        );
        let a = model.nth(0).unwrap();
        let b = model.nth(1).unwrap();
        let c = model.nth(2).unwrap();
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);

        view.dispatch(&model, ready("a.jpg", 500, 500));
        view.dispatch(&model, ready("b.jpg", 500, 500));
        view.thumbnail(&model, a).unwrap();
        view.thumbnail(&model, b).unwrap();
        assert!(view.is_queued_for_smoothing(&url("a.jpg")));

        let event = model.remove(&[a, c]);
        view.dispatch(&model, event.into());

        assert!(view.cached(&url("a.jpg")).is_none());
        assert!(view.cached(&url("c.jpg")).is_none());
        assert!(view.cached(&url("b.jpg")).is_some());
        assert_eq!(view.cache_len(), 2);
        assert!(!view.is_queued_for_smoothing(&url("a.jpg")));
        assert!(view.is_queued_for_smoothing(&url("b.jpg")));

        let log = generator.log();
        assert!(log.cancelled.contains(&url("a.jpg")));
        assert!(log.cancelled.contains(&url("c.jpg")));
        assert!(!log.pending.contains(&url("c.jpg")));
        assert!(log.pending.contains(&url("d.jpg")));
    }

    #[test]
    fn test_late_result_for_removed_row_is_dropped() {
        let generator = MockGenerator::new();
        let mut model = ItemModel::from_items([image("a.jpg", 1)]);
        let a = model.nth(0).unwrap();
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);

        let event = model.remove(&[a]);
        view.dispatch(&model, event.into());
        view.take_events();
        view.dispatch(&model, ready("a.jpg", 64, 64));

        assert_eq!(view.cache_len(), 0);
        assert!(view.take_events().is_empty());
    }

    #[test]
    fn test_full_size_thumbnail_is_never_smoothed() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("small.png", 1)]);
        let row = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        view.thumbnail(&model, row);

        view.dispatch(&model, ready("small.png", 100, 80));
        let (pix, full_size) = view.thumbnail(&model, row).unwrap();

        let thumbnail = view.cached(&url("small.png")).unwrap();
        assert!(pix.ptr_eq(thumbnail.group_pixmap.as_ref().unwrap()));
        assert_eq!(full_size, Some(Size::new(100, 80)));
        assert!(!thumbnail.rough);
        assert!(!view.is_queued_for_smoothing(&url("small.png")));
        assert!(!view.has_pending_tasks());
    }

    #[test]
    fn test_smoothing_yields_to_running_generation() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let row = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator.clone()));
        view.thumbnail(&model, row);
        view.dispatch(&model, ready("a.jpg", 500, 500));
        view.thumbnail(&model, row);
        generator.set_active(true);

        view.advance(&model, 500 * MS);
        assert!(view.is_queued_for_smoothing(&url("a.jpg")));
        assert!(view.cached(&url("a.jpg")).unwrap().rough);
        assert_eq!(view.next_deadline(), Some(1000 * MS));

        view.advance(&model, 500 * MS);
        assert!(view.is_queued_for_smoothing(&url("a.jpg")));

        generator.set_active(false);
        view.advance(&model, 500 * MS);
        assert!(!view.is_queued_for_smoothing(&url("a.jpg")));
        assert!(!view.cached(&url("a.jpg")).unwrap().rough);
    }

    #[test]
    fn test_smoothing_drains_queue_without_further_delay() {
        let generator = MockGenerator::new();
        let names = ["a.jpg", "b.jpg", "c.jpg"];
        let model = ItemModel::from_items(names.map(|name| image(name, 1)));
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        for (position, name) in names.iter().enumerate() {
            let row = model.nth(position).unwrap();
            view.thumbnail(&model, row);
            view.dispatch(&model, ready(name, 300, 200));
            view.thumbnail(&model, row);
        }
        assert_eq!(view.smoothing_queue_len(), 3);
        view.take_events();

        view.advance(&model, 500 * MS);

        assert_eq!(view.smoothing_queue_len(), 0);
        assert_eq!(view.take_events().len(), 3);
        for name in names {
            assert!(!view.cached(&url(name)).unwrap().rough);
        }
        assert!(!view.has_pending_tasks());
    }

    #[test]
    fn test_smoothing_queue_entry_survives_reload_silently() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let row = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator.clone()));
        view.thumbnail(&model, row);
        view.dispatch(&model, ready("a.jpg", 500, 500));
        view.thumbnail(&model, row);
        view.take_events();

        view.reload_thumbnail(&model, row);
        assert!(view.cached(&url("a.jpg")).is_none());
        assert_eq!(generator.log().forgotten, vec![url("a.jpg")]);

        view.advance(&model, 500 * MS);
        assert_eq!(view.smoothing_queue_len(), 0);
        assert!(view.take_events().iter().all(|e| *e != ViewEvent::Repaint(row)));
    }

    #[test]
    fn test_scrolling_forgets_reload_evictions() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let row = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        view.thumbnail(&model, row);
        view.dispatch(&model, ready("a.jpg", 500, 500));
        view.thumbnail(&model, row);
        view.reload_thumbnail(&model, row);
        assert_eq!(view.evicted.len(), 1);

        view.dispatch(&model, Message::Scrolled { x: 0, y: 40 });

        assert_eq!(view.smoothing_queue_len(), 0);
        assert!(view.evicted.is_empty());
    }

    #[test]
    fn test_reload_regenerates_visible_items_immediately() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let row = model.nth(0).unwrap();
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);
        view.dispatch(&model, ready("a.jpg", 500, 500));
        generator.finish();

        view.reload_thumbnail(&model, row);

        assert_eq!(generator.log().submissions.len(), 2);
        assert!(view.cached(&url("a.jpg")).unwrap().waiting_for_thumbnail);
    }

    #[test]
    fn test_metadata_only_change_does_not_regenerate() {
        let generator = MockGenerator::new();
        let mut model = ItemModel::from_items([image("a.jpg", 10)]);
        let row = model.nth(0).unwrap();
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);
        view.dispatch(&model, ready("a.jpg", 500, 500));
        generator.finish();

        let event = model.touch(&[row]);
        view.dispatch(&model, event.into());
        view.advance(&model, 1000 * MS);
        assert_eq!(generator.log().submissions.len(), 1);
        assert!(view.cached(&url("a.jpg")).unwrap().group_pixmap.is_some());

        let event = model.set_modification_time(row, 11).unwrap();
        view.dispatch(&model, event.into());
        let thumbnail = view.cached(&url("a.jpg")).unwrap();
        assert!(thumbnail.group_pixmap.is_none());
        assert!(thumbnail.waiting_for_thumbnail);
        assert_eq!(thumbnail.modification_time, 11);

        view.advance(&model, 500 * MS);
        assert_eq!(generator.log().submissions.len(), 2);
    }

    #[test]
    fn test_generation_failures_fall_back_to_icons() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([
            image("clip.mp4", 1),
            directory("folder"),
            image("broken.jpg", 1),
            archive("bundle.zip"),
        ]);
        let folder_row = model.nth(1).unwrap();
        let broken_row = model.nth(2).unwrap();
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);

        let batches = submitted(&generator);
        assert_eq!(batches.len(), 1);
        assert!(!batches[0].contains(&archive("bundle.zip").url));
        assert!(batches[0].contains(&directory("folder").url));
        assert!(view.cached(&archive("bundle.zip").url).is_none());

        for item in [image("clip.mp4", 1), directory("folder"), image("broken.jpg", 1)] {
            view.dispatch(&model, Message::ThumbnailFailed { item });
        }

        let video = view.cached(&url("clip.mp4")).unwrap();
        assert_eq!(video.group_pixmap, Some(icons::icon(Icon::Video, 128)));
        assert_eq!(video.full_size, Size::square(256));
        assert!(!video.waiting_for_thumbnail);

        let folder = view.cached(&directory("folder").url).unwrap();
        assert!(!folder.waiting_for_thumbnail);
        assert!(folder.group_pixmap.is_none());
        assert!(!view.take_events().contains(&ViewEvent::Repaint(folder_row)));

        let broken = view.cached(&url("broken.jpg")).unwrap();
        assert_eq!(broken.full_size, Size::square(48));
        let (pix, _) = view.thumbnail(&model, broken_row).unwrap();
        assert_eq!(pix, icons::icon(Icon::ImageMissing, 48));
        assert!(!view.is_queued_for_smoothing(&url("broken.jpg")));
    }

    #[test]
    fn test_failed_items_are_not_retried() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("broken.jpg", 1)]);
        let mut view = shown_view(&model, &generator);
        view.advance(&model, 500 * MS);
        view.dispatch(
            &model,
            Message::ThumbnailFailed {
                item: image("broken.jpg", 1),
            },
        );
        generator.finish();

        view.dispatch(&model, Message::Scrolled { x: 0, y: 1 });
        view.advance(&model, 500 * MS);

        assert_eq!(generator.log().submissions.len(), 1);
        assert!(view.cached(&url("broken.jpg")).is_some());
    }

    #[test]
    fn test_archive_thumbnail_is_icon_and_not_waiting() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([archive("bundle.zip")]);
        let row = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));

        let (pix, _) = view.thumbnail(&model, row).unwrap();
        assert_eq!(pix.size(), Size::square(128));
        assert!(!view.cached(&archive("bundle.zip").url).unwrap().waiting_for_thumbnail);
    }

    #[test]
    fn test_modified_documents_bypass_generator() {
        let generator = MockGenerator::new();
        let provider = MockProvider::new();
        provider.set_modified(&url("a.jpg"), true);
        provider.set_preview(solid(64, 48), Some(Size::new(640, 480)));

        let model = ItemModel::from_items([image("a.jpg", 1), image("b.jpg", 1)]);
        let mut view = shown_view(&model, &generator);
        view.set_document_info_provider(Some(Box::new(provider.clone())));
        view.advance(&model, 500 * MS);

        assert_eq!(submitted(&generator), vec![vec![url("b.jpg")]]);
        let thumbnail = view.cached(&url("a.jpg")).unwrap();
        assert_eq!(thumbnail.group_pixmap, Some(solid(64, 48)));
        assert_eq!(thumbnail.real_full_size, Some(Size::new(640, 480)));
        assert!(thumbnail.modification_time > 1);
        assert!(!thumbnail.waiting_for_thumbnail);
        assert_eq!(
            provider.state().preview_requests,
            vec![(url("a.jpg"), ThumbnailGroup::Normal)]
        );
        assert!(view.is_modified(&model, model.nth(0).unwrap()));
        assert!(!view.is_modified(&model, model.nth(1).unwrap()));
    }

    #[test]
    fn test_document_changed_routes_by_modified_state() {
        let generator = MockGenerator::new();
        let provider = MockProvider::new();
        provider.set_preview(solid(32, 32), None);
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let row = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator.clone()));
        view.set_document_info_provider(Some(Box::new(provider.clone())));

        view.dispatch(&model, Message::DocumentChanged { row });
        assert_eq!(submitted(&generator), vec![vec![url("a.jpg")]]);

        provider.set_modified(&url("a.jpg"), true);
        view.dispatch(&model, Message::DocumentChanged { row });
        assert_eq!(generator.log().submissions.len(), 1);
        assert_eq!(
            view.cached(&url("a.jpg")).unwrap().group_pixmap,
            Some(solid(32, 32))
        );
        assert_eq!(view.take_events(), vec![ViewEvent::Repaint(row)]);
    }

    #[test]
    fn test_busy_rows_drive_the_animation() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1), image("b.jpg", 1)]);
        let a = model.nth(0).unwrap();
        let b = model.nth(1).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));

        view.dispatch(&model, Message::BusyStateChanged { row: a, busy: true });
        view.dispatch(&model, Message::BusyStateChanged { row: a, busy: true });
        assert_eq!(view.take_events(), vec![ViewEvent::Repaint(a)]);
        assert!(view.is_busy_animation_running());

        view.advance(&model, 100 * MS);
        assert_eq!(view.busy_frame(), 1);
        assert_eq!(view.take_events(), vec![ViewEvent::Repaint(a)]);

        view.dispatch(&model, Message::BusyStateChanged { row: b, busy: true });
        view.take_events();
        view.advance(&model, 100 * MS);
        assert_eq!(view.busy_frame(), 2);
        assert_eq!(
            view.take_events(),
            vec![ViewEvent::Repaint(a), ViewEvent::Repaint(b)]
        );

        view.dispatch(&model, Message::BusyStateChanged { row: a, busy: false });
        assert!(view.is_busy_animation_running());
        view.dispatch(&model, Message::BusyStateChanged { row: b, busy: false });
        assert!(!view.is_busy_animation_running());
        view.take_events();

        view.advance(&model, 1000 * MS);
        assert!(view.take_events().is_empty());
    }

    #[test]
    fn test_busy_animation_loops() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let a = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        view.dispatch(&model, Message::BusyStateChanged { row: a, busy: true });

        view.advance(&model, 100 * MS * BUSY_FRAME_COUNT as u32);
        assert_eq!(view.busy_frame(), 0);
    }

    #[test]
    fn test_removed_busy_row_stops_animation() {
        let generator = MockGenerator::new();
        let mut model = ItemModel::from_items([image("a.jpg", 1)]);
        let a = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        view.dispatch(&model, Message::BusyStateChanged { row: a, busy: true });

        let event = model.remove(&[a]);
        view.dispatch(&model, event.into());

        assert!(!view.is_busy_animation_running());
        assert_eq!(view.busy_rows().count(), 0);
    }

    #[test]
    fn test_busy_state_of_removed_row_is_ignored() {
        let generator = MockGenerator::new();
        let mut model = ItemModel::from_items([image("a.jpg", 1), image("b.jpg", 1)]);
        let a = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        let event = model.remove(&[a]);
        view.dispatch(&model, event.into());
        view.take_events();

        view.dispatch(&model, Message::BusyStateChanged { row: a, busy: true });
        view.advance(&model, Duration::from_secs(10));

        assert!(!view.is_busy_animation_running());
        assert_eq!(view.busy_rows().count(), 0);
        assert!(view.take_events().is_empty());
    }

    #[test]
    fn test_size_change_invalidates_adjusted_pixmaps() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items([image("a.jpg", 1)]);
        let row = model.nth(0).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        view.thumbnail(&model, row);
        view.dispatch(&model, ready("a.jpg", 500, 500));
        view.thumbnail(&model, row);
        view.take_events();

        view.set_thumbnail_size(200);

        let thumbnail = view.cached(&url("a.jpg")).unwrap();
        assert!(thumbnail.adjusted_pixmap.is_none());
        assert!(thumbnail.group_pixmap.is_some());
        assert_eq!(view.smoothing_queue_len(), 0);
        assert_eq!(view.take_events(), vec![ViewEvent::ThumbnailSizeChanged(200)]);
        assert_eq!(view.waiting_thumbnail().width(), 48);

        view.set_thumbnail_size(200);
        assert!(view.take_events().is_empty());

        let (pix, _) = view.thumbnail(&model, row).unwrap();
        assert_eq!(pix.size(), Size::square(200));

        view.set_thumbnail_size(50);
        assert_eq!(view.waiting_thumbnail().width(), 32);
        view.set_thumbnail_size(10_000);
        assert_eq!(view.thumbnail_size(), 256);
    }

    #[test]
    fn test_wheel_zoom_steps() {
        let generator = MockGenerator::new();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        view.zoom_by_wheel(120);
        assert_eq!(view.thumbnail_size(), 132);
        view.zoom_by_wheel(-120);
        view.zoom_by_wheel(-1);
        assert_eq!(view.thumbnail_size(), 124);
    }

    #[test]
    fn test_compaction_keeps_entries_attached() {
        let generator = MockGenerator::new();
        let mut model = ItemModel::from_items([image("a.jpg", 1), image("b.jpg", 1)]);
        let a = model.nth(0).unwrap();
        let b = model.nth(1).unwrap();
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));
        view.thumbnail(&model, b);
        view.dispatch(&model, Message::BusyStateChanged { row: b, busy: true });

        let removed = model.remove(&[a]);
        view.dispatch(&model, removed.into());
        let compacted = model.compact();
        view.dispatch(&model, compacted.into());

        let new_b = model.nth(0).unwrap();
        assert_ne!(new_b, b);
        assert_eq!(view.cached(&url("b.jpg")).unwrap().row, new_b);
        assert_eq!(view.busy_rows().collect::<Vec<_>>(), vec![new_b]);
        assert!(view.is_busy_animation_running());
    }

    #[test]
    fn test_invalid_row_has_no_thumbnail() {
        let generator = MockGenerator::new();
        let mut model = ItemModel::from_items([image("a.jpg", 1)]);
        let a = model.nth(0).unwrap();
        model.remove(&[a]);
        let mut view = ThumbnailView::new(ViewConfig::default(), Box::new(generator));

        assert!(view.thumbnail(&model, a).is_none());
        assert!(view.thumbnail_for_url(&model, &url("a.jpg")).is_none());
        assert_eq!(view.cache_len(), 0);
    }

    #[test]
    fn test_visible_rows() {
        let generator = MockGenerator::new();
        let model = ItemModel::from_items((0..30).map(|i| image(&format!("{i}.jpg"), 1)));
        let mut view = shown_view(&model, &generator);
        assert_eq!(view.visible_rows(&model).len(), 12);

        // last two rows hold four and two items
        view.dispatch(&model, Message::Scrolled { x: 0, y: 144 * 6 });
        assert_eq!(view.visible_rows(&model).len(), 6);
    }
}
