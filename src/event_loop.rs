//! Real-time driver for a `ThumbnailView`.
//!
//! Wall-clock time since the loop started is mapped onto the view's logical
//! clock. Generator results are awaited on a flume channel and dispatched to
//! the view as they arrive; repaint requests are "painted" by asking the view
//! for the row's pixmap, which is what feeds the smoothing queue.

use std::time::{Duration, Instant};

use flume::Receiver;
use tracing::{debug, trace, warn};

use crate::models::{ItemModel, RowId};
use crate::thumbnails::{GeneratorEvent, Message, ThumbnailView, ViewEvent};

/// Upper bound on a single wait when no timer is due.
const IDLE_WAIT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ready: usize,
    pub failed: usize,
    pub repaints: usize,
    /// Whether every timer and generation request was drained before the limit.
    pub settled: bool,
}

enum Wake {
    Event(GeneratorEvent),
    Disconnected,
    Timer,
}

pub struct EventLoop {
    view: ThumbnailView,
    model: ItemModel,
    events: Receiver<GeneratorEvent>,
    origin: Instant,
}

impl EventLoop {
    pub fn new(view: ThumbnailView, model: ItemModel, events: Receiver<GeneratorEvent>) -> Self {
        let origin = Instant::now()
            .checked_sub(view.now())
            .unwrap_or_else(Instant::now);
        Self {
            view,
            model,
            events,
            origin,
        }
    }

    pub fn view(&self) -> &ThumbnailView {
        &self.view
    }

    pub fn model(&self) -> &ItemModel {
        &self.model
    }

    pub fn dispatch(&mut self, message: Message) {
        self.view.dispatch(&self.model, message);
    }

    pub fn into_parts(self) -> (ThumbnailView, ItemModel) {
        (self.view, self.model)
    }

    /// Paint the visible rows, then keep feeding results and timers to the
    /// view until nothing is left to do or `limit` has passed.
    pub async fn run_until_settled(&mut self, limit: Duration) -> RunStats {
        let give_up = Instant::now() + limit;
        let mut stats = RunStats::default();

        for row in self.view.visible_rows(&self.model) {
            self.paint(row, &mut stats);
        }

        loop {
            self.sync_clock();
            self.flush_events(&mut stats);

            if self.is_settled() {
                stats.settled = true;
                break;
            }
            let now = Instant::now();
            if now >= give_up {
                warn!(?limit, "Thumbnail view did not settle in time");
                break;
            }

            let wait = self
                .view
                .next_deadline()
                .map(|deadline| deadline.saturating_sub(self.origin.elapsed()))
                .unwrap_or(IDLE_WAIT)
                .min(give_up - now);

            let events = self.events.clone();
            let wake = tokio::select! {
                event = events.recv_async() => match event {
                    Ok(event) => Wake::Event(event),
                    Err(_) => Wake::Disconnected,
                },
                _ = tokio::time::sleep(wait) => Wake::Timer,
            };

            match wake {
                Wake::Event(event) => {
                    self.sync_clock();
                    self.deliver(event, &mut stats);
                    // Take whatever else finished meanwhile
                    while let Ok(event) = self.events.try_recv() {
                        self.deliver(event, &mut stats);
                    }
                }
                Wake::Disconnected => {
                    warn!("Thumbnail generator disconnected");
                    self.sync_clock();
                    self.flush_events(&mut stats);
                    break;
                }
                Wake::Timer => trace!("Timer wake-up"),
            }
        }

        debug!(
            ready = stats.ready,
            failed = stats.failed,
            repaints = stats.repaints,
            settled = stats.settled,
            "Event loop finished"
        );
        stats
    }

    fn sync_clock(&mut self) {
        self.view.run_until(&self.model, self.origin.elapsed());
    }

    fn is_settled(&self) -> bool {
        !self.view.has_pending_tasks()
            && !self.view.generator().is_active()
            && self.events.is_empty()
    }

    fn deliver(&mut self, event: GeneratorEvent, stats: &mut RunStats) {
        match &event {
            GeneratorEvent::Ready { .. } => stats.ready += 1,
            GeneratorEvent::Failed { item, error } => {
                debug!(url = %item.url, %error, "Thumbnail failed");
                stats.failed += 1;
            }
        }
        self.view.dispatch(&self.model, event.into());
    }

    fn flush_events(&mut self, stats: &mut RunStats) {
        loop {
            let events = self.view.take_events();
            if events.is_empty() {
                return;
            }
            for event in events {
                match event {
                    ViewEvent::Repaint(row) => self.paint(row, stats),
                    ViewEvent::ThumbnailSizeChanged(size) => {
                        debug!(size, "Repainting after size change");
                        for row in self.view.visible_rows(&self.model) {
                            self.paint(row, stats);
                        }
                    }
                }
            }
        }
    }

    fn paint(&mut self, row: RowId, stats: &mut RunStats) {
        if self.view.thumbnail(&self.model, row).is_some() {
            stats.repaints += 1;
        }
    }
}
