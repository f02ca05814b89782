//! View configuration with environment overrides.

use std::time::Duration;

use tracing::warn;

use crate::layout::Flow;

/// Smallest thumbnail size the view accepts.
pub const MIN_THUMBNAIL_SIZE: u32 = 48;

/// Largest thumbnail size the view accepts.
pub const MAX_THUMBNAIL_SIZE: u32 = 256;

/// Size used until the user zooms.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 128;

/// Debounce window before generating thumbnails for visible items.
const DEFAULT_GENERATION_DELAY_MS: u64 = 500;

/// How long to wait before starting to smooth thumbnails.
const DEFAULT_SMOOTH_DELAY_MS: u64 = 500;

/// Duration of one busy animation frame.
const DEFAULT_BUSY_FRAME_MS: u64 = 100;

/// Padding around each thumbnail inside its grid cell.
const DEFAULT_ITEM_MARGIN: u32 = 8;

#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// Displayed thumbnail size in pixels.
    pub thumbnail_size: u32,
    /// Debounce window before visible items are generated.
    pub generation_delay: Duration,
    /// Delay before smoothing starts, and between batches while generating.
    pub smooth_delay: Duration,
    /// Duration of one busy animation frame.
    pub busy_frame_interval: Duration,
    /// Padding around each thumbnail inside its grid cell.
    pub item_margin: u32,
    /// How items flow across the viewport.
    pub flow: Flow,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            generation_delay: Duration::from_millis(DEFAULT_GENERATION_DELAY_MS),
            smooth_delay: Duration::from_millis(DEFAULT_SMOOTH_DELAY_MS),
            busy_frame_interval: Duration::from_millis(DEFAULT_BUSY_FRAME_MS),
            item_margin: DEFAULT_ITEM_MARGIN,
            flow: Flow::default(),
        }
    }
}

impl ViewConfig {
    /// Defaults overridden by `THUMBVIEW_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = env_u64("THUMBVIEW_THUMB_SIZE") {
            config.thumbnail_size = clamp_thumbnail_size(size as u32);
        }
        if let Some(ms) = env_u64("THUMBVIEW_GENERATION_DELAY_MS") {
            config.generation_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("THUMBVIEW_SMOOTH_DELAY_MS") {
            config.smooth_delay = Duration::from_millis(ms);
        }
        if let Some(flow) = std::env::var("THUMBVIEW_FLOW").ok().as_deref().and_then(Flow::parse) {
            config.flow = flow;
        }
        config
    }
}

pub fn clamp_thumbnail_size(size: u32) -> u32 {
    size.clamp(MIN_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE)
}

fn env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Some(v),
        _ => {
            warn!(name, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}
