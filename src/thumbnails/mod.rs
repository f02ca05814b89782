//! Thumbnail pipeline for the grid view.
//!
//! This module provides:
//! - `ThumbnailView` - Per-url cache, debounced generation and progressive smoothing
//! - `ThumbnailGenerator` - Contract for asynchronous thumbnail producers
//! - `ThumbnailLoader` - Worker-pool generator backed by `ThumbnailStore`
//! - `ThumbnailStore` - Disk and memory storage with LRU eviction

pub mod document_info;
pub mod drag;
pub mod entry;
pub mod generator;
pub mod group;
pub mod icons;
pub mod loader;
pub mod message;
pub mod pixmap;
pub mod render;
pub mod smooth_queue;
pub mod store;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use document_info::DocumentInfoProvider;
pub use entry::Thumbnail;
pub use generator::{GeneratorEvent, ThumbnailGenerator};
pub use group::ThumbnailGroup;
pub use loader::{ThumbnailLoader, ThumbnailLoaderBuilder};
pub use message::{Message, ViewEvent};
pub use pixmap::{Pixmap, Size, Transformation};
pub use store::ThumbnailStore;
pub use view::ThumbnailView;
