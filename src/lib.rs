//! Thumbnail cache and scheduler for an image browser's thumbnail grid.
//!
//! This crate provides:
//! - `ThumbnailView` - Per-URL thumbnail cache with debounced generation and progressive smoothing
//! - `ItemModel` - Arena-backed item source with generation-checked row handles
//! - `ThumbnailLoader` - Threaded thumbnail generator backed by a disk + memory store
//! - `EventLoop` - Real-time driver feeding generator results and timers into the view

pub mod config;
pub mod error;
pub mod event_loop;
pub mod image_loader;
pub mod layout;
pub mod models;
pub mod scheduler;
pub mod thumbnails;

pub use config::ViewConfig;
pub use error::LoadError;
pub use event_loop::EventLoop;
pub use models::{Item, ItemKind, ItemModel, ModelEvent, RowId, Url};
pub use thumbnails::view::ThumbnailView;
