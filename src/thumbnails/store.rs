//! Persistent thumbnail store with disk and memory layers.
//!
//! - Disk: PNG files in `XDG_CACHE_HOME/thumbview/thumbnails/{normal,large}/`
//! - Memory: LRU of decoded pixmaps bounded by an estimated byte budget
//!
//! Filenames are the xxh3 of (url + mtime + group), so a changed file simply
//! misses and gets rendered again.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::group::ThumbnailGroup;
use super::pixmap::{Pixmap, Size};
use super::render::{RenderedThumbnail, ThumbnailRenderer};
use crate::error::LoadError;
use crate::image_loader;
use crate::models::{Item, ItemKind};

/// Default memory layer budget in MB.
pub const DEFAULT_MAX_MEMORY_MB: usize = 128;

/// Minimum memory layer budget in MB.
const MIN_MEMORY_MB: usize = 16;

/// Maximum memory layer budget in MB.
const MAX_MEMORY_MB: usize = 512;

/// RGBA8.
const BYTES_PER_PIXEL: usize = 4;

/// Bump when rendering semantics change.
const STORE_VERSION: u8 = 1;

/// Entry cap for the LRU; the byte budget normally evicts first.
const LRU_CAPACITY: usize = 4096;

/// Store lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey {
    /// xxh3 of version, url, mtime and group size.
    hash: u64,
    /// Resolution, which also picks the subdirectory.
    group: ThumbnailGroup,
}

impl StoreKey {
    pub fn new(item: &Item, group: ThumbnailGroup) -> Self {
        let url = item.url.as_str();
        let mut data = Vec::with_capacity(url.len() + 13);
        data.push(STORE_VERSION);
        data.extend_from_slice(url.as_bytes());
        data.extend_from_slice(&item.mtime.to_le_bytes());
        data.extend_from_slice(&group.pixel_size().to_le_bytes());
        Self {
            hash: xxh3_64(&data),
            group,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{:016x}.png", self.hash)
    }
}

#[derive(Clone)]
/// Cached thumbnail with its byte cost.
struct MemoryEntry {
    thumbnail: RenderedThumbnail,
    /// Pixel bytes held by `thumbnail`.
    bytes: usize,
}

struct MemoryLayer {
    entries: LruCache<StoreKey, MemoryEntry>,
    /// Sum of entry sizes.
    bytes: usize,
}

/// Thumbnail store shared by the loader workers. Clones share the memory layer.
#[derive(Clone)]
pub struct ThumbnailStore {
    /// Directory holding the `normal/` and `large/` subdirectories.
    root: PathBuf,
    /// Memory layer budget.
    max_memory_bytes: usize,
    /// LRU of decoded thumbnails, shared between clones.
    memory: Arc<Mutex<MemoryLayer>>,
}

impl ThumbnailStore {
    pub fn new(root: PathBuf, max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);

        for group in ThumbnailGroup::ALL {
            let dir = root.join(group.dir_name());
            if let Err(e) = fs::create_dir_all(&dir) {
                warn!(?dir, error = ?e, "Failed to create thumbnail directory");
            }
        }
        debug!(?root, max_memory_mb, "Opened thumbnail store");

        let capacity = NonZeroUsize::new(LRU_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            root,
            max_memory_bytes: max_memory_mb * 1024 * 1024,
            memory: Arc::new(Mutex::new(MemoryLayer {
                entries: LruCache::new(capacity),
                bytes: 0,
            })),
        }
    }

    /// Open the store in the user's cache directory.
    pub fn open_default(max_memory_mb: usize) -> Result<Self> {
        Ok(Self::new(Self::default_root()?, max_memory_mb))
    }

    pub fn default_root() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "thumbview")
            .context("Failed to determine project directories")?;
        Ok(dirs.cache_dir().join("thumbnails"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn disk_path(&self, key: &StoreKey) -> PathBuf {
        self.root.join(key.group.dir_name()).join(key.file_name())
    }

    /// Thumbnail of `item` at `group` resolution: memory first, then disk,
    /// rendering and persisting it on a miss.
    pub fn get_or_render(&self, item: &Item, group: ThumbnailGroup) -> Result<RenderedThumbnail> {
        let key = StoreKey::new(item, group);

        if let Some(entry) = self.memory.lock().entries.get(&key) {
            trace!(url = %item.url, "Memory hit");
            return Ok(entry.thumbnail.clone());
        }

        let disk_path = self.disk_path(&key);
        if disk_path.exists() {
            match self.load_from_disk(item, &disk_path) {
                Ok(thumbnail) => {
                    trace!(url = %item.url, "Disk hit");
                    self.remember(key, thumbnail.clone());
                    return Ok(thumbnail);
                }
                Err(e) => {
                    warn!(?disk_path, error = ?e, "Dropping unreadable stored thumbnail");
                    let _ = fs::remove_file(&disk_path);
                }
            }
        }

        debug!(url = %item.url, ?group, "Store miss, rendering thumbnail");
        let thumbnail = render(item, group)?;
        if let Err(e) = self.persist(&disk_path, &thumbnail.pixmap) {
            warn!(?disk_path, error = ?e, "Failed to persist thumbnail");
        }
        self.remember(key, thumbnail.clone());
        Ok(thumbnail)
    }

    /// Drop every stored resolution of `item`. Returns whether anything was removed.
    pub fn remove(&self, item: &Item) -> bool {
        let mut removed = false;
        for group in ThumbnailGroup::ALL {
            let key = StoreKey::new(item, group);
            {
                let mut memory = self.memory.lock();
                if let Some(entry) = memory.entries.pop(&key) {
                    memory.bytes = memory.bytes.saturating_sub(entry.bytes);
                    removed = true;
                }
            }
            let disk_path = self.disk_path(&key);
            if disk_path.exists() {
                removed |= fs::remove_file(&disk_path).is_ok();
            }
        }
        if removed {
            debug!(url = %item.url, "Removed stored thumbnails");
        }
        removed
    }

    pub fn clear_memory(&self) {
        let mut memory = self.memory.lock();
        memory.entries.clear();
        memory.bytes = 0;
        debug!("Cleared thumbnail memory layer");
    }

    pub fn memory_usage(&self) -> usize {
        self.memory.lock().bytes
    }

    pub fn memory_entry_count(&self) -> usize {
        self.memory.lock().entries.len()
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }

    fn load_from_disk(&self, item: &Item, disk_path: &Path) -> Result<RenderedThumbnail> {
        let bytes = fs::read(disk_path).with_context(|| format!("reading {disk_path:?}"))?;
        let pixmap = ThumbnailRenderer::decode_png(&bytes)
            .with_context(|| format!("decoding {disk_path:?}"))?;
        Ok(RenderedThumbnail {
            pixmap,
            full_size: full_size_of(item),
        })
    }

    fn persist(&self, disk_path: &Path, pixmap: &Pixmap) -> Result<()> {
        let bytes = ThumbnailRenderer::encode_png(pixmap).context("encoding thumbnail")?;
        let tmp = disk_path.with_extension("png.tmp");
        fs::write(&tmp, bytes).with_context(|| format!("writing {tmp:?}"))?;
        fs::rename(&tmp, disk_path).with_context(|| format!("renaming {tmp:?}"))?;
        Ok(())
    }

    fn remember(&self, key: StoreKey, thumbnail: RenderedThumbnail) {
        let size = thumbnail.pixmap.size();
        let bytes = size.width as usize * size.height as usize * BYTES_PER_PIXEL;
        let mut memory = self.memory.lock();

        while memory.bytes + bytes > self.max_memory_bytes {
            let Some((_, evicted)) = memory.entries.pop_lru() else {
                break;
            };
            memory.bytes = memory.bytes.saturating_sub(evicted.bytes);
            trace!(
                evicted_bytes = evicted.bytes,
                current_bytes = memory.bytes,
                "Evicted thumbnail from memory"
            );
        }

        if let Some((_, replaced)) = memory.entries.push(key, MemoryEntry { thumbnail, bytes }) {
            memory.bytes = memory.bytes.saturating_sub(replaced.bytes);
        }
        memory.bytes += bytes;
    }
}

fn render(item: &Item, group: ThumbnailGroup) -> Result<RenderedThumbnail, LoadError> {
    let path = item.url.to_file_path().ok_or_else(|| LoadError::NotLocal {
        url: item.url.clone(),
    })?;
    match item.kind {
        ItemKind::Directory => ThumbnailRenderer::render_directory(&path, group),
        ItemKind::Archive => Err(LoadError::Unsupported { what: "archive" }),
        ItemKind::File if item.is_video() => Err(LoadError::Unsupported { what: "video" }),
        ItemKind::File => ThumbnailRenderer::render(&path, group),
    }
}

/// Full image size for a thumbnail read back from disk.
fn full_size_of(item: &Item) -> Option<Size> {
    if item.kind != ItemKind::File {
        return None;
    }
    let path = item.url.to_file_path()?;
    image_loader::read_dimensions(&path)
        .map_err(|e| trace!(?path, error = %e, "Cannot read image dimensions"))
        .ok()
}
