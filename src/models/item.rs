use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

const FILE_SCHEME: &str = "file://";

/// Identity of a displayed item.
///
/// Cheap to clone; the thumbnail cache, smoothing queue and generator all key on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Url(Arc<str>);

impl Url {
    pub fn new(url: impl Into<Arc<str>>) -> Self {
        Self(url.into())
    }

    /// Build a `file://` url for a local path.
    pub fn from_path(path: &Path) -> Self {
        Self(format!("{FILE_SCHEME}{}", path.to_string_lossy()).into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local path for `file://` urls.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix(FILE_SCHEME).map(PathBuf::from)
    }

    fn extension(&self) -> Option<String> {
        let name = self.0.rsplit('/').next()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Url {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    File,
    Directory,
    Archive,
}

impl ItemKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "zip" | "tar" | "tgz" | "gz" | "bz2" | "xz" | "7z" | "rar" | "cbz" => Self::Archive,
            _ => Self::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub url: Url,
    /// Modification time in seconds since the epoch.
    pub mtime: i64,
    pub kind: ItemKind,
}

impl Item {
    pub fn new(url: impl Into<Url>, mtime: i64, kind: ItemKind) -> Self {
        Self {
            url: url.into(),
            mtime,
            kind,
        }
    }

    /// Create an item from filesystem metadata.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let kind = if metadata.is_dir() {
            ItemKind::Directory
        } else {
            path.extension()
                .and_then(|e| e.to_str())
                .map(ItemKind::from_extension)
                .unwrap_or(ItemKind::File)
        };

        Ok(Self::new(Url::from_path(path), mtime, kind))
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ItemKind::Directory
    }

    pub fn is_archive(&self) -> bool {
        self.kind == ItemKind::Archive
    }

    /// Check if this is a video file based on its extension.
    pub fn is_video(&self) -> bool {
        self.kind == ItemKind::File
            && matches!(
                self.url.extension().as_deref(),
                Some("mp4" | "webm" | "mkv" | "avi" | "mov")
            )
    }
}

impl From<String> for Url {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}
