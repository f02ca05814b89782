use std::path::PathBuf;

use thiserror::Error;

use crate::models::Url;

/// Failure to produce a thumbnail for a single item.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("animation has no frames: {path:?}")]
    NoFrames { path: PathBuf },

    #[error("image has zero size: {path:?}")]
    EmptyImage { path: PathBuf },

    #[error("{url} is not a local file")]
    NotLocal { url: Url },

    #[error("{what} thumbnails are not supported")]
    Unsupported { what: &'static str },

    #[error("no previewable image in {path:?}")]
    EmptyDirectory { path: PathBuf },
}
