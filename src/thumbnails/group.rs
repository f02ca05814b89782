/// Standard thumbnail resolutions, independent of the on-screen size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThumbnailGroup {
    Normal,
    Large,
}

impl ThumbnailGroup {
    pub const fn pixel_size(self) -> u32 {
        match self {
            Self::Normal => 128,
            Self::Large => 256,
        }
    }

    /// Smallest group whose resolution covers `size`.
    pub fn from_pixel_size(size: u32) -> Self {
        if size <= Self::Normal.pixel_size() {
            Self::Normal
        } else {
            Self::Large
        }
    }

    /// Directory name used by the on-disk store.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Large => "large",
        }
    }

    pub const ALL: [ThumbnailGroup; 2] = [Self::Normal, Self::Large];
}
