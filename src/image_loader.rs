use std::io::Cursor;
use std::path::Path;

use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::LoadError;
use crate::thumbnails::pixmap::Size;

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_error(path: &Path) -> impl FnOnce(image::ImageError) -> LoadError + '_ {
    move |source| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    }
}

/// Decode an image file. Animated GIFs yield their first frame.
pub fn open_image(path: &Path) -> Result<DynamicImage, LoadError> {
    let bytes = read_bytes(path)?;
    let format = image::guess_format(&bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(decode_error(path))?;
        let frame = decoder
            .into_frames()
            .next()
            .ok_or_else(|| LoadError::NoFrames {
                path: path.to_path_buf(),
            })?
            .map_err(decode_error(path))?;
        return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(&bytes, fmt),
        None => image::load_from_memory(&bytes),
    }
    .map_err(decode_error(path))
}

/// Read the pixel size of an image file without decoding it fully.
pub fn read_dimensions(path: &Path) -> Result<Size, LoadError> {
    let bytes = read_bytes(path)?;
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .into_dimensions()
        .map_err(decode_error(path))?;
    Ok(Size::new(width, height))
}
