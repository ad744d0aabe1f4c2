use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc;

use image::RgbaImage;

/// Extensions `decode_image` understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// tEXt keyword carrying the document title in exported PNGs.
pub const TITLE_KEYWORD: &str = "Title";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum ImageIoError {
    Io(std::io::Error),
    Decode(String),
    Encode(String),
    /// Decoded fine but has zero width or height.
    EmptyImage,
}

impl std::fmt::Display for ImageIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageIoError::Io(e) => write!(f, "I/O error: {}", e),
            ImageIoError::Decode(e) => write!(f, "Could not decode image: {}", e),
            ImageIoError::Encode(e) => write!(f, "Could not encode PNG: {}", e),
            ImageIoError::EmptyImage => write!(f, "Image has no pixels"),
        }
    }
}

impl std::error::Error for ImageIoError {}

impl From<std::io::Error> for ImageIoError {
    fn from(e: std::io::Error) -> Self {
        ImageIoError::Io(e)
    }
}

impl From<image::ImageError> for ImageIoError {
    fn from(e: image::ImageError) -> Self {
        ImageIoError::Decode(e.to_string())
    }
}

impl From<png::EncodingError> for ImageIoError {
    fn from(e: png::EncodingError) -> Self {
        ImageIoError::Encode(e.to_string())
    }
}

// ============================================================================
// DECODE
// ============================================================================

pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Decode any supported format to 8-bit RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageIoError> {
    let img = image::load_from_memory(bytes)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(ImageIoError::EmptyImage);
    }
    Ok(img)
}

pub fn load_image_file(path: &Path) -> Result<RgbaImage, ImageIoError> {
    let bytes = fs::read(path)?;
    decode_image(&bytes)
}

/// Decode on a rayon worker; the result arrives on the returned channel.
/// The caller applies it to the project on its own thread.
pub fn spawn_decode(bytes: Vec<u8>) -> mpsc::Receiver<Result<RgbaImage, ImageIoError>> {
    let (tx, rx) = mpsc::channel();
    rayon::spawn(move || {
        let result = decode_image(&bytes);
        if let Err(e) = &result {
            crate::log_warn!("io: background decode failed: {}", e);
        }
        let _ = tx.send(result);
    });
    rx
}

/// Title stored in a PNG's tEXt chunk by `encode_png`, if any.
pub fn read_png_title(bytes: &[u8]) -> Option<String> {
    let reader = png::Decoder::new(bytes).read_info().ok()?;
    reader
        .info()
        .uncompressed_latin1_text
        .iter()
        .find(|chunk| chunk.keyword == TITLE_KEYWORD)
        .map(|chunk| chunk.text.clone())
}

// ============================================================================
// ENCODE
// ============================================================================

/// Flattened PNG of `image`, optionally tagged with `title`.
pub fn encode_png(image: &RgbaImage, title: Option<&str>) -> Result<Vec<u8>, ImageIoError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ImageIoError::EmptyImage);
    }
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width(), image.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
            encoder.add_text_chunk(TITLE_KEYWORD.to_string(), latin1_safe(title))?;
        }
        let mut writer = encoder.write_header()?;
        writer.write_image_data(image.as_raw())?;
        writer.finish()?;
    }
    Ok(out)
}

/// tEXt chunks are Latin-1; anything outside it becomes '?'.
fn latin1_safe(s: &str) -> String {
    s.chars()
        .map(|c| if (c as u32) < 256 && !c.is_control() { c } else { '?' })
        .collect()
}

pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ImageIoError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

/// Download filename for a document title: unsafe characters become `_`,
/// `.png` is appended unless already present, blank titles give
/// `untitled.png`.
pub fn suggested_filename(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        return "untitled.png".to_string();
    }
    if cleaned.to_ascii_lowercase().ends_with(".png") {
        cleaned.to_string()
    } else {
        format!("{}.png", cleaned)
    }
}
