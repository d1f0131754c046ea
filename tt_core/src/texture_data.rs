//! Decoded texture pixel data.
//!
//! `TextureData` is the CPU-side result of decoding an image file: a tightly
//! packed pixel buffer plus its dimensions and format. Decoding goes through
//! the `image` crate; 16-bit and float sources are narrowed to RGBA8.

use std::fmt;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use image::ColorType;
use serde::{Deserialize, Serialize};

use crate::asset_cache::Asset;
use crate::hash::Hash32;

/// Pixel layouts a texture buffer can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit luminance.
    L8,
    /// 8-bit luminance + alpha.
    La8,
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::L8 => 1,
            PixelFormat::La8 => 2,
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// Decoded pixels keyed by the hash of their source filename.
pub struct TextureData {
    id: Hash32,
    filename: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Box<[u8]>,
    loaded_at: DateTime<Utc>,
}

impl TextureData {
    /// Wraps an already decoded buffer. The length must match the dimensions.
    pub fn from_raw(
        filename: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            bail!(
                "texture {filename}: {width}x{height} {format:?} needs {expected} bytes, got {}",
                pixels.len()
            );
        }
        Ok(Self {
            id: Hash32::from_filename(filename),
            filename: filename.to_string(),
            width,
            height,
            format,
            pixels: pixels.into_boxed_slice(),
            loaded_at: Utc::now(),
        })
    }

    /// Decodes the image at `path`. `filename` is the cache-facing name.
    pub fn load(path: &Path, filename: &str) -> anyhow::Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("decode texture {}", path.display()))?;

        let (format, (width, height), pixels) = match image.color() {
            ColorType::L8 => {
                let buf = image.into_luma8();
                (PixelFormat::L8, buf.dimensions(), buf.into_raw())
            }
            ColorType::La8 => {
                let buf = image.into_luma_alpha8();
                (PixelFormat::La8, buf.dimensions(), buf.into_raw())
            }
            ColorType::Rgb8 => {
                let buf = image.into_rgb8();
                (PixelFormat::Rgb8, buf.dimensions(), buf.into_raw())
            }
            _ => {
                let buf = image.into_rgba8();
                (PixelFormat::Rgba8, buf.dimensions(), buf.into_raw())
            }
        };

        Self::from_raw(filename, width, height, format, pixels)
    }

    pub fn id(&self) -> Hash32 {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Bytes of pixel row `y`, if in range.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.width as usize * self.bytes_per_pixel();
        let start = y as usize * stride;
        self.pixels.get(start..start + stride)
    }
}

impl Asset for TextureData {
    type Id = Hash32;

    fn asset_id(&self) -> &Hash32 {
        &self.id
    }
}

impl fmt::Debug for TextureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureData")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn from_raw_checks_buffer_length() {
        let tex = TextureData::from_raw("a.png", 2, 2, PixelFormat::Rgb8, vec![0; 12]).unwrap();
        assert_eq!(tex.byte_size(), 12);
        assert_eq!(tex.bytes_per_pixel(), 3);
        assert_eq!(tex.id(), Hash32::from_filename("a.png"));

        let err =
            TextureData::from_raw("b.png", 2, 2, PixelFormat::Rgba8, vec![0; 12]).unwrap_err();
        assert!(err.to_string().contains("needs 16 bytes"));
    }

    #[test]
    fn rows_are_sliced_by_stride() {
        let pixels = (0u8..6).collect::<Vec<_>>();
        let tex = TextureData::from_raw("r.png", 3, 2, PixelFormat::L8, pixels).unwrap();
        assert_eq!(tex.row(0), Some(&[0u8, 1, 2][..]));
        assert_eq!(tex.row(1), Some(&[3u8, 4, 5][..]));
        assert_eq!(tex.row(2), None);
    }

    #[test]
    fn load_keeps_source_channel_layout() {
        let dir = TempDir::new().unwrap();

        let rgba = dir.path().join("rgba.png");
        RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])).save(&rgba).unwrap();
        let tex = TextureData::load(&rgba, "rgba.png").unwrap();
        assert_eq!((tex.width(), tex.height()), (3, 2));
        assert_eq!(tex.format(), PixelFormat::Rgba8);
        assert_eq!(&tex.pixels()[..4], &[1, 2, 3, 4]);

        let rgb = dir.path().join("rgb.png");
        RgbImage::from_pixel(1, 1, Rgb([9, 8, 7])).save(&rgb).unwrap();
        let tex = TextureData::load(&rgb, "rgb.png").unwrap();
        assert_eq!(tex.format(), PixelFormat::Rgb8);
        assert_eq!(tex.pixels(), &[9, 8, 7]);

        let gray = dir.path().join("gray.png");
        GrayImage::from_pixel(2, 2, Luma([200])).save(&gray).unwrap();
        let tex = TextureData::load(&gray, "gray.png").unwrap();
        assert_eq!(tex.format(), PixelFormat::L8);
        assert_eq!(tex.byte_size(), 4);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = TextureData::load(&dir.path().join("nope.png"), "nope.png").unwrap_err();
        assert!(format!("{err:#}").contains("decode texture"));
    }
}
