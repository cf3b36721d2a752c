//! The in-memory image value: pixel data + pixel format + metadata.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// The pixel format of an [`Image`].
///
/// Stored and round-tripped explicitly — it is never silently inferred from
/// the channel count alone. The channel count must agree with the format
/// (`gray` → 1, `rgb` → 3, `rgba` → 4); [`Image::new`] enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Gray,
    Rgb,
    Rgba,
}

impl PixelFormat {
    /// Channel count implied by the format.
    pub fn channels(self) -> u8 {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::Rgb => "rgb",
            Self::Rgba => "rgba",
        }
    }

    /// The native color-mode name the delegate codec uses for this format.
    pub fn native_mode(self) -> &'static str {
        match self {
            Self::Gray => "L",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
        }
    }

    /// Map a native color mode back to a pixel format.
    ///
    /// The table is exhaustive with no default fallthrough: `RGB`, `RGBA`,
    /// and `L` round-trip with [`PixelFormat::native_mode`]; palette-indexed
    /// `P` collapses to `Gray` (accepted as lossy, decode-only). Anything
    /// else is [`Error::UnsupportedPixelMode`].
    pub fn from_native_mode(mode: &str) -> Result<Self> {
        match mode {
            "RGB" => Ok(Self::Rgb),
            "RGBA" => Ok(Self::Rgba),
            "L" | "P" => Ok(Self::Gray),
            other => Err(Error::UnsupportedPixelMode(other.to_string())),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rectangular array of 8-bit samples, row-major, shape `(height, width,
/// channels)` with 1, 3, or 4 interleaved channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelArray {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl PixelArray {
    /// Build a pixel array, validating the channel count and buffer length.
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(Error::ChannelCount(channels));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// An image together with its metadata — the unit this crate reads and
/// writes.
///
/// Immutable once constructed: operations that need a changed value build a
/// new one. Metadata is a map from string keys to arbitrary JSON values;
/// insertion order is preserved for deterministic round-trips.
///
/// # Example
///
/// ```rust
/// use immio::{Image, PixelArray, PixelFormat};
/// use serde_json::{Map, Value};
///
/// let pixels = PixelArray::new(2, 2, 3, vec![0u8; 12])?;
/// let mut meta = Map::new();
/// meta.insert("lens".into(), Value::String("50mm".into()));
///
/// let imm = Image::new(pixels, PixelFormat::Rgb, meta)?;
/// assert_eq!(imm.pixel_format(), PixelFormat::Rgb);
/// # Ok::<(), immio::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pixels: PixelArray,
    pixel_format: PixelFormat,
    meta: Map<String, Value>,
}

impl Image {
    /// Build an image, checking that the buffer's channel count matches the
    /// declared pixel format.
    pub fn new(
        pixels: PixelArray,
        pixel_format: PixelFormat,
        meta: Map<String, Value>,
    ) -> Result<Self> {
        if pixels.channels() != pixel_format.channels() {
            return Err(Error::ChannelMismatch {
                format: pixel_format.as_str(),
                expected: pixel_format.channels(),
                actual: pixels.channels(),
            });
        }
        Ok(Self {
            pixels,
            pixel_format,
            meta,
        })
    }

    pub fn pixels(&self) -> &PixelArray {
        &self.pixels
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    pub fn meta(&self) -> &Map<String, Value> {
        &self.meta
    }

    pub fn into_parts(self) -> (PixelArray, PixelFormat, Map<String, Value>) {
        (self.pixels, self.pixel_format, self.meta)
    }
}
