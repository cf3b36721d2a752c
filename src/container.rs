//! The hierarchical-container collaborator.
//!
//! The core only depends on the narrow [`ContainerStore`] contract: load an
//! image with its metadata from a path, save one honoring permission bits
//! and the delayed-write flag, and encode/decode in memory. [`ImmStore`] is
//! the bundled implementation — a small self-describing `.imm` file with a
//! JSON header (pixel format + metadata stored natively, so numbers stay
//! numbers) followed by a PNG-encoded pixel block. The delegate codec is
//! fixed as the inner pixel codec.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{self, CodecHints};
use crate::context::IoContext;
use crate::error::{Error, Result};
use crate::imm::{Image, PixelFormat};
use crate::storage::{self, WriteOutcome};

const IMM_MAGIC: &[u8; 4] = b"IMM\x01";
const INNER_CODEC: &str = "png";

/// Narrow contract the orchestration layer requires from a hierarchical
/// container implementation.
#[async_trait]
pub trait ContainerStore {
    /// Load an image with metadata through the container's own structured
    /// reader.
    async fn load(&self, path: &Path, ctx: &IoContext) -> Result<Image>;

    /// Save an image with metadata, passing permission bits and the
    /// delayed-write flag through to storage.
    async fn save(
        &self,
        image: &Image,
        path: &Path,
        file_mode: Option<u32>,
        delayed: bool,
        ctx: &IoContext,
    ) -> Result<WriteOutcome>;

    /// Encode to an in-memory container (the sentinel path uses this).
    fn encode(&self, image: &Image) -> Result<Vec<u8>>;

    /// Decode an in-memory container.
    fn decode(&self, bytes: &[u8]) -> Result<Image>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ImmHeader {
    pixel_format: PixelFormat,
    meta: Map<String, Value>,
    codec: String,
}

/// The bundled `.imm` container implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmStore;

#[async_trait]
impl ContainerStore for ImmStore {
    async fn load(&self, path: &Path, ctx: &IoContext) -> Result<Image> {
        let bytes = storage::read_binary(path, ctx).await?;
        self.decode(&bytes)
    }

    async fn save(
        &self,
        image: &Image,
        path: &Path,
        file_mode: Option<u32>,
        delayed: bool,
        ctx: &IoContext,
    ) -> Result<WriteOutcome> {
        let data = self.encode(image)?;
        log::debug!(
            "saving {}x{} {} image with {} metadata key(s) to {}",
            image.pixels().width(),
            image.pixels().height(),
            image.pixel_format(),
            image.meta().len(),
            path.display()
        );
        storage::write_binary(path, data, file_mode, delayed, ctx).await
    }

    fn encode(&self, image: &Image) -> Result<Vec<u8>> {
        let header = ImmHeader {
            pixel_format: image.pixel_format(),
            meta: image.meta().clone(),
            codec: INNER_CODEC.to_string(),
        };
        let header_bytes = serde_json::to_vec(&header)?;
        let pixel_bytes = codec::encode_pixels(image.pixels(), ".png")?;

        let mut out = Vec::with_capacity(IMM_MAGIC.len() + 4 + header_bytes.len() + pixel_bytes.len());
        out.extend_from_slice(IMM_MAGIC);
        out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(&pixel_bytes);
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Image> {
        let rest = bytes
            .strip_prefix(IMM_MAGIC.as_slice())
            .ok_or_else(|| Error::Container("missing magic".to_string()))?;
        let (len_bytes, rest) = rest
            .split_first_chunk::<4>()
            .ok_or_else(|| Error::Container("truncated header length".to_string()))?;
        let header_len = u32::from_le_bytes(*len_bytes) as usize;
        if rest.len() < header_len {
            return Err(Error::Container("truncated header".to_string()));
        }
        let (header_bytes, pixel_bytes) = rest.split_at(header_len);
        let header: ImmHeader = serde_json::from_slice(header_bytes)?;
        if header.codec != INNER_CODEC {
            return Err(Error::Container(format!(
                "unknown inner codec {:?}",
                header.codec
            )));
        }
        let pixels = codec::decode_pixels(pixel_bytes, &CodecHints::default())?;
        Image::new(pixels, header.pixel_format, header.meta)
    }
}
