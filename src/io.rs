//! The four public operations, each in an async and a blocking flavor.
//!
//! Every operation is authored once as an `async fn` taking an
//! [`IoContext`]; the `*_sync` twins wrap it with
//! [`run_sync`](crate::context::run_sync) and a blocking context. There is
//! no separate synchronous code path.

use std::path::Path;

use crate::codec::{self, CodecHints};
use crate::container::{ContainerStore, ImmStore};
use crate::context::{self, IoContext};
use crate::error::{Error, Result};
use crate::format::{self, SaveFormat};
use crate::imm::{Image, PixelArray};
use crate::storage::{self, WriteOutcome};

/// Options for [`immwrite`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    /// Container family for the write. Defaults to the hierarchical `.imm`
    /// container; the selector takes precedence over the filename extension.
    pub format: SaveFormat,
    /// Unix permission bits applied after the write; `None` leaves the
    /// platform default untouched.
    pub file_mode: Option<u32>,
    /// Schedule the storage write as a background task and return a handle
    /// immediately. Only effective in async mode; in blocking mode the write
    /// completes before returning.
    pub write_delayed: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            format: SaveFormat::default(),
            file_mode: Some(0o664),
            write_delayed: false,
        }
    }
}

impl SaveOptions {
    /// Options targeting a specific container family.
    pub fn with_format(format: SaveFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}

/// Load an image's pixels, without metadata.
///
/// Fetches raw bytes per the context flag and hands them to the delegate
/// codec; the hierarchical container family is never consulted here.
///
/// # Example
///
/// ```rust,no_run
/// use immio::{imread, CodecHints, IoContext};
///
/// #[tokio::main]
/// async fn main() -> immio::Result<()> {
///     let pixels = imread("photo.jpg", &CodecHints::default(), &IoContext::asynchronous()).await?;
///     println!("{}x{}", pixels.width(), pixels.height());
///     Ok(())
/// }
/// ```
pub async fn imread(
    path: impl AsRef<Path>,
    hints: &CodecHints,
    ctx: &IoContext,
) -> Result<PixelArray> {
    ctx.async_mode()?;
    let bytes = storage::read_binary(path.as_ref(), ctx).await?;
    codec::decode_pixels(&bytes, hints)
}

/// Blocking flavor of [`imread`].
pub fn imread_sync(path: impl AsRef<Path>, hints: &CodecHints) -> Result<PixelArray> {
    context::run_sync(imread(path, hints, &IoContext::blocking()))
}

/// Load an image together with its metadata.
///
/// Files whose effective extension is the reserved `.imm` marker are loaded
/// wholesale through the hierarchical container's own reader — its
/// structured metadata access is faster than the generic
/// byte-fetch-then-probe path. Everything else is fetched as raw bytes,
/// probed for native metadata, and pixel-decoded.
///
/// Metadata values come back exactly as stored: strings stay strings, and
/// values that were JSON-encoded on write are **not** decoded back (see
/// [`codec::immdecode`]).
pub async fn immread(
    path: impl AsRef<Path>,
    hints: &CodecHints,
    ctx: &IoContext,
) -> Result<Image> {
    ctx.async_mode()?;
    let path = path.as_ref();
    let ext = format::effective_extension(path, hints.extension.as_deref())?;

    if ext.as_deref() == Some(format::IMM_EXTENSION) {
        return ImmStore.load(path, ctx).await;
    }

    let bytes = storage::read_binary(path, ctx).await?;
    codec::immdecode(&bytes, hints)
}

/// Blocking flavor of [`immread`].
pub fn immread_sync(path: impl AsRef<Path>, hints: &CodecHints) -> Result<Image> {
    context::run_sync(immread(path, hints, &IoContext::blocking()))
}

/// Save an image's pixels, without metadata.
///
/// Always encodes to an in-memory buffer first, so the storage write is a
/// single buffer put. With the [`BYTES_SENTINEL`](crate::BYTES_SENTINEL)
/// path, the encoded bytes are returned directly and storage is never
/// touched — an explicit extension hint is required in that case.
pub async fn imwrite(
    path: impl AsRef<Path>,
    pixels: &PixelArray,
    hints: &CodecHints,
    ctx: &IoContext,
) -> Result<WriteOutcome> {
    ctx.async_mode()?;
    let path = path.as_ref();
    let ext = format::effective_extension(path, hints.extension.as_deref())?
        .ok_or(Error::MissingExtension)?;

    let data = codec::encode_pixels(pixels, &ext)?;
    if format::is_bytes_sentinel(path) {
        return Ok(WriteOutcome::Bytes(data));
    }
    storage::write_binary(path, data, None, false, ctx).await
}

/// Blocking flavor of [`imwrite`].
pub fn imwrite_sync(
    path: impl AsRef<Path>,
    pixels: &PixelArray,
    hints: &CodecHints,
) -> Result<WriteOutcome> {
    context::run_sync(imwrite(path, pixels, hints, &IoContext::blocking()))
}

/// Save an image together with its metadata.
///
/// The [`SaveFormat`] selector picks the container family, independent of
/// the filename: the hierarchical `.imm` container by default (PNG fixed as
/// its inner pixel codec), or the delegate PNG codec with metadata in text
/// chunks. Permission bits and the delayed-write flag are passed through to
/// storage; a delayed write in blocking mode degrades to a completed
/// synchronous write.
///
/// The sentinel path returns the encoded container or PNG bytes directly.
///
/// # Example
///
/// ```rust,no_run
/// use immio::{immwrite, Image, IoContext, SaveOptions};
///
/// # async fn save(imm: Image) -> immio::Result<()> {
/// let outcome = immwrite("frame.imm", &imm, &SaveOptions::default(), &IoContext::asynchronous()).await?;
/// println!("{} bytes written", outcome.resolve().await?);
/// # Ok(())
/// # }
/// ```
pub async fn immwrite(
    path: impl AsRef<Path>,
    image: &Image,
    opts: &SaveOptions,
    ctx: &IoContext,
) -> Result<WriteOutcome> {
    ctx.async_mode()?;
    let path = path.as_ref();
    let store: &dyn ContainerStore = &ImmStore;

    if format::is_bytes_sentinel(path) {
        let data = match opts.format {
            SaveFormat::Imm => store.encode(image)?,
            SaveFormat::Png => codec::immencode(image)?,
        };
        return Ok(WriteOutcome::Bytes(data));
    }

    match opts.format {
        SaveFormat::Imm => {
            store
                .save(image, path, opts.file_mode, opts.write_delayed, ctx)
                .await
        }
        SaveFormat::Png => {
            let data = codec::immencode(image)?;
            storage::write_binary(path, data, opts.file_mode, opts.write_delayed, ctx).await
        }
    }
}

/// Blocking flavor of [`immwrite`].
pub fn immwrite_sync(
    path: impl AsRef<Path>,
    image: &Image,
    opts: &SaveOptions,
) -> Result<WriteOutcome> {
    context::run_sync(immwrite(path, image, opts, &IoContext::blocking()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BYTES_SENTINEL;
    use crate::imm::PixelFormat;
    use serde_json::{json, Map};
    use tempfile::TempDir;

    fn rgb_image() -> Image {
        let data: Vec<u8> = (0..27).map(|i| (i * 5) as u8).collect();
        let pixels = PixelArray::new(3, 3, 3, data).unwrap();
        let mut meta = Map::new();
        meta.insert("lens".into(), json!("50mm"));
        Image::new(pixels, PixelFormat::Rgb, meta).unwrap()
    }

    #[tokio::test]
    async fn sentinel_write_returns_decodable_bytes() {
        let imm = rgb_image();
        let ctx = IoContext::asynchronous();

        let outcome = imwrite(
            BYTES_SENTINEL,
            imm.pixels(),
            &CodecHints::with_extension(".png"),
            &ctx,
        )
        .await
        .unwrap();

        let bytes = outcome.into_bytes().expect("expected in-memory bytes");
        let decoded = codec::decode_pixels(&bytes, &CodecHints::default()).unwrap();
        assert_eq!(&decoded, imm.pixels());
    }

    #[tokio::test]
    async fn sentinel_without_extension_fails_before_encode() {
        let imm = rgb_image();
        let ctx = IoContext::asynchronous();
        let result = imwrite(BYTES_SENTINEL, imm.pixels(), &CodecHints::default(), &ctx).await;
        assert!(matches!(result, Err(Error::MissingExtension)));
    }

    #[tokio::test]
    async fn every_operation_rejects_an_unset_context() {
        let imm = rgb_image();
        let ctx = IoContext::default();
        let hints = CodecHints::default();

        assert!(matches!(
            imread("x.png", &hints, &ctx).await,
            Err(Error::MissingAsyncFlag)
        ));
        assert!(matches!(
            immread("x.png", &hints, &ctx).await,
            Err(Error::MissingAsyncFlag)
        ));
        assert!(matches!(
            imwrite("x.png", imm.pixels(), &hints, &ctx).await,
            Err(Error::MissingAsyncFlag)
        ));
        assert!(matches!(
            immwrite("x.png", &imm, &SaveOptions::default(), &ctx).await,
            Err(Error::MissingAsyncFlag)
        ));
    }

    #[tokio::test]
    async fn imm_round_trip_uses_the_container_family() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.imm");
        let ctx = IoContext::asynchronous();
        let imm = rgb_image();

        immwrite(&path, &imm, &SaveOptions::default(), &ctx)
            .await
            .unwrap()
            .resolve()
            .await
            .unwrap();

        let loaded = immread(&path, &CodecHints::default(), &ctx).await.unwrap();
        assert_eq!(loaded, imm);
        assert_eq!(loaded.meta()["lens"], json!("50mm"));
    }

    #[tokio::test]
    async fn png_strategy_stores_floats_as_json_strings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("y.png");
        let ctx = IoContext::asynchronous();

        let pixels = PixelArray::new(2, 2, 1, vec![10, 20, 30, 40]).unwrap();
        let mut meta = Map::new();
        meta.insert("exposure".into(), json!(1.0 / 125.0));
        let imm = Image::new(pixels, PixelFormat::Gray, meta).unwrap();

        immwrite(&path, &imm, &SaveOptions::with_format(SaveFormat::Png), &ctx)
            .await
            .unwrap()
            .resolve()
            .await
            .unwrap();

        let loaded = immread(&path, &CodecHints::default(), &ctx).await.unwrap();
        assert_eq!(loaded.pixel_format(), PixelFormat::Gray);
        assert_eq!(loaded.meta()["exposure"], json!("0.008"));
    }

    #[tokio::test]
    async fn delayed_write_returns_immediately_in_async_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.imm");
        let ctx = IoContext::asynchronous();
        let opts = SaveOptions {
            write_delayed: true,
            ..SaveOptions::default()
        };

        let outcome = immwrite(&path, &rgb_image(), &opts, &ctx).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Pending(_)));
        assert!(outcome.resolve().await.unwrap() > 0);
        assert!(path.exists());
    }

    #[test]
    fn delayed_write_degrades_in_blocking_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eager.imm");
        let opts = SaveOptions {
            write_delayed: true,
            ..SaveOptions::default()
        };

        let outcome = immwrite_sync(&path, &rgb_image(), &opts).unwrap();
        assert!(matches!(outcome, WriteOutcome::Written(_)));
        assert!(path.exists());
    }

    #[test]
    fn sync_flavors_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sync.png");
        let imm = rgb_image();

        imwrite_sync(&path, imm.pixels(), &CodecHints::default()).unwrap();
        let pixels = imread_sync(&path, &CodecHints::default()).unwrap();
        assert_eq!(&pixels, imm.pixels());

        let loaded = immread_sync(&path, &CodecHints::default()).unwrap();
        assert_eq!(loaded.pixels(), imm.pixels());
    }

    #[tokio::test]
    async fn read_plain_never_touches_the_container_family() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("z.imm");
        let ctx = IoContext::asynchronous();

        immwrite(&path, &rgb_image(), &SaveOptions::default(), &ctx)
            .await
            .unwrap()
            .resolve()
            .await
            .unwrap();

        // imread hands the raw container bytes to the delegate codec, which
        // does not recognize them.
        let result = imread(&path, &CodecHints::default(), &ctx).await;
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn immwrite_applies_the_default_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mode.imm");
        let ctx = IoContext::asynchronous();

        immwrite(&path, &rgb_image(), &SaveOptions::default(), &ctx)
            .await
            .unwrap()
            .resolve()
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o664);
    }
}
