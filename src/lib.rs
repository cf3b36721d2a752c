//! # immio
//!
//! Load and save raster images together with arbitrary, user-defined
//! metadata — through one abstraction that works identically whether the
//! caller is blocking or running inside a tokio runtime.
//!
//! Every I/O operation is authored once, as an `async fn` taking an
//! [`IoContext`]. The context carries a single flag: is the caller async?
//! Async callers await the operation in place; blocking callers use the
//! `*_sync` twin, which drives the same operation to completion on a
//! private current-thread runtime. There are no parallel code paths.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use immio::{immread, immwrite, CodecHints, Image, IoContext, PixelArray, PixelFormat, SaveOptions};
//! use serde_json::{json, Map};
//!
//! #[tokio::main]
//! async fn main() -> immio::Result<()> {
//!     let ctx = IoContext::asynchronous();
//!
//!     // Build an image with metadata.
//!     let pixels = PixelArray::new(640, 480, 3, vec![0u8; 640 * 480 * 3])?;
//!     let mut meta = Map::new();
//!     meta.insert("lens".into(), json!("50mm"));
//!     meta.insert("exposure".into(), json!(1.0 / 125.0));
//!     let imm = Image::new(pixels, PixelFormat::Rgb, meta)?;
//!
//!     // Default write goes to the hierarchical .imm container.
//!     immwrite("frame.imm", &imm, &SaveOptions::default(), &ctx)
//!         .await?
//!         .resolve()
//!         .await?;
//!
//!     // Read it back, metadata and all.
//!     let loaded = immread("frame.imm", &CodecHints::default(), &ctx).await?;
//!     assert_eq!(loaded.meta()["lens"], json!("50mm"));
//!     Ok(())
//! }
//! ```
//!
//! Blocking callers skip the runtime entirely:
//!
//! ```rust,no_run
//! use immio::CodecHints;
//!
//! let pixels = immio::imread_sync("photo.jpg", &CodecHints::default())?;
//! println!("{}x{}", pixels.width(), pixels.height());
//! # Ok::<(), immio::Error>(())
//! ```
//!
//! ## Container Families
//!
//! | Family | Selector | Metadata storage |
//! |--------|----------|------------------|
//! | Hierarchical container (`.imm`) | [`SaveFormat::Imm`] (default) | Native JSON header — values keep their types |
//! | Delegate PNG codec | [`SaveFormat::Png`] | tEXt/iTXt chunks — strings verbatim, everything else JSON-encoded |
//!
//! The PNG family's string-only chunks make the metadata round trip
//! deliberately asymmetric: writes may upcast a value to its JSON string,
//! reads always return exactly the stored string. The pixel format itself
//! always round-trips, carried both by the native color mode and a reserved
//! `pixel_format` chunk.
//!
//! ## Modules
//!
//! - [`context`] — the [`IoContext`] flag and the blocking driver
//! - [`format`] — extension dispatch, the `.imm` marker, the `<bytes>` sentinel
//! - [`imm`] — [`Image`], [`PixelArray`], [`PixelFormat`]
//! - [`codec`] — the delegate PNG codec and its metadata text chunks
//! - [`storage`] — byte storage with permission bits and delayed writes
//! - [`container`] — the hierarchical-container trait and bundled `.imm` store
//! - [`io`] — the four public operations, async and `_sync`

pub mod codec;
pub mod container;
pub mod context;
pub mod error;
pub mod format;
pub mod imm;
pub mod io;
pub mod storage;

pub use crate::codec::CodecHints;
pub use crate::container::{ContainerStore, ImmStore};
pub use crate::context::IoContext;
pub use crate::error::{Error, Result};
pub use crate::format::{BYTES_SENTINEL, IMM_EXTENSION, SaveFormat};
pub use crate::imm::{Image, PixelArray, PixelFormat};
pub use crate::io::{
    SaveOptions, immread, immread_sync, immwrite, immwrite_sync, imread, imread_sync, imwrite,
    imwrite_sync,
};
pub use crate::storage::WriteOutcome;
