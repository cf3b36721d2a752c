use thiserror::Error;

/// Errors produced by this crate.
///
/// Collaborator failures (filesystem, codecs, JSON) pass through unchanged
/// behind transparent variants so the root cause stays visible to the caller.
/// Nothing here is retried; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The [`IoContext`](crate::IoContext) did not say whether the caller
    /// runs under an async scheduler. Raised before any storage access.
    #[error(
        "execution context does not say whether the caller is async; \
         use IoContext::asynchronous() or IoContext::blocking()"
    )]
    MissingAsyncFlag,

    /// A write targeted the in-memory sentinel (or an extensionless path)
    /// without an explicit extension hint to pick the codec.
    #[error("an explicit extension is required when no filename is available to infer it from")]
    MissingExtension,

    /// A native color mode outside the supported mapping table
    /// (`RGB`, `RGBA`, `L`, plus `P` on decode).
    #[error("unrecognized pixel mode: {0}")]
    UnsupportedPixelMode(String),

    /// No codec is registered for the given extension.
    #[error("no codec available for extension {0:?}")]
    UnsupportedFormat(String),

    /// A pixel buffer with a channel count other than 1, 3, or 4.
    #[error("unsupported channel count: {0}")]
    ChannelCount(u8),

    /// A pixel format paired with a buffer of the wrong channel count.
    #[error("pixel format {format} expects {expected} channel(s), buffer has {actual}")]
    ChannelMismatch {
        format: &'static str,
        expected: u8,
        actual: u8,
    },

    /// A pixel buffer whose length does not match its stated dimensions.
    #[error("pixel buffer holds {actual} bytes, dimensions require {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// A malformed `.imm` container file.
    #[error("malformed imm container: {0}")]
    Container(String),

    #[error("PNG decode failed: {0}")]
    PngDecode(String),

    #[error("PNG encode failed: {0}")]
    PngEncode(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A delayed-write background task panicked or was cancelled.
    #[error("delayed write task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
