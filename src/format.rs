//! Container-format dispatch.
//!
//! Two container families exist: the hierarchical `.imm` container (default
//! for metadata-bearing writes) and the delegate PNG-like codec family. The
//! [`SaveFormat`] selector chooses between the families on write,
//! independently of the filename; extension dispatch only governs which
//! delegate codec handles the bytes.

use std::path::Path;

use crate::error::{Error, Result};

/// Path literal that means "return the encoded bytes, do not touch storage".
///
/// Any write operation handed this path must also be given an explicit
/// extension hint — there is no filename to infer a codec from.
pub const BYTES_SENTINEL: &str = "<bytes>";

/// Reserved marker extension for the hierarchical container family.
///
/// Files with this extension are loaded wholesale through the container's
/// own structured reader, bypassing the byte-fetch-then-decode path.
pub const IMM_EXTENSION: &str = ".imm";

/// Which container family a metadata-bearing write goes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveFormat {
    /// Hierarchical container (`.imm`). The default: pixels and metadata
    /// are stored natively, with PNG fixed as the inner pixel codec.
    #[default]
    Imm,
    /// Delegate PNG codec: metadata goes into text chunks.
    Png,
}

/// Whether `path` is the in-memory sentinel.
pub fn is_bytes_sentinel(path: &Path) -> bool {
    path.as_os_str() == BYTES_SENTINEL
}

/// Resolve the extension that governs codec selection for `path`.
///
/// An explicit `hint` always wins and is normalized (lower-cased, leading
/// dot). Without a hint, the sentinel path is an error — there is nothing to
/// infer from — and a regular path yields its lower-cased suffix, or `None`
/// when it has no suffix (reads then fall back to content sniffing).
pub fn effective_extension(path: &Path, hint: Option<&str>) -> Result<Option<String>> {
    if let Some(hint) = hint {
        return Ok(Some(normalize_extension(hint)));
    }
    if is_bytes_sentinel(path) {
        return Err(Error::MissingExtension);
    }
    Ok(path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension))
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}
