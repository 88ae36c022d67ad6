//! Pointer files stored in place of CAS-backed content

use hubcas_types::ContentDescriptor;
use serde::Deserialize;
use std::path::Path;

/// Bodies larger than this are real content, not pointers
pub const MAX_POINTER_SIZE: u64 = 1024;

/// Whether the path may hold a text pointer. Known binary formats never do.
#[must_use]
pub fn should_try_pointer(path: &str) -> bool {
    let ext = Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    !matches!(
        ext.as_str(),
        "safetensors"
            | "bin"
            | "pt"
            | "pth"
            | "ckpt"
            | "onnx"
            | "tflite"
            | "h5"
            | "npy"
            | "npz"
            | "tar"
            | "gz"
            | "zip"
            | "xz"
            | "zst"
            | "bz2"
    )
}

#[derive(Deserialize)]
struct JsonPointer {
    hash: String,
    file_size: u64,
}

/// Parse a JSON pointer `{"hash", "file_size"}` or a Git LFS pointer.
///
/// Returns `None` for anything else.
#[must_use]
pub fn parse_pointer(body: &str) -> Option<ContentDescriptor> {
    if let Ok(pointer) = serde_json::from_str::<JsonPointer>(body) {
        return (!pointer.hash.is_empty())
            .then(|| ContentDescriptor::new(pointer.hash, pointer.file_size));
    }

    let mut oid = None;
    let mut size = None;
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("oid ") {
            oid = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("size ") {
            size = rest.trim().parse::<u64>().ok();
        }
    }

    match (oid, size) {
        (Some(hash), Some(size)) if !hash.is_empty() => Some(ContentDescriptor::new(hash, size)),
        _ => None,
    }
}
