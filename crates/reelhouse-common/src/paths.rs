//! Path utilities for naming quality variants and classifying video files.
//!
//! Variants live next to their originals and are named
//! `<baseName>_<qualityName>.mp4`. The presence of that file is the only record
//! that a variant exists.

use std::path::{Path, PathBuf};

/// Container extension used for every encoded variant.
pub const VARIANT_EXTENSION: &str = "mp4";

/// Number of leading bytes inspected by [`sniff_video`].
pub const SNIFF_LEN: usize = 261;

/// Build the file name of a quality variant from the original file name.
///
/// # Examples
///
/// ```
/// use reelhouse_common::paths::variant_file_name;
///
/// assert_eq!(variant_file_name("holiday.mov", "480p"), "holiday_480p.mp4");
/// assert_eq!(variant_file_name("dir/a.b.webm", "720p"), "a.b_720p.mp4");
/// ```
pub fn variant_file_name(original: &str, quality: &str) -> String {
    let base = Path::new(original)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{base}_{quality}.{VARIANT_EXTENSION}")
}

/// Full path of a quality variant inside `output_dir`.
pub fn variant_path(output_dir: &Path, original: &Path, quality: &str) -> PathBuf {
    let name = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(variant_file_name(&name, quality))
}

/// Content type served for a file, chosen by extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use reelhouse_common::paths::content_type_for;
///
/// assert_eq!(content_type_for(Path::new("a.WEBM")), "video/webm");
/// assert_eq!(content_type_for(Path::new("a.mkv")), "video/mp4");
/// ```
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("webm") => "video/webm",
        Some("ogv") | Some("ogg") => "video/ogg",
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
}

/// Identify a video container from its leading bytes.
///
/// Returns the MIME type of the recognised container, or `None` when the
/// bytes do not match any known signature.
pub fn sniff_video(head: &[u8]) -> Option<&'static str> {
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return if &head[8..12] == b"qt  " {
            Some("video/quicktime")
        } else {
            Some("video/mp4")
        };
    }

    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        let window = &head[..head.len().min(64)];
        return if window.windows(4).any(|w| w == b"webm") {
            Some("video/webm")
        } else {
            Some("video/x-matroska")
        };
    }

    if head.len() >= 12 && head.starts_with(b"RIFF") && &head[8..12] == b"AVI " {
        return Some("video/x-msvideo");
    }

    if head.starts_with(b"OggS") {
        return Some("video/ogg");
    }

    None
}

/// Reduce a client-supplied file name to a safe final path component.
///
/// Returns `None` for names that would escape the media root or are empty.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }
    Some(last.to_string())
}
