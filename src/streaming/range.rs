//! HTTP `Range` header resolution.
//!
//! Only a single `bytes=<start>-<end>` range is supported. Suffix ranges
//! (`bytes=-500`) and multi-range requests are rejected as malformed.

use reelhouse_common::{Error, Result};

/// Inclusive byte window inside a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the window.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` response header.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Resolve a raw `Range` header against a resource of `size` bytes.
///
/// Returns `Ok(None)` when no range was requested and the whole resource
/// should be sent.
///
/// # Examples
///
/// ```
/// use reelhouse::streaming::range::{resolve_range, ByteRange};
///
/// let r = resolve_range(Some("bytes=100-199"), 1000).unwrap();
/// assert_eq!(r, Some(ByteRange { start: 100, end: 199 }));
///
/// let open = resolve_range(Some("bytes=500-"), 1000).unwrap();
/// assert_eq!(open, Some(ByteRange { start: 500, end: 999 }));
///
/// assert_eq!(resolve_range(None, 1000).unwrap(), None);
/// ```
pub fn resolve_range(header: Option<&str>, size: u64) -> Result<Option<ByteRange>> {
    let raw = match header.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    let spec = raw
        .strip_prefix("bytes=")
        .ok_or_else(|| Error::malformed_range(format!("unsupported unit in {raw:?}")))?;

    if spec.contains(',') {
        return Err(Error::malformed_range("multiple ranges are not supported"));
    }

    let parts: Vec<&str> = spec.split('-').collect();
    if parts.len() != 2 {
        return Err(Error::malformed_range(format!("expected start-end, got {spec:?}")));
    }

    let start: u64 = parts[0]
        .parse()
        .map_err(|_| Error::malformed_range(format!("invalid start {:?}", parts[0])))?;

    let end: Option<u64> = if parts[1].is_empty() {
        None
    } else {
        Some(
            parts[1]
                .parse()
                .map_err(|_| Error::malformed_range(format!("invalid end {:?}", parts[1])))?,
        )
    };

    // An empty resource has no satisfiable byte positions at all.
    if size == 0 {
        return Err(Error::UnsatisfiableRange {
            start,
            end: end.unwrap_or(start),
            size,
        });
    }

    let end = end.unwrap_or(size - 1);
    if end >= size || start > end {
        return Err(Error::UnsatisfiableRange { start, end, size });
    }

    Ok(Some(ByteRange { start, end }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsatisfiable(r: Result<Option<ByteRange>>) -> bool {
        matches!(r, Err(Error::UnsatisfiableRange { .. }))
    }

    fn malformed(r: Result<Option<ByteRange>>) -> bool {
        matches!(r, Err(Error::MalformedRange(_)))
    }

    #[test]
    fn test_absent_or_empty_header() {
        assert_eq!(resolve_range(None, 1000).unwrap(), None);
        assert_eq!(resolve_range(Some(""), 1000).unwrap(), None);
        assert_eq!(resolve_range(Some("   "), 1000).unwrap(), None);
    }

    #[test]
    fn test_valid_windows_are_returned_exactly() {
        let size = 1000;
        for (start, end) in [(0, 0), (0, 999), (100, 199), (999, 999), (500, 501)] {
            let header = format!("bytes={start}-{end}");
            let r = resolve_range(Some(&header), size).unwrap().unwrap();
            assert_eq!(r, ByteRange { start, end });
            assert_eq!(r.len(), end - start + 1);
        }
    }

    #[test]
    fn test_open_ended_range() {
        let r = resolve_range(Some("bytes=500-"), 1000).unwrap().unwrap();
        assert_eq!(r, ByteRange { start: 500, end: 999 });
        assert_eq!(r.len(), 500);

        let r = resolve_range(Some("bytes=0-"), 1).unwrap().unwrap();
        assert_eq!(r, ByteRange { start: 0, end: 0 });
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        assert!(unsatisfiable(resolve_range(Some("bytes=900-1500"), 1000)));
        assert!(unsatisfiable(resolve_range(Some("bytes=0-1000"), 1000)));
        assert!(unsatisfiable(resolve_range(Some("bytes=200-100"), 1000)));
        assert!(unsatisfiable(resolve_range(Some("bytes=1000-"), 1000)));
        assert!(unsatisfiable(resolve_range(Some("bytes=0-"), 0)));
        assert!(unsatisfiable(resolve_range(Some("bytes=0-0"), 0)));
    }

    #[test]
    fn test_unsatisfiable_carries_size() {
        match resolve_range(Some("bytes=900-1500"), 1000) {
            Err(Error::UnsatisfiableRange { start, end, size }) => {
                assert_eq!((start, end, size), (900, 1500, 1000));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_ranges() {
        for header in [
            "bytes=abc-def",
            "bytes=abc-",
            "bytes=10-xyz",
            "bytes=-500",
            "bytes=-",
            "bytes=1-2-3",
            "bytes=100",
            "bytes=0-1,5-9",
            "items=0-10",
            "0-10",
            "bytes= 1-2",
        ] {
            assert!(
                malformed(resolve_range(Some(header), 1000)),
                "{header} should be malformed"
            );
        }
    }

    #[test]
    fn test_content_range_header() {
        let r = ByteRange { start: 100, end: 199 };
        assert_eq!(r.content_range(1000), "bytes 100-199/1000");
    }
}
