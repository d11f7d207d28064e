//! Chunk padding
//!
//! Streamed chunks are padded with ASCII spaces to a 4096-byte boundary.
//! Several browsers buffer partial chunked responses below an internal
//! threshold before surfacing them to script, so the padding is a
//! correctness requirement for the streaming transport, not cosmetics.
//! Long-poll replies are complete responses and are never padded.

use bytes::{Bytes, BytesMut};

/// Minimum size of a streamed chunk
pub const CHUNK_ALIGN: usize = 4096;

/// HTML preamble opening the streaming response
pub const HTML_PREAMBLE: &str = "<!DOCTYPE html><html><head></head><body>\n";

/// Pad `buf` with spaces up to [`CHUNK_ALIGN`]. Content that is already
/// at or past the boundary is left unmodified.
pub fn align_chunk(buf: &mut BytesMut) {
    if buf.len() < CHUNK_ALIGN {
        buf.resize(CHUNK_ALIGN, b' ');
    }
}

/// Frame a payload as one padded streaming chunk
pub fn aligned_payload(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len().max(CHUNK_ALIGN));
    buf.extend_from_slice(payload);
    align_chunk(&mut buf);
    buf.freeze()
}

/// The padded preamble chunk sent when a streaming subscriber attaches
pub fn preamble_chunk() -> Bytes {
    aligned_payload(HTML_PREAMBLE.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_content_padded_to_boundary() {
        let chunk = aligned_payload(b"hello");
        assert_eq!(chunk.len(), CHUNK_ALIGN);
        assert!(chunk.starts_with(b"hello"));
        assert!(chunk[5..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_empty_content_padded() {
        let chunk = aligned_payload(b"");
        assert_eq!(chunk.len(), CHUNK_ALIGN);
        assert!(chunk.iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_exact_boundary_unmodified() {
        let content = vec![b'a'; CHUNK_ALIGN];
        let chunk = aligned_payload(&content);
        assert_eq!(chunk.len(), CHUNK_ALIGN);
        assert_eq!(&chunk[..], &content[..]);
    }

    #[test]
    fn test_oversized_content_unmodified() {
        let content = vec![b'a'; CHUNK_ALIGN + 100];
        let chunk = aligned_payload(&content);
        assert_eq!(chunk.len(), CHUNK_ALIGN + 100);
        assert_eq!(&chunk[..], &content[..]);
    }

    #[test]
    fn test_preamble() {
        let chunk = preamble_chunk();
        assert_eq!(chunk.len(), CHUNK_ALIGN);
        assert!(chunk.starts_with(b"<!DOCTYPE html><html><head></head><body>\n"));
    }
}
