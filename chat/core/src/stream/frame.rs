//! Frame Decoder
//!
//! Splits the research backend's chunked response body into frames.
//!
//! # Frame Format
//!
//! ```text
//! data: {"type":"status","content":"Searching..."}\n
//! \n
//! data: {"type":"text","content":"Courts have ruled."}\n
//! \n
//! ```
//!
//! A frame is the text between two consecutive blank-line separators.
//! Chunks arrive with no alignment to frame boundaries, so the decoder keeps
//! a carry buffer of undecoded bytes. Bytes are only turned into text once a
//! whole frame is available, which keeps multi-byte characters that straddle
//! a chunk boundary intact.

use futures::{Stream, StreamExt};

/// Blank-line separator between frames
pub const FRAME_SEPARATOR: &[u8] = b"\n\n";

/// Maximum frame size (1 MiB)
///
/// Larger frames are discarded whole, so a body that never sends a
/// separator cannot grow the carry buffer without bound.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Minimum buffer capacity for decoder
const MIN_BUFFER_CAPACITY: usize = 4096;

/// Decoder state machine for streaming frame parsing
///
/// Buffers incoming bytes and yields complete frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Position where we've consumed up to
    read_pos: usize,
    /// Position up to which the buffer holds no separator
    scan_pos: usize,
    /// Skipping the rest of an oversized frame
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new decoder with default buffer capacity
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MIN_BUFFER_CAPACITY),
            read_pos: 0,
            scan_pos: 0,
            discarding: false,
        }
    }

    /// Append a chunk to the carry buffer
    pub fn push(&mut self, data: &[u8]) {
        // Compact buffer if we've consumed a lot
        if self.read_pos > self.buffer.len() / 2 && self.read_pos > MIN_BUFFER_CAPACITY {
            self.buffer.drain(..self.read_pos);
            self.scan_pos -= self.read_pos;
            self.read_pos = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet emitted as a frame
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Take the next complete frame, if the carry buffer holds one
    ///
    /// The separator is consumed and not part of the returned frame.
    /// Frames over [`MAX_FRAME_SIZE`] are skipped. Returns `None` when more
    /// data is needed.
    pub fn next_frame(&mut self) -> Option<String> {
        loop {
            // A separator may straddle the previous scan boundary
            let from = self
                .scan_pos
                .saturating_sub(FRAME_SEPARATOR.len() - 1)
                .max(self.read_pos);

            let Some(offset) = self.buffer[from..]
                .windows(FRAME_SEPARATOR.len())
                .position(|window| window == FRAME_SEPARATOR)
            else {
                self.scan_pos = self.buffer.len();
                if self.available() > MAX_FRAME_SIZE {
                    self.discard_pending();
                }
                return None;
            };

            let start = self.read_pos;
            let end = from + offset;
            self.read_pos = end + FRAME_SEPARATOR.len();
            self.scan_pos = self.read_pos;

            if self.discarding || end - start > MAX_FRAME_SIZE {
                if !self.discarding {
                    tracing::warn!(bytes = end - start, "Discarding oversized frame");
                }
                self.discarding = false;
                continue;
            }

            return Some(String::from_utf8_lossy(&self.buffer[start..end]).into_owned());
        }
    }

    /// Drop the pending bytes of a frame that is already too large
    ///
    /// The last byte is kept so a separator split across chunks is still
    /// found; it belongs to the discarded frame either way.
    fn discard_pending(&mut self) {
        if !self.discarding {
            tracing::warn!(bytes = self.available(), "Discarding oversized frame");
        }
        let keep_from = self.buffer.len() - (FRAME_SEPARATOR.len() - 1);
        self.buffer.drain(..keep_from);
        self.read_pos = 0;
        self.scan_pos = self.buffer.len();
        self.discarding = true;
    }

/// Push a chunk and collect every frame it completes
    pub fn decode(&mut self, data: &[u8]) -> Vec<String> {
        self.push(data);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Signal end of stream
    ///
    /// Any incomplete trailing fragment is dropped. Returns the number of
    /// bytes discarded.
    pub fn finish(&mut self) -> usize {
        let dropped = self.available();
        if dropped > 0 {
            tracing::debug!(bytes = dropped, "Dropping incomplete trailing frame");
        }
        self.clear();
        dropped
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
        self.scan_pos = 0;
        self.discarding = false;
    }
}

/// Adapt a stream of raw chunks into a lazy stream of frames
///
/// The returned stream ends when the chunk stream ends; an incomplete
/// trailing fragment is silently discarded. A chunk error is forwarded once
/// and ends the frame stream.
pub fn frames<S, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
{
    futures::stream::unfold(
        (chunks, FrameDecoder::new(), false),
        |(mut chunks, mut decoder, failed)| async move {
            if failed {
                return None;
            }
            loop {
                if let Some(frame) = decoder.next_frame() {
                    return Some((Ok(frame), (chunks, decoder, false)));
                }
                match chunks.next().await {
                    Some(Ok(bytes)) => decoder.push(&bytes),
                    Some(Err(e)) => {
                        decoder.clear();
                        return Some((Err(e), (chunks, decoder, true)));
                    }
                    None => {
                        decoder.finish();
                        return None;
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "data: {\"type\":\"status\",\"content\":\"Searching...\"}\n\n\
                          : keep-alive\n\n\
                          data: {\"type\":\"text\",\"content\":\"Les tribunaux ont statué. §1\"}\n\n\
                          data: {\"type\":\"complete\"}\n\n";

    fn decode_with_split(bytes: &[u8], chunk_size: usize) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            frames.extend(decoder.decode(chunk));
        }
        decoder.finish();
        frames
    }

    #[test]
    fn test_decode_single_chunk() {
        let frames = decode_with_split(STREAM.as_bytes(), STREAM.len());
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[1], ": keep-alive");
        assert_eq!(frames[3], "data: {\"type\":\"complete\"}");
    }

    #[test]
    fn test_chunk_boundary_independence() {
        let expected = decode_with_split(STREAM.as_bytes(), STREAM.len());
        for chunk_size in 1..=STREAM.len() {
            assert_eq!(
                decode_with_split(STREAM.as_bytes(), chunk_size),
                expected,
                "chunk size {chunk_size} changed the frames"
            );
        }
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let bytes = "data: é\n\n".as_bytes();
        // Split inside the two-byte 'é'
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&bytes[..7]).is_empty());
        let frames = decoder.decode(&bytes[7..]);
        assert_eq!(frames, vec!["data: é".to_string()]);
    }

    #[test]
    fn test_separator_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(b"data: a\n").is_empty());
        assert_eq!(decoder.decode(b"\ndata: b"), vec!["data: a".to_string()]);
        assert_eq!(decoder.available(), 7);
    }

    #[test]
    fn test_trailing_fragment_dropped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(b"data: one\n\ndata: unfinished");
        assert_eq!(frames, vec!["data: one".to_string()]);
        assert_eq!(decoder.finish(), "data: unfinished".len());
        assert_eq!(decoder.available(), 0);
    }

    #[test]
    fn test_empty_frames_between_separators() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.decode(b"\n\n\n\ndata: x\n\n");
        assert_eq!(frames, vec![String::new(), String::new(), "data: x".to_string()]);
    }

    #[test]
    fn test_compaction_keeps_pending_bytes() {
        let mut decoder = FrameDecoder::new();
        let frame = format!("data: {}\n\n", "x".repeat(MIN_BUFFER_CAPACITY));
        for _ in 0..4 {
            assert_eq!(decoder.decode(frame.as_bytes()).len(), 1);
        }
        decoder.push(b"data: tail");
        assert_eq!(decoder.decode(b"\n\n"), vec!["data: tail".to_string()]);
    }

    #[test]
    fn test_oversized_frame_discarded() {
        let mut decoder = FrameDecoder::new();
        let chunk = vec![b'x'; 64 * 1024];
        let mut frames = Vec::new();
        for _ in 0..(MAX_FRAME_SIZE / chunk.len() + 2) {
            frames.extend(decoder.decode(&chunk));
        }
        assert!(frames.is_empty());
        assert!(decoder.available() < chunk.len() + FRAME_SEPARATOR.len());

        // Separator split across chunks still ends the oversized frame
        assert!(decoder.decode(b"xx\n").is_empty());
        assert_eq!(
            decoder.decode(b"\ndata: next\n\n"),
            vec!["data: next".to_string()]
        );
    }

    #[test]
    fn test_oversized_frame_in_single_chunk_discarded() {
        let mut decoder = FrameDecoder::new();
        let mut body = vec![b'x'; MAX_FRAME_SIZE + 1];
        body.extend_from_slice(b"\n\ndata: ok\n\n");
        assert_eq!(decoder.decode(&body), vec!["data: ok".to_string()]);
    }

    #[test]
    fn test_scan_resumes_after_searched_bytes() {
        let mut decoder = FrameDecoder::new();
        for _ in 0..1000 {
            decoder.push(b"y");
            assert_eq!(decoder.next_frame(), None);
            assert_eq!(decoder.scan_pos, decoder.buffer.len());
        }
        decoder.push(b"\n");
        assert_eq!(decoder.next_frame(), None);
        decoder.push(b"\n");
        assert_eq!(decoder.next_frame(), Some("y".repeat(1000)));
    }

    #[test]
    fn test_frames_stream_adapter() {
        let chunks: Vec<Result<Vec<u8>, String>> = STREAM
            .as_bytes()
            .chunks(5)
            .map(|c| Ok(c.to_vec()))
            .collect();

        let collected: Vec<Result<String, String>> =
            tokio_test::block_on(frames(futures::stream::iter(chunks)).collect());

        assert_eq!(collected.len(), 4);
        assert!(collected.iter().all(Result::is_ok));
    }

    #[test]
    fn test_frames_stream_stops_after_error() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: a\n\n".to_vec()),
            Err("connection reset".to_string()),
            Ok(b"data: b\n\n".to_vec()),
        ];

        let collected: Vec<Result<String, String>> =
            tokio_test::block_on(frames(futures::stream::iter(chunks)).collect());

        assert_eq!(
            collected,
            vec![Ok("data: a".to_string()), Err("connection reset".to_string())]
        );
    }
}
