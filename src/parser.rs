//! Incremental parser for a streamed HTTP response header block.
//!
//! The engine delivers header bytes in arbitrary chunk sizes, so the
//! parser accumulates raw bytes and re-scans for the blank-line
//! terminator (`\r\n\r\n`) after every append; a chunk boundary can
//! split the terminator, so a single scan at any one point is not
//! enough. Nothing is emitted until a complete block is seen.

use bytes::BytesMut;
use tracing::warn;

const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Incremental parser turning the raw header byte stream of one
/// response into a status line plus an ordered list of header lines.
///
/// Redirected transfers deliver one header block per hop; each
/// completed block replaces the status line and appends its header
/// lines, so the final status line is the last hop's while the header
/// list spans all hops in arrival order.
pub struct HeaderStreamParser {
    buf: BytesMut,
    status_line: String,
    headers: Vec<String>,
    max_bytes: usize,
    overflowed: bool,
}

impl HeaderStreamParser {
    /// Create a parser with the given accumulation ceiling in bytes.
    ///
    /// A stream that never yields a terminator stops being retained
    /// once the buffer exceeds `max_bytes`; that is a non-fatal
    /// protocol anomaly and leaves whatever was parsed so far intact.
    pub fn new(max_bytes: usize) -> Self {
        HeaderStreamParser {
            buf: BytesMut::new(),
            status_line: String::new(),
            headers: Vec::new(),
            max_bytes,
            overflowed: false,
        }
    }

    /// Append a chunk of raw header bytes in arrival order.
    pub fn append(&mut self, chunk: &[u8]) {
        if self.overflowed {
            return;
        }
        self.buf.extend_from_slice(chunk);
        self.extract_complete_blocks();
        if self.buf.len() > self.max_bytes {
            warn!(
                buffered = self.buf.len(),
                ceiling = self.max_bytes,
                "header block exceeded ceiling without terminator; dropping further header bytes"
            );
            self.buf.clear();
            self.overflowed = true;
        }
    }

    /// Status line parsed so far. Empty until a complete block arrives.
    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Header lines parsed so far, terminators stripped, arrival order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// True once the accumulation ceiling was exceeded.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Take the parsed status line and header list, resetting both.
    pub fn take(&mut self) -> (String, Vec<String>) {
        (
            std::mem::take(&mut self.status_line),
            std::mem::take(&mut self.headers),
        )
    }

    fn extract_complete_blocks(&mut self) {
        while let Some(end) = find(&self.buf, TERMINATOR) {
            let block = self.buf.split_to(end + TERMINATOR.len());
            self.parse_block(&block[..end]);
        }
    }

    /// Parse one complete block (terminator already stripped): the first
    /// line is the status line, every following line one header entry.
    fn parse_block(&mut self, block: &[u8]) {
        let text = String::from_utf8_lossy(block);
        let mut lines = text.split("\r\n");
        if let Some(status) = lines.next() {
            self.status_line = status.to_string();
        }
        for line in lines {
            if !line.is_empty() {
                self.headers.push(line.to_string());
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &[u8] = b"HTTP/1.1 200 OK\r\nA: 1\r\nB: 2\r\n\r\n";

    #[test]
    fn single_chunk() {
        let mut p = HeaderStreamParser::new(64 * 1024);
        p.append(RAW);
        assert_eq!(p.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(p.headers(), ["A: 1", "B: 2"]);
    }

    #[test]
    fn any_split_point_yields_identical_result() {
        for split in 0..=RAW.len() {
            let mut p = HeaderStreamParser::new(64 * 1024);
            p.append(&RAW[..split]);
            p.append(&RAW[split..]);
            assert_eq!(p.status_line(), "HTTP/1.1 200 OK", "split at {split}");
            assert_eq!(p.headers(), ["A: 1", "B: 2"], "split at {split}");
        }
    }

    #[test]
    fn byte_at_a_time() {
        let mut p = HeaderStreamParser::new(64 * 1024);
        for b in RAW {
            p.append(std::slice::from_ref(b));
        }
        assert_eq!(p.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(p.headers(), ["A: 1", "B: 2"]);
    }

    #[test]
    fn no_terminator_emits_nothing() {
        let mut p = HeaderStreamParser::new(64 * 1024);
        p.append(b"HTTP/1.1 200 OK\r\nA: 1\r\n");
        assert_eq!(p.status_line(), "");
        assert!(p.headers().is_empty());
    }

    #[test]
    fn terminator_not_at_buffer_tail() {
        // Trailing bytes after the terminator belong to the next hop's
        // block and must be retained, not lost.
        let mut p = HeaderStreamParser::new(64 * 1024);
        p.append(b"HTTP/1.1 301 Moved\r\nLocation: /x\r\n\r\nHTTP/1.1 200 OK\r\n");
        assert_eq!(p.status_line(), "HTTP/1.1 301 Moved");
        assert_eq!(p.headers(), ["Location: /x"]);
        p.append(b"C: 3\r\n\r\n");
        assert_eq!(p.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(p.headers(), ["Location: /x", "C: 3"]);
    }

    #[test]
    fn redirect_block_replaces_status_and_appends_headers() {
        let mut p = HeaderStreamParser::new(64 * 1024);
        p.append(b"HTTP/1.1 302 Found\r\nLocation: /y\r\n\r\n");
        p.append(b"HTTP/1.1 200 OK\r\nA: 1\r\n\r\n");
        assert_eq!(p.status_line(), "HTTP/1.1 200 OK");
        assert_eq!(p.headers(), ["Location: /y", "A: 1"]);
    }

    #[test]
    fn ceiling_stops_accumulation() {
        let mut p = HeaderStreamParser::new(16);
        p.append(b"no terminator here, just noise");
        assert!(p.overflowed());
        // Further appends are ignored, even one carrying a terminator.
        p.append(b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(p.status_line(), "");
        assert!(p.headers().is_empty());
    }

    #[test]
    fn block_parsed_before_ceiling_check() {
        // A complete block arriving in one append parses even when it is
        // larger than the ceiling; the ceiling bounds terminator-less
        // accumulation only.
        let mut p = HeaderStreamParser::new(8);
        p.append(RAW);
        assert_eq!(p.status_line(), "HTTP/1.1 200 OK");
        assert!(!p.overflowed());
    }

    #[test]
    fn take_resets_state() {
        let mut p = HeaderStreamParser::new(64 * 1024);
        p.append(RAW);
        let (status, headers) = p.take();
        assert_eq!(status, "HTTP/1.1 200 OK");
        assert_eq!(headers, ["A: 1", "B: 2"]);
        assert_eq!(p.status_line(), "");
        assert!(p.headers().is_empty());
    }
}
