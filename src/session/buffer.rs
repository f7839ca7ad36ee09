//! Inbound byte accumulator for the active connection.

/// Append-only receive buffer with delimiter-aware draining.
///
/// All access happens under the connection lock; the buffer itself is plain
/// data. Consumers drain from the front, readers append at the back.
#[derive(Debug, Default)]
pub(crate) struct RecvBuffer {
    data: Vec<u8>,
}

impl RecvBuffer {
    pub fn new() -> Self {
        RecvBuffer { data: Vec::new() }
    }

    /// Bytes currently buffered.
    pub fn available(&self) -> usize {
        self.data.len()
    }

    /// Append one inbound chunk.
    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    /// Drain and return everything buffered; empty when nothing arrived.
    pub fn read_all(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    /// Drain and return the first `n` buffered bytes.
    pub fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.data.len());
        self.data.drain(..n).collect()
    }

    /// Drain and return the prefix through the first occurrence of
    /// `delimiter`, or `None` when no complete frame is buffered. An empty
    /// delimiter matches immediately and yields an empty frame.
    pub fn read_until(&mut self, delimiter: &[u8]) -> Option<Vec<u8>> {
        if delimiter.is_empty() {
            return Some(Vec::new());
        }
        let at = self.find(delimiter, 0)?;
        Some(self.take(at + delimiter.len()))
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Position of the first `delimiter` occurrence starting at or after
    /// `from`. An empty delimiter never matches.
    pub fn find(&self, delimiter: &[u8], from: usize) -> Option<usize> {
        if delimiter.is_empty() {
            return None;
        }
        let start = from.min(self.data.len());
        self.data[start..]
            .windows(delimiter.len())
            .position(|window| window == delimiter)
            .map(|offset| start + offset)
    }

    /// Where an incremental scan should resume after a miss: the end of the
    /// data minus a delimiter-sized overlap, so a match straddling the next
    /// append is still seen.
    pub fn resume_pos(&self, delimiter_len: usize) -> usize {
        self.data
            .len()
            .saturating_sub(delimiter_len.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_accumulates_and_read_drains() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"hel");
        buffer.append(b"lo");
        assert_eq!(buffer.available(), 5);
        assert_eq!(buffer.read_all(), b"hello");
        assert_eq!(buffer.available(), 0);
        assert_eq!(buffer.read_all(), b"");
    }

    #[test]
    fn read_until_returns_shortest_prefix_with_delimiter() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"one\ntwo\nthree");
        assert_eq!(buffer.read_until(b"\n").unwrap(), b"one\n");
        assert_eq!(buffer.read_until(b"\n").unwrap(), b"two\n");
        assert!(buffer.read_until(b"\n").is_none());
        assert_eq!(buffer.available(), 5);
    }

    #[test]
    fn finds_delimiter_split_across_appends() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"req\r");
        assert!(buffer.read_until(b"\r\n").is_none());
        buffer.append(b"\nrest");
        assert_eq!(buffer.read_until(b"\r\n").unwrap(), b"req\r\n");
        assert_eq!(buffer.read_all(), b"rest");
    }

    #[test]
    fn multi_byte_delimiter_consumed_with_frame() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"a::b::");
        assert_eq!(buffer.read_until(b"::").unwrap(), b"a::");
        assert_eq!(buffer.read_until(b"::").unwrap(), b"b::");
    }

    #[test]
    fn empty_delimiter_yields_empty_frame_and_never_finds() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"data");
        assert_eq!(buffer.read_until(b"").unwrap(), b"");
        assert_eq!(buffer.available(), 4);
        assert!(buffer.find(b"", 0).is_none());
    }

    #[test]
    fn find_respects_start_offset() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"x|y|");
        assert_eq!(buffer.find(b"|", 0), Some(1));
        assert_eq!(buffer.find(b"|", 2), Some(3));
        assert_eq!(buffer.find(b"|", 4), None);
    }

    #[test]
    fn clear_discards_everything() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"stale");
        buffer.clear();
        assert_eq!(buffer.available(), 0);
        assert!(buffer.read_until(b"s").is_none());
    }

    #[test]
    fn resume_pos_overlaps_by_delimiter_length_minus_one() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"abcdef");
        assert_eq!(buffer.resume_pos(1), 6);
        assert_eq!(buffer.resume_pos(2), 5);
        assert_eq!(buffer.resume_pos(4), 3);
        assert_eq!(buffer.resume_pos(0), 6);
    }

    #[test]
    fn take_caps_at_available_bytes() {
        let mut buffer = RecvBuffer::new();
        buffer.append(b"abc");
        assert_eq!(buffer.take(2), b"ab");
        assert_eq!(buffer.take(10), b"c");
    }
}
