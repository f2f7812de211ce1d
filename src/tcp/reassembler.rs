use crate::tcp::byte_stream::Writer;
use tracing::trace;

/// Fixed-size reassembly window. Slot `i % len` holds absolute byte `i`.
#[derive(Debug)]
struct Window {
    bytes: Box<[u8]>,
    received: Box<[bool]>,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Window {
            bytes: vec![0u8; capacity].into_boxed_slice(),
            received: vec![false; capacity].into_boxed_slice(),
        }
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn slot(&self, idx: u64) -> usize {
        (idx % self.len()) as usize
    }
}

/// Turns out-of-order, overlapping substrings into a contiguous append stream.
///
/// The window is sized to the output's available capacity on the first `insert` and never
/// resized afterwards, even if the consumer later drains more room.
#[derive(Debug, Default)]
pub struct Reassembler {
    window: Option<Window>,
    base: u64,              // First byte not yet pushed to the output
    pending: u64,           // Bytes held in the window
    eof_index: Option<u64>, // One past the last byte, once it has fit in the window
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the substring starting at `first_index` and push any newly contiguous bytes
    /// into `output`.
    pub fn insert(
        &mut self,
        first_index: u64,
        data: &[u8],
        is_last_substring: bool,
        output: &mut impl Writer,
    ) {
        let capacity = self
            .window
            .get_or_insert_with(|| Window::new(output.available_capacity() as usize))
            .len();

        if output.is_closed() {
            return;
        }

        let end = first_index + data.len() as u64;
        let limit = self.base + capacity.min(output.available_capacity());

        if is_last_substring {
            if end <= limit {
                self.eof_index = Some(end);
            } else {
                trace!(end, limit, "end of stream falls outside the window");
            }
        }

        let start = first_index.max(self.base);
        let stop = end.min(limit).min(self.eof_index.unwrap_or(u64::MAX));
        if start < stop {
            self.store(first_index, data, start, stop);
        }

        self.flush(output);

        if let Some(eof) = self.eof_index {
            if self.base >= eof {
                output.close();
            }
        }
    }

    /// The number of bytes held that are not yet deliverable
    pub fn bytes_pending(&self) -> u64 {
        self.pending
    }

    /// The absolute index of the next byte the output expects
    pub fn first_unassembled_index(&self) -> u64 {
        self.base
    }

    /// The window size fixed on the first insertion, if any insertion has happened
    pub fn window_capacity(&self) -> Option<u64> {
        self.window.as_ref().map(Window::len)
    }

    /// Copy `data[start..stop]` (absolute indexes) into free slots; first writer wins
    fn store(&mut self, first_index: u64, data: &[u8], start: u64, stop: u64) {
        let Some(window) = self.window.as_mut() else {
            return;
        };
        for idx in start..stop {
            let slot = window.slot(idx);
            if window.received[slot] {
                continue;
            }
            window.bytes[slot] = data[(idx - first_index) as usize];
            window.received[slot] = true;
            self.pending += 1;
        }
    }

    /// Move the contiguous run at `base` into `output` with a single push
    fn flush(&mut self, output: &mut impl Writer) {
        let Some(window) = self.window.as_mut() else {
            return;
        };

        let mut run = Vec::new();
        while self.pending > 0 {
            let slot = window.slot(self.base);
            if !window.received[slot] {
                break;
            }
            window.received[slot] = false;
            run.push(window.bytes[slot]);
            self.base += 1;
            self.pending -= 1;
        }

        if !run.is_empty() {
            trace!(len = run.len(), base = self.base, "flushing contiguous bytes");
            output.push(&run);
        }
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp::byte_stream::{read, ByteStream, Reader};
    use rand::seq::SliceRandom;
    use rand::{Rng, RngCore};

    fn read_all_as_string(stream: &mut ByteStream) -> String {
        let mut buf = vec![];
        let len = stream.bytes_buffered();
        read(stream, len, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    // -- Test insert and capacity --

    #[test]
    fn test_insert_empty_data() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();
        ra.insert(0, b"", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 0);
        assert_eq!(ra.window_capacity(), Some(32));
        assert!(!stream.is_closed());
    }

    #[test]
    fn test_insert_empty_last_closes() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();
        ra.insert(0, b"", true, &mut stream);
        assert!(stream.is_closed());
        assert!(stream.is_finished());
    }

    #[test]
    fn test_insert_within_capacity() {
        let mut stream = ByteStream::new(15);
        let mut ra = Reassembler::new();

        ra.insert(0, b"Hello", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 5);
        assert_eq!(ra.first_unassembled_index(), 5);
        assert_eq!(ra.bytes_pending(), 0);
        assert_eq!("Hello", read_all_as_string(&mut stream));

        ra.insert(5, b"World", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 10);
        assert_eq!("World", read_all_as_string(&mut stream));

        ra.insert(10, b"Honda", true, &mut stream);
        assert_eq!(stream.bytes_pushed(), 15);
        assert_eq!(ra.first_unassembled_index(), 15);
        assert_eq!("Honda", read_all_as_string(&mut stream));
        assert!(stream.is_closed());
        assert!(stream.is_finished());
    }

    #[test]
    fn test_insert_beyond_capacity() {
        let mut stream = ByteStream::new(5);
        let mut ra = Reassembler::new();

        ra.insert(0, b"Hello", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 5);

        // No room until the reader drains the stream
        ra.insert(5, b"World", true, &mut stream);
        assert_eq!(stream.bytes_pushed(), 5);
        assert_eq!(ra.bytes_pending(), 0);
        assert!(!stream.is_closed());

        assert_eq!("Hello", read_all_as_string(&mut stream));

        ra.insert(5, b"World", true, &mut stream);
        assert_eq!(stream.bytes_pushed(), 10);
        assert_eq!("World", read_all_as_string(&mut stream));
        assert!(stream.is_finished());
    }

    #[test]
    fn test_capacity_overlapping_inserts() {
        let mut stream = ByteStream::new(1);
        let mut ra = Reassembler::new();

        ra.insert(0, b"ab", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 1);

        ra.insert(0, b"ab", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 1);

        assert_eq!("a", read_all_as_string(&mut stream));
        assert_eq!(stream.bytes_popped(), 1);

        ra.insert(0, b"abc", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 2);
        assert_eq!("b", read_all_as_string(&mut stream));
    }

    #[test]
    fn test_insert_beyond_capacity_with_different_data() {
        let mut stream = ByteStream::new(2);
        let mut ra = Reassembler::new();

        ra.insert(1, b"b", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 0);
        assert_eq!(ra.bytes_pending(), 1);

        ra.insert(2, b"bX", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 0);
        assert_eq!(ra.bytes_pending(), 1);

        ra.insert(0, b"a", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 2);
        assert_eq!(ra.bytes_pending(), 0);
        assert_eq!("ab", read_all_as_string(&mut stream));

        ra.insert(1, b"bc", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 3);
        assert_eq!("c", read_all_as_string(&mut stream));
    }

    #[test]
    fn test_insert_last_segment_beyond_capacity() {
        let mut stream = ByteStream::new(2);
        let mut ra = Reassembler::new();

        // The end of stream was truncated away, so it must not count yet
        ra.insert(1, b"bc", true, &mut stream);
        assert_eq!(stream.bytes_pushed(), 0);
        assert_eq!(ra.bytes_pending(), 1);

        ra.insert(0, b"a", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 2);
        assert!(!stream.is_closed());
        assert_eq!("ab", read_all_as_string(&mut stream));

        ra.insert(1, b"bc", true, &mut stream);
        assert_eq!(stream.bytes_pushed(), 3);
        assert_eq!("c", read_all_as_string(&mut stream));
        assert!(stream.is_finished());
    }

    #[test]
    fn test_window_fixed_at_first_insert() {
        let mut stream = ByteStream::new(8);
        stream.push(b"xxxxxx");
        let mut ra = Reassembler::new();

        ra.insert(0, b"ab", false, &mut stream);
        assert_eq!(ra.window_capacity(), Some(2));

        // Draining the stream does not grow the window
        stream.pop(8);
        ra.insert(2, b"cdefgh", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 10);
        assert_eq!(ra.first_unassembled_index(), 4);
        assert_eq!(ra.window_capacity(), Some(2));
    }

    #[test]
    fn test_insert_junk_after_close() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(0, b"abcd", false, &mut stream);
        ra.insert(4, b"efgh", true, &mut stream);
        assert_eq!("abcdefgh", read_all_as_string(&mut stream));
        assert!(stream.is_finished());

        ra.insert(8, b"zzz", false, &mut stream);
        assert_eq!("", read_all_as_string(&mut stream));
        assert_eq!(stream.bytes_pushed(), 8);
    }

    // -- Test sequential --

    #[test]
    fn test_sequential_combined() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(0, b"abcd", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 4);

        ra.insert(4, b"efgh", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 8);

        assert_eq!("abcdefgh", read_all_as_string(&mut stream));
    }

    #[test]
    fn test_sequential_immediate_read_loop() {
        let mut stream = ByteStream::new(4096);
        let mut ra = Reassembler::new();

        for i in 0..100 {
            assert_eq!(stream.bytes_pushed(), 4 * i);
            ra.insert(4 * i, b"abcd", false, &mut stream);
            assert_eq!("abcd", read_all_as_string(&mut stream));
        }
    }

    #[test]
    fn test_sequential_wraps_ring_many_times() {
        let mut stream = ByteStream::new(3);
        let mut ra = Reassembler::new();
        let mut combined = String::new();

        for i in 0..200u64 {
            let byte = [b'a' + (i % 26) as u8];
            ra.insert(i, &byte, false, &mut stream);
            combined.push_str(&read_all_as_string(&mut stream));
        }
        assert_eq!(combined.len(), 200);
        assert!(combined.starts_with("abcdefghijklmnopqrstuvwxyzabc"));
    }

    // -- Test duplicates --

    #[test]
    fn test_dup_at_same_index() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(0, b"abcd", false, &mut stream);
        assert_eq!("abcd", read_all_as_string(&mut stream));

        ra.insert(0, b"abcd", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 4);
        assert_eq!("", read_all_as_string(&mut stream));
    }

    #[test]
    fn test_dup_random_indexes() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();
        let data = b"abcdefgh";

        ra.insert(0, data, false, &mut stream);
        assert_eq!("abcdefgh", read_all_as_string(&mut stream));

        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let j = rng.gen_range(0..8);
            let k = rng.gen_range(j..8);

            ra.insert(j as u64, &data[j..k], false, &mut stream);
            assert_eq!(stream.bytes_pushed(), 8);
            assert_eq!("", read_all_as_string(&mut stream));
            assert!(!stream.is_closed());
        }
    }

    #[test]
    fn test_first_writer_wins() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(1, b"bc", false, &mut stream);
        ra.insert(1, b"XY", false, &mut stream);
        assert_eq!(ra.bytes_pending(), 2);

        ra.insert(0, b"a", false, &mut stream);
        assert_eq!("abc", read_all_as_string(&mut stream));
    }

    // -- Test holes --

    #[test]
    fn test_fill_gap_with_last() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(1, b"b", true, &mut stream);
        assert_eq!(stream.bytes_pushed(), 0);
        assert!(!stream.is_closed());

        ra.insert(0, b"a", false, &mut stream);
        assert_eq!("ab", read_all_as_string(&mut stream));
        assert!(stream.is_finished());
    }

    #[test]
    fn test_fill_multiple_gaps_with_chunks() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(1, b"b", false, &mut stream);
        ra.insert(3, b"d", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 0);
        assert_eq!(ra.bytes_pending(), 2);

        ra.insert(0, b"abc", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 4);
        assert_eq!("abcd", read_all_as_string(&mut stream));

        ra.insert(4, b"", true, &mut stream);
        assert_eq!(stream.bytes_pushed(), 4);
        assert!(stream.is_finished());
    }

    // -- Test overlapping segments --

    #[test]
    fn test_overlap_between_two_pending() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(1, b"bc", false, &mut stream);
        ra.insert(4, b"ef", false, &mut stream);
        assert_eq!(ra.bytes_pending(), 4);

        ra.insert(2, b"cde", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 0);
        assert_eq!(ra.bytes_pending(), 5);

        ra.insert(0, b"a", false, &mut stream);
        assert_eq!("abcdef", read_all_as_string(&mut stream));
        assert_eq!(ra.bytes_pending(), 0);
    }

    #[test]
    fn test_overlap_many_pending() {
        let mut stream = ByteStream::new(32);
        let mut ra = Reassembler::new();

        ra.insert(4, b"efgh", false, &mut stream);
        assert_eq!(ra.bytes_pending(), 4);

        ra.insert(14, b"op", false, &mut stream);
        assert_eq!(ra.bytes_pending(), 6);

        ra.insert(18, b"s", false, &mut stream);
        assert_eq!(ra.bytes_pending(), 7);

        ra.insert(0, b"a", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 1);
        assert_eq!(ra.bytes_pending(), 7);

        ra.insert(0, b"abcde", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 8);
        assert_eq!(ra.bytes_pending(), 3);

        ra.insert(14, b"opqrst", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 8);
        assert_eq!(ra.bytes_pending(), 6);

        ra.insert(8, b"ijklmn", false, &mut stream);
        assert_eq!(stream.bytes_pushed(), 20);
        assert_eq!(ra.bytes_pending(), 0);
    }

    #[test]
    fn test_random_shuffle() {
        let n_reps = 32;
        let n_segs = 128;
        let max_seg_len = 2048;
        let max_offset_shift = 1023;

        let mut rng = rand::thread_rng();
        for _ in 0..n_reps {
            let capacity = n_segs * max_seg_len;
            let mut stream = ByteStream::new(capacity as u64);
            let mut ra = Reassembler::new();

            let mut segments: Vec<(usize, usize)> = Vec::with_capacity(n_segs);
            let mut total_len = 0;

            // Generate segments with possible overlaps
            for _ in 0..n_segs {
                let seg_len = 1 + rng.gen_range(0..max_seg_len - 1);
                let shift = total_len.min(1 + rng.gen_range(0..max_offset_shift));
                let start = total_len - shift;
                segments.push((start, seg_len + shift));
                total_len += seg_len;
            }

            segments.shuffle(&mut rng);

            let mut payload = vec![0u8; total_len];
            rng.fill_bytes(&mut payload);

            for (start, size) in segments {
                let slice = &payload[start..(start + size)];
                let is_last = start + size == total_len;
                ra.insert(start as u64, slice, is_last, &mut stream);
                assert!(ra.bytes_pending() <= capacity as u64);
            }

            let mut buf = vec![];
            read(&mut stream, total_len as u64, &mut buf);
            assert_eq!(payload, buf);
            assert!(stream.is_finished());
        }
    }
}
