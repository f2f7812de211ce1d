use crate::tcp::errors::TcpError;
use std::io;
use std::io::{Read, Write};

/// A bounded, flow-controlled FIFO of bytes.
///
/// The producer side is only reachable through [`Writer`] and the consumer side through
/// [`Reader`], so an owner can hand out exactly one capability to each party.
#[derive(Debug)]
pub struct ByteStream {
    buffer: Vec<u8>, // Live bytes are `buffer[head..]`
    head: usize,
    capacity: u64,
    pushed: u64,
    popped: u64,
    closed: bool,  // Set only by `close`
    errored: bool, // Set only by `set_error`; independent of `closed`
}

/// The producer capability of a `ByteStream`
pub trait Writer {
    /// Push as much of `data` as fits; the excess is discarded
    fn push(&mut self, data: &[u8]);

    /// Signal that no more bytes will be pushed
    fn close(&mut self);

    /// Mark the stream as permanently broken. A broken stream is not closed.
    fn set_error(&mut self);

    fn is_closed(&self) -> bool;
    fn available_capacity(&self) -> u64;
    fn bytes_pushed(&self) -> u64;
}

/// The consumer capability of a `ByteStream`
pub trait Reader {
    /// View the buffered bytes without consuming them
    fn peek(&self) -> &[u8];

    /// Consume `len` bytes from the front.
    ///
    /// Panics if `len` exceeds `bytes_buffered()`.
    fn pop(&mut self, len: u64);

    /// The writer has closed; bytes may still be buffered
    fn input_ended(&self) -> bool;

    /// Closed and fully drained
    fn is_finished(&self) -> bool;
    fn has_error(&self) -> bool;
    fn bytes_buffered(&self) -> u64;
    fn bytes_popped(&self) -> u64;
}

impl ByteStream {
    pub fn new(capacity: u64) -> Self {
        ByteStream {
            buffer: Vec::new(),
            head: 0,
            capacity,
            pushed: 0,
            popped: 0,
            closed: false,
            errored: false,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Reclaim the consumed prefix once it dominates the allocation
    fn compact(&mut self) {
        if self.head > 0 && self.head >= self.buffer.len() / 2 {
            self.buffer.drain(..self.head);
            self.head = 0;
        }
    }
}

impl Writer for ByteStream {
    fn push(&mut self, data: &[u8]) {
        if self.closed || self.errored {
            return;
        }
        let to_write = data.len().min(self.available_capacity() as usize);
        if to_write == 0 {
            return;
        }
        self.compact();
        self.buffer.extend_from_slice(&data[..to_write]);
        self.pushed += to_write as u64;
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn set_error(&mut self) {
        self.errored = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn available_capacity(&self) -> u64 {
        self.capacity - self.bytes_buffered()
    }

    fn bytes_pushed(&self) -> u64 {
        self.pushed
    }
}

impl Reader for ByteStream {
    fn peek(&self) -> &[u8] {
        &self.buffer[self.head..]
    }

    fn pop(&mut self, len: u64) {
        let buffered = self.bytes_buffered();
        assert!(
            len <= buffered,
            "pop of {len} bytes exceeds the {buffered} bytes buffered"
        );
        self.head += len as usize;
        self.popped += len;
        if self.head == self.buffer.len() {
            self.buffer.clear();
            self.head = 0;
        }
    }

    fn input_ended(&self) -> bool {
        self.closed
    }

    fn is_finished(&self) -> bool {
        self.closed && self.bytes_buffered() == 0
    }

    fn has_error(&self) -> bool {
        self.errored
    }

    fn bytes_buffered(&self) -> u64 {
        self.pushed - self.popped
    }

    fn bytes_popped(&self) -> u64 {
        self.popped
    }
}

/// Pop up to `len` bytes from `reader` into `out`
pub fn read(reader: &mut impl Reader, len: u64, out: &mut Vec<u8>) {
    let mut remaining = len;
    while remaining > 0 {
        let view = reader.peek();
        if view.is_empty() {
            break;
        }
        let n = view.len().min(remaining as usize);
        out.extend_from_slice(&view[..n]);
        reader.pop(n as u64);
        remaining -= n as u64;
    }
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.has_error() {
            return Err(TcpError::StreamError.into());
        }
        if self.bytes_buffered() == 0 {
            if self.is_finished() {
                return Ok(0);
            }
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "stream is empty"));
        }
        let view = self.peek();
        let to_read = buf.len().min(view.len());
        buf[..to_read].copy_from_slice(&view[..to_read]);
        self.pop(to_read as u64);
        Ok(to_read)
    }
}

impl Write for ByteStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.has_error() {
            return Err(TcpError::StreamError.into());
        }
        if self.is_closed() {
            return Err(TcpError::StreamClosed.into());
        }
        let before = self.pushed;
        self.push(buf);
        Ok((self.pushed - before) as usize)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// -- Unit tests --
