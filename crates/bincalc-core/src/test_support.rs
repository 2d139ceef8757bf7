//! In-memory connections and fixed bit sources for host tests.

use alloc::vec::Vec;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};

use crate::switches::{BitSource, BitVector};

/// Bit source that always returns the same vector.
pub struct FixedSource(pub BitVector);

impl BitSource for FixedSource {
    fn sample(&self) -> BitVector {
        self.0
    }
}

/// A connection that replays `input` in chunks and records everything written.
#[derive(Debug, Default)]
pub struct MockStream {
    input: Vec<u8>,
    cursor: usize,
    chunk: usize,
    fail_writes: bool,
    pub output: Vec<u8>,
}

impl MockStream {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.to_vec(),
            cursor: 0,
            chunk: usize::MAX,
            fail_writes: false,
            output: Vec::new(),
        }
    }

    /// Deliver at most `chunk` bytes per read.
    pub fn chunked(mut self, chunk: usize) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn bytes_read(&self) -> usize {
        self.cursor
    }
}

impl ErrorType for MockStream {
    type Error = ErrorKind;
}

impl Read for MockStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = &self.input[self.cursor..];
        let n = remaining.len().min(buf.len()).min(self.chunk);
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        Ok(n)
    }
}

impl Write for MockStream {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err(ErrorKind::BrokenPipe);
        }
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
