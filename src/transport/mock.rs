//! Scripted in-memory transport for tests and examples
//!
//! Replies are queued as chunks; each `read_available` call hands out the
//! next chunk, which lets a test script partial or garbled reads as well as
//! clean ones. Everything written to the transport is recorded for
//! assertions.

use super::{Transport, TransportError};
use std::collections::VecDeque;

/// A scripted [`Transport`] backed by in-memory buffers.
#[derive(Debug, Default)]
pub struct MockTransport {
    written: Vec<Vec<u8>>,
    chunks: VecDeque<Vec<u8>>,
    fail_writes: bool,
}

impl MockTransport {
    /// Create an empty mock with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one read chunk. Chunks are consumed in FIFO order, one per
    /// `read_available` call.
    pub fn push_reply(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        self.chunks.push_back(chunk.as_ref().to_vec());
        self
    }

    /// Make every subsequent `write` fail with an I/O error.
    pub fn fail_writes(&mut self) -> &mut Self {
        self.fail_writes = true;
        self
    }

    /// Everything written so far, one entry per `write` call.
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// The last written entry, lossily decoded for assertion messages.
    pub fn last_written_str(&self) -> String {
        self.written
            .last()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .unwrap_or_default()
    }

    /// Number of read chunks not yet consumed.
    pub fn remaining_replies(&self) -> usize {
        self.chunks.len()
    }
}

impl Transport for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        self.written.push(data.to_vec());
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        Ok(self.chunks.front().map_or(0, Vec::len))
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self.chunks.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_consumed_in_order() {
        let mut mock = MockTransport::new();
        mock.push_reply(b"first").push_reply(b"second");

        assert_eq!(mock.bytes_available().unwrap(), 5);
        assert_eq!(mock.read_available().unwrap(), b"first");
        assert_eq!(mock.read_available().unwrap(), b"second");
        assert_eq!(mock.bytes_available().unwrap(), 0);
        assert!(mock.read_available().unwrap().is_empty());
    }

    #[test]
    fn test_writes_recorded() {
        let mut mock = MockTransport::new();
        mock.write(b"AT\r\n").unwrap();
        assert_eq!(mock.written(), &[b"AT\r\n".to_vec()]);
        assert_eq!(mock.last_written_str(), "AT\r\n");
    }

    #[test]
    fn test_scripted_write_failure() {
        let mut mock = MockTransport::new();
        mock.fail_writes();
        assert!(matches!(
            mock.write(b"AT\r\n"),
            Err(TransportError::Io(_))
        ));
    }
}
