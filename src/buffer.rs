//! Growable byte buffer used to assemble bulk payloads.

use std::fmt;
use std::io::{self, Read, Write};

use tracing::warn;

const READ_CHUNK: usize = 1024;

/// Owned, append-only buffer whose contents are read back in place.
///
/// `reset` truncates logically and keeps the allocation, so a single buffer serves every
/// row of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BytesArray {
    bytes: Vec<u8>,
}

impl BytesArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Drains `reader` until end of stream. Errors from dropping the reader afterwards
    /// cannot surface; read errors do.
    pub fn read_from<R: Read>(reader: R) -> io::Result<Self> {
        let mut array = Self::new();
        array.append_from(reader)?;
        Ok(array)
    }

    pub fn append_from<R: Read>(&mut self, mut reader: R) -> io::Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => {
                    self.bytes.extend_from_slice(&chunk[..read]);
                    total += read;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(total)
    }

    pub fn add(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    pub fn add_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl Write for BytesArray {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.add(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AsRef<[u8]> for BytesArray {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Display for BytesArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

/// Closes a resource whose work is already done. Failures are logged and dropped.
pub fn close_quietly<E: fmt::Display>(what: &str, result: Result<(), E>) {
    if let Err(err) = result {
        warn!("Ignoring error while closing {}: {}", what, err);
    }
}
