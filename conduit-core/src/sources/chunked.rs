use std::io::{ErrorKind, Read};

use tracing::{debug, warn};

use crate::source::ProduceUnit;
use crate::status::Pull;
use crate::unit::{UnitBuffer, UnitMeta};

/// Source-allocating capability that cuts a byte stream into fixed-size
/// units
///
/// Every unit is `chunk_size` bytes except possibly the last, which
/// carries whatever remained. Read errors end the stream with `ERROR`.
pub struct ChunkSource<R> {
    reader: R,
    chunk_size: usize,
    unit: UnitBuffer,
    index: i64,
    done: bool,
}

impl<R: Read + Send> ChunkSource<R> {
    /// Cut `reader` into units of `chunk_size` bytes
    ///
    /// # Panics
    /// If `chunk_size` is zero.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            reader,
            chunk_size,
            unit: UnitBuffer::with_capacity(chunk_size),
            index: 0,
            done: false,
        }
    }

    /// Size of every unit but possibly the last
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Units produced so far
    pub fn produced(&self) -> u64 {
        self.index as u64
    }

    fn fill_chunk(&mut self) -> std::io::Result<usize> {
        self.unit.resize(self.chunk_size);
        let mut filled = 0;
        while filled < self.chunk_size {
            match self.reader.read(&mut self.unit.data_mut()[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.unit.resize(filled);
        Ok(filled)
    }
}

impl<R: Read + Send> ProduceUnit for ChunkSource<R> {
    fn produce(&mut self) -> Pull<'_> {
        if self.done {
            return Pull::Eof;
        }

        self.unit.reset();
        match self.fill_chunk() {
            Ok(0) => {
                debug!("Chunk source drained after {} units", self.index);
                self.done = true;
                Pull::Eof
            }
            Ok(len) => {
                if len < self.chunk_size {
                    debug!("Short trailing chunk of {} bytes", len);
                    self.done = true;
                }
                self.unit.set_meta(UnitMeta {
                    pts: Some(self.index),
                    ..UnitMeta::default()
                });
                self.index += 1;
                Pull::Unit(&self.unit)
            }
            Err(e) => {
                warn!("Chunk source read failed: {}", e);
                self.done = true;
                Pull::Error
            }
        }
    }
}
