//! Sources: the pull endpoint of a pipeline
//!
//! A [`Source`] wraps one read capability and the format descriptors of
//! the stream it produces. The capability comes in two calling
//! conventions:
//!
//! - [`FillUnit`] writes into a buffer handed to it. Reads into a caller
//!   buffer are zero-copy.
//! - [`ProduceUnit`] owns its buffer and lends it out. Reads into a
//!   caller buffer need one copy; reads without a caller buffer borrow
//!   the producer's buffer directly.
//!
//! Which convention a source uses is fixed at construction, so the type
//! of the wrapped capability decides which path copies.

use serde::Serialize;
use tracing::{debug, trace};

use crate::format::{FormatDescriptor, FormatKind, FormatSet};
use crate::status::{Pull, ReadStatus};
use crate::unit::UnitBuffer;

/// Read capability that fills a buffer supplied by its caller
///
/// On `Ok` the implementation must leave `unit` holding exactly the new
/// unit, payload and metadata. On any other status it must leave `unit`
/// untouched, so callers never see partial writes.
pub trait FillUnit: Send {
    /// Produce the next unit into `unit`
    fn fill(&mut self, unit: &mut UnitBuffer) -> ReadStatus;
}

impl<F> FillUnit for F
where
    F: FnMut(&mut UnitBuffer) -> ReadStatus + Send,
{
    fn fill(&mut self, unit: &mut UnitBuffer) -> ReadStatus {
        self(unit)
    }
}

/// Read capability that allocates and owns the buffer it returns
///
/// The returned borrow is valid until the next call.
pub trait ProduceUnit: Send {
    /// Produce the next unit into storage owned by the implementation
    fn produce(&mut self) -> Pull<'_>;
}

/// Which side of a read supplies the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Allocation {
    /// The capability fills the caller's buffer
    Caller,
    /// The capability returns its own buffer
    Source,
}

/// Read counters for one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Read calls made
    pub reads: u64,
    /// Reads that delivered a unit
    pub delivered: u64,
    /// Payload copies performed
    pub copies: u64,
    /// Bytes moved by those copies
    pub bytes_copied: u64,
}

enum Reader {
    Fill(Box<dyn FillUnit>),
    Produce(Box<dyn ProduceUnit>),
}

/// Pull endpoint wrapping a read capability and its formats
pub struct Source {
    name: String,
    reader: Reader,
    formats: FormatSet,
    scratch: UnitBuffer,
    stats: SourceStats,
}

impl Source {
    /// Wrap a capability that fills the caller's buffer
    pub fn filling(name: impl Into<String>, reader: impl FillUnit + 'static) -> Self {
        Self::with_reader(name.into(), Reader::Fill(Box::new(reader)))
    }

    /// Wrap a capability that returns its own buffer
    pub fn producing(name: impl Into<String>, reader: impl ProduceUnit + 'static) -> Self {
        Self::with_reader(name.into(), Reader::Produce(Box::new(reader)))
    }

    fn with_reader(name: String, reader: Reader) -> Self {
        Self {
            name,
            reader,
            formats: FormatSet::new(),
            scratch: UnitBuffer::new(),
            stats: SourceStats::default(),
        }
    }

    /// Attach a copy of a descriptor, replacing any of the same kind
    pub fn with_format(mut self, format: impl Into<FormatDescriptor>) -> Self {
        let format = format.into();
        debug!("Source {} publishes {} format: {}", self.name, format.kind(), format);
        self.formats.insert(format);
        self
    }

    /// Attach every descriptor of a set
    pub fn with_formats(mut self, formats: &FormatSet) -> Self {
        for format in formats.iter() {
            self = self.with_format(format.clone());
        }
        self
    }

    /// Reserve scratch space up front for fill-style reads without a
    /// caller buffer
    pub fn with_scratch_capacity(mut self, capacity: usize) -> Self {
        self.scratch.reserve(capacity);
        self
    }

    /// Source name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Calling convention of the wrapped capability
    pub fn allocation(&self) -> Allocation {
        match self.reader {
            Reader::Fill(_) => Allocation::Caller,
            Reader::Produce(_) => Allocation::Source,
        }
    }

    /// Every attached descriptor
    pub fn formats(&self) -> &FormatSet {
        &self.formats
    }

    /// Borrow the descriptor of a kind; never fabricates a default
    pub fn get_format(&self, kind: FormatKind) -> Option<&FormatDescriptor> {
        self.formats.get(kind)
    }

    /// Read counters
    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    /// Read the next unit into a caller-supplied buffer
    ///
    /// `Ok` means `dst` now holds the fresh unit. Any other status leaves
    /// `dst` exactly as it was.
    pub fn read_into(&mut self, dst: &mut UnitBuffer) -> ReadStatus {
        self.stats.reads += 1;
        let status = match &mut self.reader {
            Reader::Fill(reader) => reader.fill(dst),
            Reader::Produce(reader) => match reader.produce() {
                Pull::Unit(produced) => {
                    dst.copy_from(produced);
                    self.stats.copies += 1;
                    self.stats.bytes_copied += produced.len() as u64;
                    ReadStatus::Ok
                }
                other => other.status(),
            },
        };
        if status.is_ok() {
            self.stats.delivered += 1;
        } else {
            trace!("Source {} read: {}", self.name, status);
        }
        status
    }

    /// Read the next unit without supplying a buffer
    ///
    /// Fill-style capabilities write into the source's scratch buffer;
    /// source-allocating ones lend their own. Either way no copy happens.
    pub fn read(&mut self) -> Pull<'_> {
        self.stats.reads += 1;
        let pull = match &mut self.reader {
            Reader::Fill(reader) => {
                self.scratch.reset();
                match reader.fill(&mut self.scratch) {
                    ReadStatus::Ok => Pull::Unit(&self.scratch),
                    status => Pull::from_status(status),
                }
            }
            Reader::Produce(reader) => reader.produce(),
        };
        match pull {
            Pull::Unit(_) => self.stats.delivered += 1,
            ref other => trace!("Source {} read: {}", self.name, other.status()),
        }
        pull
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("name", &self.name)
            .field("allocation", &self.allocation())
            .field("formats", &self.formats)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::VideoFormat;

    struct Counter {
        next: u8,
        limit: u8,
        own: UnitBuffer,
    }

    impl ProduceUnit for Counter {
        fn produce(&mut self) -> Pull<'_> {
            if self.next == self.limit {
                return Pull::Eof;
            }
            self.own.reset();
            self.own.set_data(&[self.next; 4]);
            self.own.meta_mut().pts = Some(self.next as i64);
            self.next += 1;
            Pull::Unit(&self.own)
        }
    }

    #[test]
    fn test_get_format_never_fabricates() {
        let source = Source::filling("empty", |_: &mut UnitBuffer| ReadStatus::Eof);
        for kind in FormatKind::ALL {
            assert!(source.get_format(kind).is_none());
        }

        let source = source.with_format(VideoFormat::new(640, 480, 30));
        assert!(source.get_format(FormatKind::Video).is_some());
        assert!(source.get_format(FormatKind::Audio).is_none());
    }

    #[test]
    fn test_fill_into_caller_buffer_is_zero_copy() {
        let mut source = Source::filling("fill", |unit: &mut UnitBuffer| {
            unit.set_data(&[9u8; 64]);
            ReadStatus::Ok
        });
        let mut dst = UnitBuffer::with_capacity(128);
        let ptr = dst.as_ptr();

        assert_eq!(source.read_into(&mut dst), ReadStatus::Ok);
        assert_eq!(dst.as_ptr(), ptr);
        assert_eq!(dst.len(), 64);
        assert_eq!(source.stats().copies, 0);
        assert_eq!(source.allocation(), Allocation::Caller);
    }

    #[test]
    fn test_produce_into_caller_buffer_copies() {
        let mut source = Source::producing(
            "produce",
            Counter {
                next: 0,
                limit: 2,
                own: UnitBuffer::new(),
            },
        );
        let mut dst = UnitBuffer::new();

        assert_eq!(source.read_into(&mut dst), ReadStatus::Ok);
        assert_eq!(dst.data(), &[0u8; 4]);
        assert_eq!(dst.meta().pts, Some(0));
        assert_eq!(source.stats().copies, 1);
        assert_eq!(source.stats().bytes_copied, 4);
    }

    #[test]
    fn test_produce_without_buffer_lends_own() {
        let mut source = Source::producing(
            "produce",
            Counter {
                next: 0,
                limit: 1,
                own: UnitBuffer::new(),
            },
        );

        match source.read() {
            Pull::Unit(unit) => assert_eq!(unit.data(), &[0u8; 4]),
            other => panic!("expected a unit, got {:?}", other.status()),
        }
        assert_eq!(source.read().status(), ReadStatus::Eof);
        assert_eq!(source.stats().copies, 0);
        assert_eq!(source.stats().reads, 2);
        assert_eq!(source.stats().delivered, 1);
    }

    #[test]
    fn test_fill_without_buffer_uses_reset_scratch() {
        let mut source = Source::filling("fill", |unit: &mut UnitBuffer| {
            assert!(unit.is_empty());
            unit.extend_from_slice(b"xy");
            ReadStatus::Ok
        })
        .with_scratch_capacity(32);

        for _ in 0..3 {
            let pull = source.read();
            assert_eq!(pull.unit().map(|u| u.data()), Some(&b"xy"[..]));
        }
    }

    #[test]
    fn test_non_ok_leaves_destination_untouched() {
        let mut source = Source::producing(
            "done",
            Counter {
                next: 0,
                limit: 0,
                own: UnitBuffer::new(),
            },
        );
        let mut dst = UnitBuffer::from_slice(b"previous");
        dst.meta_mut().pts = Some(42);

        assert_eq!(source.read_into(&mut dst), ReadStatus::Eof);
        assert_eq!(dst.data(), b"previous");
        assert_eq!(dst.meta().pts, Some(42));
    }
}
