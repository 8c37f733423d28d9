//! Bundled read capabilities
//!
//! - [`MemorySource`]: replays units held in memory (fill-style)
//! - [`ChunkSource`]: slices any [`std::io::Read`] into fixed-size units
//!   (source-allocating)
//! - [`QueueSource`]: units handed over by another thread (fill-style)

mod chunked;
mod memory;
mod queue;

pub use chunked::ChunkSource;
pub use memory::MemorySource;
pub use queue::{QueueHandle, QueueSource};

/// MPEG transport stream packet size
pub const TS_PACKET_SIZE: usize = 188;
