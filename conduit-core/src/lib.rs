//! Conduit Core Library
//!
//! Pull-based media pipeline core: sources deliver units of encoded or
//! decoded media on demand, nodes transform them, and a negotiation pass
//! agrees on the format of every edge before the first read.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ Source          │───▶│ Node chain   │───▶│ Serving layer   │
//! │ (fill/produce)  │    │ (negotiated) │    │ (reads units)   │
//! └─────────────────┘    └──────────────┘    └─────────────────┘
//! ```
//!
//! The consumer drives everything by reading the terminal stage; each
//! read recurses upstream and yields exactly one unit or a status.

pub mod config;
pub mod error;
pub mod format;
pub mod node;
pub mod nodes;
pub mod params;
pub mod pipeline;
pub mod source;
pub mod sources;
pub mod status;
pub mod unit;

pub use config::{BufferConfig, ConfigFile, DriverConfig};
pub use error::{ConduitError, Result, ResultExt};
pub use format::{AudioFormat, CompressionInfo, FormatDescriptor, FormatKind, FormatSet, VideoFormat};
pub use node::{InputPort, Node, Realign};
pub use params::{ParamValue, ParameterInfo};
pub use pipeline::{Inputs, Pipeline, PipelineStats, RunSummary, SourceId};
pub use source::{FillUnit, ProduceUnit, Source};
pub use status::{Pull, ReadStatus};
pub use unit::{UnitBuffer, UnitFlags, UnitMeta};
