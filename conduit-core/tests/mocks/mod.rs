//! Mock infrastructure for testing
//!
//! Scripted read capabilities, transport stream payloads and small
//! pipeline builders shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use conduit_core::error::Result;
use conduit_core::format::{
    CodecId, CompressionInfo, FormatDescriptor, FormatKind, PixelFormat, VideoFormat,
};
use conduit_core::node::{InputPort, Node};
use conduit_core::pipeline::Inputs;
use conduit_core::source::{FillUnit, ProduceUnit, Source};
use conduit_core::sources::{ChunkSource, MemorySource, TS_PACKET_SIZE};
use conduit_core::status::{Pull, ReadStatus};
use conduit_core::unit::{UnitBuffer, UnitMeta};

/// One step of a scripted capability
#[derive(Debug, Clone)]
pub enum Step {
    Unit(Vec<u8>),
    Status(ReadStatus),
}

/// Fill-style capability that plays back a script, then EOF
pub struct ScriptedFill {
    steps: VecDeque<Step>,
    pts: i64,
}

impl ScriptedFill {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            pts: 0,
        }
    }
}

impl FillUnit for ScriptedFill {
    fn fill(&mut self, unit: &mut UnitBuffer) -> ReadStatus {
        match self.steps.pop_front() {
            Some(Step::Unit(payload)) => {
                unit.set_data(&payload);
                unit.set_meta(UnitMeta {
                    pts: Some(self.pts),
                    ..UnitMeta::default()
                });
                self.pts += 1;
                ReadStatus::Ok
            }
            Some(Step::Status(status)) => status,
            None => ReadStatus::Eof,
        }
    }
}

/// Source-allocating capability that plays back a script, then EOF
pub struct ScriptedProduce {
    steps: VecDeque<Step>,
    own: UnitBuffer,
}

impl ScriptedProduce {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            own: UnitBuffer::new(),
        }
    }
}

impl ProduceUnit for ScriptedProduce {
    fn produce(&mut self) -> Pull<'_> {
        match self.steps.pop_front() {
            Some(Step::Unit(payload)) => {
                self.own.reset();
                self.own.set_data(&payload);
                Pull::Unit(&self.own)
            }
            Some(Step::Status(status)) => Pull::from_status(status),
            None => Pull::Eof,
        }
    }
}

/// Node that forwards units and raises needs-restart whenever the shared
/// flag is set from outside
pub struct FlaggedNode {
    ports: Vec<InputPort>,
    output: Option<FormatDescriptor>,
    restart: Arc<AtomicBool>,
    pub negotiations: usize,
}

impl FlaggedNode {
    pub fn new(restart: Arc<AtomicBool>) -> Self {
        Self {
            ports: vec![InputPort::any()],
            output: None,
            restart,
            negotiations: 0,
        }
    }
}

impl Node for FlaggedNode {
    fn name(&self) -> &str {
        "flagged"
    }

    fn input_ports(&self) -> &[InputPort] {
        &self.ports
    }

    fn input_ports_mut(&mut self) -> &mut [InputPort] {
        &mut self.ports
    }

    fn set_input_format(&mut self, _port: usize, format: &mut FormatDescriptor) -> Result<()> {
        self.output = Some(format.clone());
        self.restart.store(false, Ordering::SeqCst);
        self.negotiations += 1;
        Ok(())
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.output.clone()
    }

    fn needs_restart(&self) -> bool {
        self.restart.load(Ordering::SeqCst)
    }

    fn read(&mut self, inputs: &mut Inputs<'_>, unit: &mut UnitBuffer) -> ReadStatus {
        inputs.read_into(0, unit)
    }
}

/// `count` transport stream packets, each starting with the sync byte
/// and carrying its index in byte 1
pub fn ts_packets(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| {
            let mut packet = vec![0u8; TS_PACKET_SIZE];
            packet[0] = 0x47;
            packet[1] = i as u8;
            packet
        })
        .collect()
}

/// MPEG-TS compression descriptor with 188-byte packets
pub fn ts_format() -> CompressionInfo {
    CompressionInfo::new(CodecId::MpegTs).with_max_packet_size(TS_PACKET_SIZE)
}

/// Source-allocating transport stream source over `count` packets
pub fn ts_source(count: usize) -> Source {
    Source::producing("ts", ChunkSource::new(std::io::Cursor::new(ts_packets(count)), TS_PACKET_SIZE))
        .with_format(ts_format())
}

/// Fill-style video source replaying `count` small frames
pub fn video_source(width: u32, height: u32, fps: u32, count: usize) -> Source {
    let frames = (0..count).map(|i| vec![i as u8; 16]);
    Source::filling("camera", MemorySource::from_payloads(frames))
        .with_format(VideoFormat::new(width, height, fps))
}

/// Packed RGB video layout
pub fn rgb(width: u32, height: u32, fps: u32) -> VideoFormat {
    VideoFormat {
        pixel_format: PixelFormat::Rgb24,
        ..VideoFormat::new(width, height, fps)
    }
}

/// Fill-style RGB source whose frames are full-size; frame `i` is
/// filled with byte `i`
pub fn rgb_source(width: u32, height: u32, fps: u32, count: usize) -> Source {
    let format = rgb(width, height, fps);
    let frames = (0..count).map(move |i| vec![i as u8; format.frame_bytes()]);
    Source::filling("rgb-camera", MemorySource::from_payloads(frames)).with_format(format)
}

/// Video descriptor of a stage, unwrapped
pub fn video_of(format: Option<&FormatDescriptor>) -> VideoFormat {
    let format = format.expect("format present");
    assert_eq!(format.kind(), FormatKind::Video);
    *format.as_video().expect("video descriptor")
}
