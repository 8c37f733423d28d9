//! Format descriptors
//!
//! A stream's shape is described by one of three fixed-shape value types:
//! compression parameters, an audio layout or a video layout. Descriptors
//! are copied by value when attached to a source and are read-only from
//! then on; consumers only ever see borrowed views.

use serde::{Deserialize, Serialize};

/// Which descriptor slot a format occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Compressed packets
    Compression,
    /// Decoded audio frames
    Audio,
    /// Decoded video frames
    Video,
}

impl FormatKind {
    /// All kinds, in slot order
    pub const ALL: [FormatKind; 3] = [Self::Compression, Self::Audio, Self::Video];

    fn slot(self) -> usize {
        match self {
            Self::Compression => 0,
            Self::Audio => 1,
            Self::Video => 2,
        }
    }
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compression => write!(f, "compression"),
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Codec identifier for compressed streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    #[default]
    Unknown,
    H264,
    Hevc,
    Av1,
    Vp9,
    Mpeg2Video,
    Aac,
    Opus,
    Mp3,
    Ac3,
    Flac,
    /// MPEG transport stream packets
    MpegTs,
}

impl std::str::FromStr for CodecId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "h264" | "avc" => Ok(Self::H264),
            "hevc" | "h265" => Ok(Self::Hevc),
            "av1" => Ok(Self::Av1),
            "vp9" => Ok(Self::Vp9),
            "mpeg2" | "mpeg2video" => Ok(Self::Mpeg2Video),
            "aac" => Ok(Self::Aac),
            "opus" => Ok(Self::Opus),
            "mp3" => Ok(Self::Mp3),
            "ac3" => Ok(Self::Ac3),
            "flac" => Ok(Self::Flac),
            "ts" | "mpegts" => Ok(Self::MpegTs),
            _ => Err(format!("Unknown codec: {}", s)),
        }
    }
}

/// Compression parameters of a packet stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionInfo {
    /// Codec of the packets
    pub codec: CodecId,
    /// Nominal bitrate in bits per second, if known
    pub bitrate: Option<u32>,
    /// Largest packet the stream will carry (0 = unknown)
    pub max_packet_size: usize,
    /// Codec setup data sent out of band
    #[serde(default)]
    pub global_header: Vec<u8>,
    /// Every packet is a keyframe
    #[serde(default)]
    pub keyframes_only: bool,
    /// Packets arrive in decode order, not presentation order
    #[serde(default)]
    pub has_b_frames: bool,
}

impl CompressionInfo {
    /// Compression parameters for a codec, everything else unknown
    pub fn new(codec: CodecId) -> Self {
        Self {
            codec,
            ..Self::default()
        }
    }

    /// Set the maximum packet size
    pub fn with_max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Set the nominal bitrate
    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }
}

/// Audio sample format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    #[default]
    S16,
    S32,
    F32,
}

impl SampleFormat {
    /// Bytes per sample
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
        }
    }
}

/// Interleaved audio layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Channel count
    pub channels: u16,
    /// Sample format
    pub sample_format: SampleFormat,
    /// Samples per channel in one frame
    pub samples_per_frame: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            sample_format: SampleFormat::S16,
            samples_per_frame: 1024,
        }
    }
}

impl AudioFormat {
    /// Payload size of one full frame in bytes
    pub fn frame_bytes(&self) -> usize {
        self.samples_per_frame as usize
            * self.channels as usize
            * self.sample_format.bytes_per_sample()
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {:?}, {} samples/frame",
            self.sample_rate, self.channels, self.sample_format, self.samples_per_frame
        )
    }
}

/// Pixel format of decoded video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    #[default]
    Yuv420p,
    Nv12,
    Yuyv422,
    Rgb24,
    Rgba32,
    Bgra32,
    /// 10-bit 4:2:0 semi-planar
    P010,
}

impl PixelFormat {
    /// Frame size in bytes for the given dimensions
    pub fn frame_bytes(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            Self::Yuv420p | Self::Nv12 => pixels * 3 / 2,
            Self::P010 => pixels * 3,
            Self::Yuyv422 => pixels * 2,
            Self::Rgb24 => pixels * 3,
            Self::Rgba32 | Self::Bgra32 => pixels * 4,
        }
    }
}

/// Video frame layout and timing
///
/// The framerate is `timescale / frame_duration`. A frame duration of 0
/// marks a variable-framerate stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub pixel_format: PixelFormat,
    /// Timestamp ticks per second
    pub timescale: u32,
    /// Ticks per frame (0 = variable)
    pub frame_duration: u32,
}

impl Default for VideoFormat {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::Yuv420p,
            timescale: 90000,
            frame_duration: 3000,
        }
    }
}

impl VideoFormat {
    /// Constant-rate format with the given size and integer framerate
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        let mut format = Self {
            width,
            height,
            ..Self::default()
        };
        format.set_fps(fps);
        format
    }

    /// Frames per second, or `None` for variable framerate
    pub fn fps(&self) -> Option<f64> {
        if self.frame_duration == 0 || self.timescale == 0 {
            None
        } else {
            Some(self.timescale as f64 / self.frame_duration as f64)
        }
    }

    /// True for constant-framerate streams
    pub fn is_constant_rate(&self) -> bool {
        self.frame_duration != 0
    }

    /// Switch to a constant integer framerate, keeping the timescale
    /// when it divides evenly
    pub fn set_fps(&mut self, fps: u32) {
        if fps == 0 {
            self.frame_duration = 0;
            return;
        }
        if self.timescale == 0 || self.timescale % fps != 0 {
            self.timescale = fps;
        }
        self.frame_duration = self.timescale / fps;
    }

    /// Payload size of one frame in bytes
    pub fn frame_bytes(&self) -> usize {
        self.pixel_format.frame_bytes(self.width, self.height)
    }
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {:?}", self.width, self.height, self.pixel_format)?;
        match self.fps() {
            Some(fps) => write!(f, " @ {:.3}fps", fps),
            None => write!(f, " @ vfr"),
        }
    }
}

/// One format descriptor of any kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FormatDescriptor {
    Compression(CompressionInfo),
    Audio(AudioFormat),
    Video(VideoFormat),
}

impl FormatDescriptor {
    /// Slot this descriptor occupies
    pub fn kind(&self) -> FormatKind {
        match self {
            Self::Compression(_) => FormatKind::Compression,
            Self::Audio(_) => FormatKind::Audio,
            Self::Video(_) => FormatKind::Video,
        }
    }

    /// Compression parameters, if this is one
    pub fn as_compression(&self) -> Option<&CompressionInfo> {
        match self {
            Self::Compression(info) => Some(info),
            _ => None,
        }
    }

    /// Audio layout, if this is one
    pub fn as_audio(&self) -> Option<&AudioFormat> {
        match self {
            Self::Audio(format) => Some(format),
            _ => None,
        }
    }

    /// Video layout, if this is one
    pub fn as_video(&self) -> Option<&VideoFormat> {
        match self {
            Self::Video(format) => Some(format),
            _ => None,
        }
    }

    /// Mutable video layout, if this is one
    pub fn as_video_mut(&mut self) -> Option<&mut VideoFormat> {
        match self {
            Self::Video(format) => Some(format),
            _ => None,
        }
    }

    /// Mutable audio layout, if this is one
    pub fn as_audio_mut(&mut self) -> Option<&mut AudioFormat> {
        match self {
            Self::Audio(format) => Some(format),
            _ => None,
        }
    }
}

impl From<CompressionInfo> for FormatDescriptor {
    fn from(info: CompressionInfo) -> Self {
        Self::Compression(info)
    }
}

impl From<AudioFormat> for FormatDescriptor {
    fn from(format: AudioFormat) -> Self {
        Self::Audio(format)
    }
}

impl From<VideoFormat> for FormatDescriptor {
    fn from(format: VideoFormat) -> Self {
        Self::Video(format)
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compression(info) => {
                write!(f, "{:?}", info.codec)?;
                if let Some(bitrate) = info.bitrate {
                    write!(f, " {} bps", bitrate)?;
                }
                Ok(())
            }
            Self::Audio(format) => write!(f, "{}", format),
            Self::Video(format) => write!(f, "{}", format),
        }
    }
}

/// At most one descriptor per kind
///
/// An empty slot means the format is established later by negotiation,
/// not that the stream has no format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatSet {
    slots: [Option<FormatDescriptor>; 3],
}

impl FormatSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a descriptor, replacing any previous one of the same kind
    pub fn insert(&mut self, format: impl Into<FormatDescriptor>) {
        let format = format.into();
        let slot = format.kind().slot();
        self.slots[slot] = Some(format);
    }

    /// Builder form of [`FormatSet::insert`]
    pub fn with(mut self, format: impl Into<FormatDescriptor>) -> Self {
        self.insert(format);
        self
    }

    /// Borrow the descriptor of a kind
    pub fn get(&self, kind: FormatKind) -> Option<&FormatDescriptor> {
        self.slots[kind.slot()].as_ref()
    }

    /// True if no slot is filled
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Present descriptors in slot order
    pub fn iter(&self) -> impl Iterator<Item = &FormatDescriptor> {
        self.slots.iter().flatten()
    }

    /// Compression parameters, if present
    pub fn compression(&self) -> Option<&CompressionInfo> {
        self.get(FormatKind::Compression)
            .and_then(FormatDescriptor::as_compression)
    }

    /// Audio layout, if present
    pub fn audio(&self) -> Option<&AudioFormat> {
        self.get(FormatKind::Audio).and_then(FormatDescriptor::as_audio)
    }

    /// Video layout, if present
    pub fn video(&self) -> Option<&VideoFormat> {
        self.get(FormatKind::Video).and_then(FormatDescriptor::as_video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_set_slots_are_independent() {
        let set = FormatSet::new()
            .with(VideoFormat::new(1280, 720, 30))
            .with(CompressionInfo::new(CodecId::H264));

        assert!(set.video().is_some());
        assert!(set.compression().is_some());
        assert!(set.audio().is_none());
        assert!(set.get(FormatKind::Audio).is_none());
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn test_format_set_insert_replaces_same_kind() {
        let mut set = FormatSet::new().with(VideoFormat::new(640, 480, 25));
        set.insert(VideoFormat::new(1920, 1080, 50));
        assert_eq!(set.video().map(|v| v.width), Some(1920));
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn test_set_fps_keeps_divisible_timescale() {
        let mut video = VideoFormat::default();
        video.set_fps(25);
        assert_eq!(video.timescale, 90000);
        assert_eq!(video.frame_duration, 3600);

        video.set_fps(7);
        assert_eq!(video.timescale, 7);
        assert_eq!(video.frame_duration, 1);
        assert_eq!(video.fps(), Some(7.0));

        video.set_fps(0);
        assert!(!video.is_constant_rate());
        assert_eq!(video.fps(), None);
    }

    #[test]
    fn test_frame_bytes() {
        let video = VideoFormat::new(4, 4, 30);
        assert_eq!(video.frame_bytes(), 24);
        let audio = AudioFormat::default();
        assert_eq!(audio.frame_bytes(), 1024 * 2 * 2);
    }

    #[test]
    fn test_codec_from_str() {
        assert_eq!("TS".parse::<CodecId>(), Ok(CodecId::MpegTs));
        assert!("nope".parse::<CodecId>().is_err());
    }
}
