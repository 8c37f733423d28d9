use tracing::{debug, error};

use crate::error::{ConduitError, Result};
use crate::format::{FormatDescriptor, FormatKind, PixelFormat, VideoFormat};
use crate::node::{InputPort, Node, Realign};
use crate::params::{find_parameter, ParamKind, ParamValue, ParameterInfo};
use crate::pipeline::Inputs;
use crate::status::ReadStatus;
use crate::unit::UnitBuffer;

/// Resizes raw video frames with nearest-neighbour sampling
///
/// The target size comes from the `width`/`height` parameters (0 keeps
/// the input dimension). A downstream port that needs a different size,
/// such as a [`Clamp`](super::Clamp), can realign the output to it during
/// negotiation. Packed RGB formats and planar yuv420p are supported.
#[derive(Debug, Clone)]
pub struct Scale {
    ports: Vec<InputPort>,
    width: u32,
    height: u32,
    input: Option<VideoFormat>,
    output: Option<VideoFormat>,
    staging: UnitBuffer,
    restart: bool,
}

impl Scale {
    /// Scale to `width` x `height`; 0 keeps the input dimension
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            ports: vec![InputPort::new(FormatKind::Video)],
            width,
            height,
            input: None,
            output: None,
            staging: UnitBuffer::new(),
            restart: false,
        }
    }

    fn needs_scaling(&self) -> Option<(VideoFormat, VideoFormat)> {
        match (self.input, self.output) {
            (Some(input), Some(output))
                if (input.width, input.height) != (output.width, output.height) =>
            {
                Some((input, output))
            }
            _ => None,
        }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

fn supported(format: PixelFormat) -> bool {
    matches!(
        format,
        PixelFormat::Yuv420p | PixelFormat::Rgb24 | PixelFormat::Rgba32 | PixelFormat::Bgra32
    )
}

/// Chroma subsampling needs even dimensions
fn even_for(format: PixelFormat, value: u32) -> u32 {
    match format {
        PixelFormat::Yuv420p => (value & !1).max(2),
        _ => value.max(1),
    }
}

fn scale_plane(
    src: &[u8],
    (src_w, src_h): (usize, usize),
    dst: &mut [u8],
    (dst_w, dst_h): (usize, usize),
    bytes_per_pixel: usize,
) {
    for y in 0..dst_h {
        let sy = y * src_h / dst_h;
        for x in 0..dst_w {
            let sx = x * src_w / dst_w;
            let s = (sy * src_w + sx) * bytes_per_pixel;
            let d = (y * dst_w + x) * bytes_per_pixel;
            dst[d..d + bytes_per_pixel].copy_from_slice(&src[s..s + bytes_per_pixel]);
        }
    }
}

/// Scale one frame of `input` layout into `dst`, sized for `output`
fn scale_frame(src: &[u8], input: &VideoFormat, dst: &mut [u8], output: &VideoFormat) {
    let src_size = (input.width as usize, input.height as usize);
    let dst_size = (output.width as usize, output.height as usize);

    match input.pixel_format {
        PixelFormat::Yuv420p => {
            let src_luma = src_size.0 * src_size.1;
            let dst_luma = dst_size.0 * dst_size.1;
            let src_chroma = (src_size.0 / 2, src_size.1 / 2);
            let dst_chroma = (dst_size.0 / 2, dst_size.1 / 2);
            let src_plane = src_chroma.0 * src_chroma.1;
            let dst_plane = dst_chroma.0 * dst_chroma.1;

            let (src_y, src_uv) = src.split_at(src_luma);
            let (dst_y, dst_uv) = dst.split_at_mut(dst_luma);
            scale_plane(src_y, src_size, dst_y, dst_size, 1);
            let (src_u, src_v) = src_uv.split_at(src_plane);
            let (dst_u, dst_v) = dst_uv.split_at_mut(dst_plane);
            scale_plane(src_u, src_chroma, dst_u, dst_chroma, 1);
            scale_plane(src_v, src_chroma, dst_v, dst_chroma, 1);
        }
        PixelFormat::Rgb24 => scale_plane(src, src_size, dst, dst_size, 3),
        _ => scale_plane(src, src_size, dst, dst_size, 4),
    }
}

fn size_param(name: &'static str, label: &'static str) -> ParameterInfo {
    ParameterInfo {
        name,
        label,
        kind: ParamKind::Int,
        default: ParamValue::Int(0),
        min: Some(0.0),
        max: Some(16384.0),
        help: "Output size in pixels (0 keeps the input size)",
        restart: true,
    }
}

impl Node for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn input_ports(&self) -> &[InputPort] {
        &self.ports
    }

    fn input_ports_mut(&mut self) -> &mut [InputPort] {
        &mut self.ports
    }

    fn set_input_format(&mut self, port: usize, format: &mut FormatDescriptor) -> Result<()> {
        let video = format
            .as_video()
            .ok_or_else(|| ConduitError::negotiation("scale", port, "needs a video format"))?;
        if !supported(video.pixel_format) {
            return Err(ConduitError::negotiation(
                "scale",
                port,
                format!("cannot scale {:?} frames", video.pixel_format),
            ));
        }

        let mut output = *video;
        if self.width > 0 {
            output.width = even_for(output.pixel_format, self.width);
        }
        if self.height > 0 {
            output.height = even_for(output.pixel_format, self.height);
        }
        if output != *video {
            debug!("Scaling {} to {}x{}", video, output.width, output.height);
        }

        self.input = Some(*video);
        self.output = Some(output);
        self.restart = false;
        Ok(())
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.output.map(FormatDescriptor::from)
    }

    /// Any frame size is deliverable; layout and timing are not converted
    fn realign_output(&mut self, format: &FormatDescriptor) -> Result<Realign> {
        let (Some(input), Some(video)) = (self.input, format.as_video()) else {
            return Err(ConduitError::negotiation("scale", 0, format!("cannot deliver {}", format)));
        };
        let resized = VideoFormat {
            width: video.width,
            height: video.height,
            ..input
        };
        if resized != *video {
            return Err(ConduitError::negotiation(
                "scale",
                0,
                format!("only changes the frame size of {}, asked for {}", input, video),
            ));
        }
        if video.width == 0
            || video.height == 0
            || even_for(video.pixel_format, video.width) != video.width
            || even_for(video.pixel_format, video.height) != video.height
        {
            return Err(ConduitError::negotiation(
                "scale",
                0,
                format!("cannot produce {}x{} frames", video.width, video.height),
            ));
        }

        self.output = Some(*video);
        Ok(Realign::Adopted)
    }

    fn needs_restart(&self) -> bool {
        self.restart
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![size_param("width", "Width"), size_param("height", "Height")]
    }

    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        match name {
            "width" => Some(ParamValue::Int(self.width as i64)),
            "height" => Some(ParamValue::Int(self.height as i64)),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let params = self.parameters();
        let info = find_parameter(&params, name)
            .ok_or_else(|| ConduitError::unknown_parameter(self.name(), name))?;
        let value = info.validate(value)?.as_i64().unwrap_or_default() as u32;

        let slot = match name {
            "width" => &mut self.width,
            _ => &mut self.height,
        };
        if *slot != value {
            *slot = value;
            self.restart = true;
        }
        Ok(())
    }

    fn read(&mut self, inputs: &mut Inputs<'_>, unit: &mut UnitBuffer) -> ReadStatus {
        let Some((input, output)) = self.needs_scaling() else {
            return inputs.read_into(0, unit);
        };

        let status = inputs.read_into(0, &mut self.staging);
        if status != ReadStatus::Ok {
            return status;
        }
        if self.staging.len() != input.frame_bytes() {
            error!(
                "Scale got {} bytes, a {} frame is {}",
                self.staging.len(),
                input,
                input.frame_bytes()
            );
            return ReadStatus::Error;
        }

        unit.reset();
        unit.resize(output.frame_bytes());
        scale_frame(self.staging.data(), &input, unit.data_mut(), &output);
        unit.set_meta(*self.staging.meta());
        ReadStatus::Ok
    }
}
