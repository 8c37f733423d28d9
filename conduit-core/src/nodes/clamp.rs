use tracing::debug;

use crate::error::{ConduitError, Result};
use crate::format::{FormatDescriptor, FormatKind, VideoFormat};
use crate::node::{InputPort, Node, Realign};
use crate::params::{find_parameter, ParamKind, ParamValue, ParameterInfo};
use crate::pipeline::Inputs;
use crate::status::ReadStatus;
use crate::unit::UnitBuffer;

const DEFAULT_MAX_WIDTH: u32 = 1920;
const DEFAULT_MAX_HEIGHT: u32 = 1080;

/// Limits the video frame size
///
/// Offers larger than the limits are clamped downward during
/// negotiation, which asks the upstream stage to deliver the smaller
/// size. Units pass through untouched, so something upstream (a
/// [`Scale`](super::Scale) node, typically) has to do the resizing.
#[derive(Debug, Clone)]
pub struct Clamp {
    ports: Vec<InputPort>,
    max_width: u32,
    max_height: u32,
    output: Option<VideoFormat>,
    restart: bool,
}

impl Clamp {
    /// Clamp to at most `max_width` x `max_height`
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            ports: vec![InputPort::new(FormatKind::Video)],
            max_width,
            max_height,
            output: None,
            restart: false,
        }
    }

    /// Current limits as (width, height)
    pub fn max_size(&self) -> (u32, u32) {
        (self.max_width, self.max_height)
    }
}

impl Default for Clamp {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WIDTH, DEFAULT_MAX_HEIGHT)
    }
}

fn size_param(name: &'static str, label: &'static str, default: u32) -> ParameterInfo {
    ParameterInfo {
        name,
        label,
        kind: ParamKind::Int,
        default: ParamValue::Int(default as i64),
        min: Some(16.0),
        max: Some(16384.0),
        help: "Frames larger than this are clamped down",
        restart: true,
    }
}

impl Node for Clamp {
    fn name(&self) -> &str {
        "clamp"
    }

    fn input_ports(&self) -> &[InputPort] {
        &self.ports
    }

    fn input_ports_mut(&mut self) -> &mut [InputPort] {
        &mut self.ports
    }

    fn set_input_format(&mut self, port: usize, format: &mut FormatDescriptor) -> Result<()> {
        let video = format
            .as_video_mut()
            .ok_or_else(|| ConduitError::negotiation("clamp", port, "needs a video format"))?;

        if video.width > self.max_width || video.height > self.max_height {
            debug!(
                "Clamping {}x{} to at most {}x{}",
                video.width, video.height, self.max_width, self.max_height
            );
            video.width = video.width.min(self.max_width);
            video.height = video.height.min(self.max_height);
        }

        self.output = Some(*video);
        self.restart = false;
        Ok(())
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.output.map(FormatDescriptor::from)
    }

    fn realign_output(&mut self, format: &FormatDescriptor) -> Result<Realign> {
        let video = format
            .as_video()
            .ok_or_else(|| ConduitError::negotiation("clamp", 0, "can only deliver video"))?;
        if video.width > self.max_width || video.height > self.max_height {
            return Err(ConduitError::negotiation(
                "clamp",
                0,
                format!("{} exceeds the {}x{} limit", video, self.max_width, self.max_height),
            ));
        }
        self.output = Some(*video);
        Ok(Realign::Upstream {
            port: 0,
            format: format.clone(),
        })
    }

    fn needs_restart(&self) -> bool {
        self.restart
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![
            size_param("max_width", "Maximum width", DEFAULT_MAX_WIDTH),
            size_param("max_height", "Maximum height", DEFAULT_MAX_HEIGHT),
        ]
    }

    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        match name {
            "max_width" => Some(ParamValue::Int(self.max_width as i64)),
            "max_height" => Some(ParamValue::Int(self.max_height as i64)),
            _ => None,
        }
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let params = self.parameters();
        let info = find_parameter(&params, name)
            .ok_or_else(|| ConduitError::unknown_parameter(self.name(), name))?;
        let value = info.validate(value)?.as_i64().unwrap_or_default() as u32;

        let slot = match name {
            "max_width" => &mut self.max_width,
            _ => &mut self.max_height,
        };
        if *slot != value {
            *slot = value;
            self.restart = true;
        }
        Ok(())
    }

    fn read(&mut self, inputs: &mut Inputs<'_>, unit: &mut UnitBuffer) -> ReadStatus {
        inputs.read_into(0, unit)
    }
}
