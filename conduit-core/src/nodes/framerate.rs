use tracing::debug;

use crate::error::{ConduitError, Result};
use crate::format::{FormatDescriptor, FormatKind, VideoFormat};
use crate::node::{InputPort, Node, Realign};
use crate::params::{find_parameter, ParamKind, ParamValue, ParameterInfo};
use crate::pipeline::Inputs;
use crate::status::ReadStatus;
use crate::unit::UnitBuffer;

/// Puts video on a constant framerate grid
///
/// With `fps` set, the output runs at exactly that rate and every unit
/// is restamped on the grid: pts `n * frame_duration`, duration one
/// frame. With `fps = 0` the input rate is kept and, if it is constant,
/// units are still restamped on its grid.
#[derive(Debug, Clone)]
pub struct Framerate {
    ports: Vec<InputPort>,
    fps: u32,
    output: Option<VideoFormat>,
    frames: i64,
    restart: bool,
}

impl Framerate {
    /// Grid at `fps` frames per second; 0 keeps the input rate
    pub fn new(fps: u32) -> Self {
        Self {
            ports: vec![InputPort::new(FormatKind::Video)],
            fps,
            output: None,
            frames: 0,
            restart: false,
        }
    }

    /// Frames restamped since the last negotiation
    pub fn frames(&self) -> i64 {
        self.frames
    }

    fn input(&self) -> Option<VideoFormat> {
        self.ports[0].format().and_then(FormatDescriptor::as_video).copied()
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Node for Framerate {
    fn name(&self) -> &str {
        "framerate"
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
            .ok_or_else(|| ConduitError::negotiation("framerate", port, "needs a video format"))?;

        let mut output = *video;
        if self.fps > 0 {
            output.set_fps(self.fps);
            debug!("Output rate snapped from {} to {}", video, output);
        }
        self.output = Some(output);
        self.restart = false;
        Ok(())
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.output.map(FormatDescriptor::from)
    }

    /// Frame layout changes go upstream with the input timing; the grid
    /// itself is fixed by `fps`
    fn realign_output(&mut self, format: &FormatDescriptor) -> Result<Realign> {
        let video = format.as_video().ok_or_else(|| {
            ConduitError::negotiation("framerate", 0, "cannot realign video output to another kind")
        })?;
        let (Some(output), Some(input)) = (self.output, self.input()) else {
            return Err(ConduitError::negotiation("framerate", 0, "realign before negotiation"));
        };
        if output.frame_duration != video.frame_duration || output.timescale != video.timescale {
            return Err(ConduitError::negotiation(
                "framerate",
                0,
                format!("downstream asked for {} but the grid is fixed at {}", video, output),
            ));
        }

        let forwarded = VideoFormat {
            width: video.width,
            height: video.height,
            pixel_format: video.pixel_format,
            ..input
        };
        self.output = Some(*video);
        Ok(Realign::Upstream {
            port: 0,
            format: forwarded.into(),
        })
    }

    fn needs_restart(&self) -> bool {
        self.restart
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo {
            name: "fps",
            label: "Frames per second",
            kind: ParamKind::Int,
            default: ParamValue::Int(0),
            min: Some(0.0),
            max: Some(1000.0),
            help: "Constant output rate (0 keeps the input rate)",
            restart: true,
        }]
    }

    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        (name == "fps").then(|| ParamValue::Int(self.fps as i64))
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let params = self.parameters();
        let info = find_parameter(&params, name)
            .ok_or_else(|| ConduitError::unknown_parameter(self.name(), name))?;
        let fps = info.validate(value)?.as_i64().unwrap_or_default() as u32;
        if fps != self.fps {
            self.fps = fps;
            self.restart = true;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.frames = 0;
    }

    fn read(&mut self, inputs: &mut Inputs<'_>, unit: &mut UnitBuffer) -> ReadStatus {
        let status = inputs.read_into(0, unit);
        if status != ReadStatus::Ok {
            return status;
        }

        if let Some(output) = self.output.filter(VideoFormat::is_constant_rate) {
            let duration = output.frame_duration as i64;
            let meta = unit.meta_mut();
            meta.pts = Some(self.frames * duration);
            meta.duration = Some(duration);
        }
        self.frames += 1;
        ReadStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snaps_output_rate() {
        let mut node = Framerate::new(30);
        let mut offer = FormatDescriptor::from(VideoFormat::new(1280, 720, 60));
        node.set_input_format(0, &mut offer).unwrap();

        assert_eq!(offer.as_video().unwrap().fps(), Some(60.0));
        let output = node.output_format().unwrap();
        assert_eq!(output.as_video().unwrap().fps(), Some(30.0));
        assert_eq!(output.as_video().unwrap().frame_duration, 3000);
    }

    #[test]
    fn test_zero_keeps_input_rate() {
        let mut node = Framerate::new(0);
        let mut offer = FormatDescriptor::from(VideoFormat::new(640, 480, 25));
        node.set_input_format(0, &mut offer).unwrap();
        assert_eq!(node.output_format(), Some(offer));
    }

    #[test]
    fn test_realign_forwards_size_with_input_timing() {
        let mut node = Framerate::new(30);
        let mut offer = FormatDescriptor::from(VideoFormat::new(1920, 1080, 60));
        node.set_input_format(0, &mut offer).unwrap();
        node.ports[0].set_format(offer);

        let smaller = FormatDescriptor::from(VideoFormat::new(1280, 720, 30));
        match node.realign_output(&smaller).unwrap() {
            Realign::Upstream { port, format } => {
                assert_eq!(port, 0);
                assert_eq!(format, VideoFormat::new(1280, 720, 60).into());
            }
            other => panic!("unexpected answer: {:?}", other),
        }
        assert_eq!(node.output_format(), Some(smaller));

        let retimed = FormatDescriptor::from(VideoFormat::new(1280, 720, 25));
        assert!(node.realign_output(&retimed).is_err());
    }

    #[test]
    fn test_fps_change_raises_restart() {
        let mut node = Framerate::new(30);
        node.set_parameter("fps", &ParamValue::Int(30)).unwrap();
        assert!(!node.needs_restart());
        node.set_parameter("fps", &ParamValue::Int(24)).unwrap();
        assert!(node.needs_restart());
        assert!(node.set_parameter("fps", &ParamValue::Int(-1)).is_err());
    }
}
