use crate::error::Result;
use crate::format::FormatDescriptor;
use crate::node::{InputPort, Node, Realign};
use crate::pipeline::Inputs;
use crate::status::ReadStatus;
use crate::unit::UnitBuffer;

/// Forwards units and formats unchanged; accepts any kind
///
/// A realignment request is handed on to the upstream stage, since the
/// node delivers exactly what it reads.
#[derive(Debug, Clone)]
pub struct Passthrough {
    ports: Vec<InputPort>,
    output: Option<FormatDescriptor>,
}

impl Passthrough {
    /// Passthrough with one unbound port
    pub fn new() -> Self {
        Self {
            ports: vec![InputPort::any()],
            output: None,
        }
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn input_ports(&self) -> &[InputPort] {
        &self.ports
    }

    fn input_ports_mut(&mut self) -> &mut [InputPort] {
        &mut self.ports
    }

    fn set_input_format(&mut self, _port: usize, format: &mut FormatDescriptor) -> Result<()> {
        self.output = Some(format.clone());
        Ok(())
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.output.clone()
    }

    fn realign_output(&mut self, format: &FormatDescriptor) -> Result<Realign> {
        self.output = Some(format.clone());
        Ok(Realign::Upstream {
            port: 0,
            format: format.clone(),
        })
    }

    fn read(&mut self, inputs: &mut Inputs<'_>, unit: &mut UnitBuffer) -> ReadStatus {
        inputs.read_into(0, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::VideoFormat;

    #[test]
    fn test_realign_forwards_upstream() {
        let mut node = Passthrough::new();
        let mut offer = FormatDescriptor::from(VideoFormat::new(1920, 1080, 30));
        node.set_input_format(0, &mut offer).unwrap();

        let smaller = FormatDescriptor::from(VideoFormat::new(1280, 720, 30));
        let answer = node.realign_output(&smaller).unwrap();
        assert_eq!(
            answer,
            Realign::Upstream {
                port: 0,
                format: smaller.clone()
            }
        );
        assert_eq!(node.output_format(), Some(smaller));
    }
}
