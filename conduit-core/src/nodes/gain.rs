use tracing::debug;

use crate::error::{ConduitError, Result};
use crate::format::{AudioFormat, FormatDescriptor, FormatKind, SampleFormat};
use crate::node::{InputPort, Node, Realign};
use crate::params::{find_parameter, ParamKind, ParamValue, ParameterInfo};
use crate::pipeline::Inputs;
use crate::status::ReadStatus;
use crate::unit::UnitBuffer;

/// Scales interleaved signed 16-bit audio
///
/// Other sample formats are adjusted to s16 during negotiation. Gain
/// changes apply from the next unit on, without renegotiation.
#[derive(Debug, Clone)]
pub struct Gain {
    ports: Vec<InputPort>,
    gain_db: f64,
    factor: f32,
    output: Option<AudioFormat>,
}

impl Gain {
    /// Gain of `gain_db` decibels; 0 leaves samples untouched
    pub fn new(gain_db: f64) -> Self {
        Self {
            ports: vec![InputPort::new(FormatKind::Audio)],
            gain_db,
            factor: db_to_factor(gain_db),
            output: None,
        }
    }

    /// Current gain in decibels
    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

fn db_to_factor(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

/// Scale little-endian s16 samples in place, saturating at the limits
fn apply_gain(samples: &mut [u8], factor: f32) {
    for sample in samples.chunks_exact_mut(2) {
        let value = i16::from_le_bytes([sample[0], sample[1]]) as f32 * factor;
        let scaled = value.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        sample.copy_from_slice(&scaled.to_le_bytes());
    }
}

impl Node for Gain {
    fn name(&self) -> &str {
        "gain"
    }

    fn input_ports(&self) -> &[InputPort] {
        &self.ports
    }

    fn input_ports_mut(&mut self) -> &mut [InputPort] {
        &mut self.ports
    }

    fn set_input_format(&mut self, port: usize, format: &mut FormatDescriptor) -> Result<()> {
        let audio = format
            .as_audio_mut()
            .ok_or_else(|| ConduitError::negotiation("gain", port, "needs an audio format"))?;

        if audio.sample_format != SampleFormat::S16 {
            debug!("Asking for s16 instead of {:?}", audio.sample_format);
            audio.sample_format = SampleFormat::S16;
        }
        self.output = Some(*audio);
        Ok(())
    }

    fn output_format(&self) -> Option<FormatDescriptor> {
        self.output.map(FormatDescriptor::from)
    }

    fn realign_output(&mut self, format: &FormatDescriptor) -> Result<Realign> {
        let audio = format
            .as_audio()
            .filter(|audio| audio.sample_format == SampleFormat::S16)
            .ok_or_else(|| {
                ConduitError::negotiation("gain", 0, format!("only delivers s16 audio, not {}", format))
            })?;
        self.output = Some(*audio);
        Ok(Realign::Upstream {
            port: 0,
            format: format.clone(),
        })
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![ParameterInfo {
            name: "gain_db",
            label: "Gain (dB)",
            kind: ParamKind::Float,
            default: ParamValue::Float(0.0),
            min: Some(-60.0),
            max: Some(24.0),
            help: "Amplification applied to every sample",
            restart: false,
        }]
    }

    fn get_parameter(&self, name: &str) -> Option<ParamValue> {
        (name == "gain_db").then(|| ParamValue::Float(self.gain_db))
    }

    fn set_parameter(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let params = self.parameters();
        let info = find_parameter(&params, name)
            .ok_or_else(|| ConduitError::unknown_parameter(self.name(), name))?;
        self.gain_db = info.validate(value)?.as_f64().unwrap_or_default();
        self.factor = db_to_factor(self.gain_db);
        Ok(())
    }

    fn read(&mut self, inputs: &mut Inputs<'_>, unit: &mut UnitBuffer) -> ReadStatus {
        let status = inputs.read_into(0, unit);
        if status == ReadStatus::Ok && self.gain_db != 0.0 {
            apply_gain(unit.data_mut(), self.factor);
        }
        status
    }
}
