//! Node contract
//!
//! A node is one processing stage: it owns its input ports, negotiates
//! its operating format from what upstream offers, and produces one
//! output stream that downstream ports pull from.
//!
//! Negotiation runs once per pipeline shape, origin to terminal:
//!
//! 1. the pipeline offers each port the upstream output format;
//! 2. [`Node::set_input_format`] may adjust the offer in place (clamp the
//!    frame size, snap the framerate) and the pipeline adopts the
//!    adjusted value as the edge format;
//! 3. an adjusted offer is sent back upstream through
//!    [`Node::realign_output`]. The upstream node either delivers it
//!    itself or hands the request to its own upstream ([`Realign`]).
//!    The walk ends at a node that adopts it, or at an origin that
//!    already publishes it. Anything else fails negotiation;
//! 4. [`Node::output_format`] is offered to the next stage.
//!
//! A configuration change that invalidates the agreed formats raises
//! [`Node::needs_restart`] and the pipeline renegotiates the node and
//! everything after it before reading on.

use serde::Serialize;

use crate::error::{ConduitError, Result};
use crate::format::{FormatDescriptor, FormatKind};
use crate::params::{ParamValue, ParameterInfo};
use crate::pipeline::{Inputs, SourceId};
use crate::status::ReadStatus;
use crate::unit::UnitBuffer;

/// Attachment point for one upstream stream
#[derive(Debug, Clone, Serialize)]
pub struct InputPort {
    accepts: Option<FormatKind>,
    upstream: Option<SourceId>,
    stream_index: usize,
    format: Option<FormatDescriptor>,
}

impl InputPort {
    /// Port that accepts only descriptors of `kind`
    pub fn new(kind: FormatKind) -> Self {
        Self {
            accepts: Some(kind),
            upstream: None,
            stream_index: 0,
            format: None,
        }
    }

    /// Port that accepts any descriptor kind
    pub fn any() -> Self {
        Self {
            accepts: None,
            ..Self::new(FormatKind::Compression)
        }
    }

    /// Descriptor kind the port accepts (`None` = any)
    pub fn accepts(&self) -> Option<FormatKind> {
        self.accepts
    }

    /// Bind the port to an upstream stream
    ///
    /// # Panics
    /// If the port is already bound. Rebinding is a wiring bug, not a
    /// runtime condition.
    pub fn bind(&mut self, upstream: SourceId, stream_index: usize) {
        assert!(
            self.upstream.is_none(),
            "input port already bound to {:?}",
            self.upstream
        );
        self.upstream = Some(upstream);
        self.stream_index = stream_index;
    }

    /// True once bound
    pub fn is_bound(&self) -> bool {
        self.upstream.is_some()
    }

    /// Upstream the port is bound to
    pub fn upstream(&self) -> Option<SourceId> {
        self.upstream
    }

    /// Stream of the upstream this port reads
    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Format the node accepted on this port
    pub fn format(&self) -> Option<&FormatDescriptor> {
        self.format.as_ref()
    }

    /// Record the format the node accepted
    pub fn set_format(&mut self, format: FormatDescriptor) {
        self.format = Some(format);
    }
}

/// Answer of a node asked to deliver a different output format
#[derive(Debug, Clone, PartialEq)]
pub enum Realign {
    /// The node delivers the requested format itself from now on
    Adopted,
    /// The node forwards its input unchanged, so the stage bound to
    /// `port` has to deliver `format` instead
    Upstream {
        port: usize,
        format: FormatDescriptor,
    },
}

/// A processing stage
///
/// Implementations provide the format logic and the read transform; the
/// port bookkeeping and parameter plumbing have defaults.
pub trait Node: Send {
    /// Node name used in logs and errors
    fn name(&self) -> &str;

    /// Input ports
    fn input_ports(&self) -> &[InputPort];

    /// Mutable input ports
    fn input_ports_mut(&mut self) -> &mut [InputPort];

    /// Bind an input port to an upstream stream
    ///
    /// # Panics
    /// If the port does not exist or is already bound.
    fn connect(&mut self, port: usize, upstream: SourceId, stream_index: usize) {
        let count = self.input_ports().len();
        match self.input_ports_mut().get_mut(port) {
            Some(input) => input.bind(upstream, stream_index),
            None => panic!("port {} out of range ({} input ports)", port, count),
        }
    }

    /// Accept an offered input format, adjusting it in place to what the
    /// node will actually operate on
    ///
    /// Clears a pending restart. Fails only if no adjustment of the offer
    /// is acceptable.
    fn set_input_format(&mut self, port: usize, format: &mut FormatDescriptor) -> Result<()>;

    /// Output format given the accepted inputs
    fn output_format(&self) -> Option<FormatDescriptor>;

    /// A downstream port adjusted this node's output
    ///
    /// On success [`Node::output_format`] must report `format` afterwards.
    /// Nodes whose output is fixed by their configuration keep the
    /// default, which rejects.
    fn realign_output(&mut self, format: &FormatDescriptor) -> Result<Realign> {
        Err(ConduitError::negotiation(
            self.name(),
            0,
            format!("cannot deliver {} instead of its own output", format),
        ))
    }

    /// True when a configuration change invalidated the negotiated formats
    fn needs_restart(&self) -> bool {
        false
    }

    /// Published parameters
    fn parameters(&self) -> Vec<ParameterInfo> {
        Vec::new()
    }

    /// Current value of a parameter
    fn get_parameter(&self, _name: &str) -> Option<ParamValue> {
        None
    }

    /// Change a parameter
    fn set_parameter(&mut self, name: &str, _value: &ParamValue) -> Result<()> {
        Err(ConduitError::unknown_parameter(self.name(), name))
    }

    /// Drop per-stream state before renegotiation
    fn reset(&mut self) {}

    /// Pull from the inputs and write one output unit into `unit`
    ///
    /// Follows the fill contract: on `Ok` the unit holds exactly the new
    /// output, on any other status it is untouched. Upstream `AGAIN`,
    /// `EOF` and `ERROR` are forwarded as-is.
    fn read(&mut self, inputs: &mut Inputs<'_>, unit: &mut UnitBuffer) -> ReadStatus;
}
