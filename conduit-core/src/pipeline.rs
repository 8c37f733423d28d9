//! Pipeline graph and driver
//!
//! The [`Pipeline`] owns every source and node of one processing graph.
//! Stages are stored in insertion order and a port may only bind to a
//! stage added before its node, so the graph is a DAG by construction
//! and reads recurse strictly toward the origin.
//!
//! ```text
//! ┌──────────┐    ┌────────┐    ┌────────┐    ┌──────────┐
//! │  Source  │───▶│ Node 1 │───▶│ Node 2 │───▶│ consumer │
//! └──────────┘    └────────┘    └────────┘    └──────────┘
//!        ◀──────────── read (pull) ─────────────
//!        ──────────── negotiation ─────────────▶
//! ```

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::DriverConfig;
use crate::error::{ConduitError, Result};
use crate::format::{FormatDescriptor, FormatKind};
use crate::node::{InputPort, Node, Realign};
use crate::params::{ParamValue, ParameterInfo};
use crate::source::{FillUnit, Source};
use crate::status::{Pull, ReadStatus};
use crate::unit::UnitBuffer;

/// Handle to a source or node inside one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourceId(usize);

impl SourceId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position in the pipeline, origin first
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    slot: usize,
    stream: usize,
}

struct Stage {
    node: Box<dyn Node>,
    bindings: Vec<Option<Binding>>,
    output: Option<FormatDescriptor>,
    /// Stage whose port asked this one to change its output
    realigned_for: Option<usize>,
    scratch: UnitBuffer,
}

impl Stage {
    fn reads_from(&self, slot: usize) -> bool {
        self.bindings.iter().flatten().any(|b| b.slot == slot)
    }
}

enum Slot {
    Origin(Vec<Source>),
    Stage(Stage),
}

impl Slot {
    fn name(&self) -> &str {
        match self {
            Slot::Origin(streams) => streams.first().map_or("origin", |s| s.name()),
            Slot::Stage(stage) => stage.node.name(),
        }
    }

    fn stream_count(&self) -> usize {
        match self {
            Slot::Origin(streams) => streams.len(),
            Slot::Stage(_) => 1,
        }
    }
}

/// Read access to the upstream streams of one node
///
/// Handed to [`Node::read`]; each call pulls exactly one unit from the
/// stream bound to the given port.
pub struct Inputs<'a> {
    slots: &'a mut [Slot],
    bindings: &'a [Option<Binding>],
}

impl Inputs<'_> {
    /// Number of ports
    pub fn port_count(&self) -> usize {
        self.bindings.len()
    }

    /// Pull one unit from `port` into `unit`
    ///
    /// Follows the source contract: `Ok` means `unit` is fresh, anything
    /// else leaves it untouched.
    pub fn read_into(&mut self, port: usize, unit: &mut UnitBuffer) -> ReadStatus {
        match self.binding(port) {
            Some(binding) => read_slot(self.slots, binding, unit),
            None => ReadStatus::Error,
        }
    }

    /// Pull one unit from `port` without supplying a buffer
    pub fn read(&mut self, port: usize) -> Pull<'_> {
        match self.binding(port) {
            Some(binding) => pull_slot(self.slots, binding),
            None => Pull::Error,
        }
    }

    fn binding(&self, port: usize) -> Option<Binding> {
        let binding = self.bindings.get(port).copied().flatten();
        if binding.is_none() {
            error!("Read from unbound input port {}", port);
        }
        binding
    }
}

fn read_slot(slots: &mut [Slot], binding: Binding, unit: &mut UnitBuffer) -> ReadStatus {
    let (upstream, rest) = slots.split_at_mut(binding.slot);
    match &mut rest[0] {
        Slot::Origin(streams) => streams[binding.stream].read_into(unit),
        Slot::Stage(stage) => {
            let mut inputs = Inputs {
                slots: upstream,
                bindings: &stage.bindings,
            };
            stage.node.read(&mut inputs, unit)
        }
    }
}

fn pull_slot(slots: &mut [Slot], binding: Binding) -> Pull<'_> {
    let (upstream, rest) = slots.split_at_mut(binding.slot);
    match &mut rest[0] {
        Slot::Origin(streams) => streams[binding.stream].read(),
        Slot::Stage(stage) => {
            let mut inputs = Inputs {
                slots: upstream,
                bindings: &stage.bindings,
            };
            match stage.node.read(&mut inputs, &mut stage.scratch) {
                ReadStatus::Ok => Pull::Unit(&stage.scratch),
                status => Pull::from_status(status),
            }
        }
    }
}

/// Pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Units delivered from the terminal
    pub units: u64,
    /// Payload bytes delivered from the terminal
    pub bytes: u64,
    /// Reads that answered AGAIN
    pub again: u64,
    /// Completed negotiation passes
    pub negotiations: u64,
    /// Renegotiations triggered by needs-restart
    pub restarts: u64,
}

/// Result of [`Pipeline::pump`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PumpOutcome {
    /// Units handed to the consumer
    pub units: usize,
    /// Status that ended the pump (`Ok` when the budget ran out)
    pub status: ReadStatus,
}

/// Result of [`Pipeline::run`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    /// Units handed to the consumer
    pub units: u64,
    /// Payload bytes handed to the consumer
    pub bytes: u64,
    /// AGAIN answers seen while running
    pub again_polls: u64,
    /// Wall-clock run time in milliseconds
    pub elapsed_ms: u64,
}

/// Negotiated state of one edge, for introspection
#[derive(Debug, Clone, Serialize)]
pub struct EdgeDescription {
    /// Upstream the port reads from
    pub from: SourceId,
    /// Stream index on that upstream
    pub stream: usize,
    /// Input port on the node
    pub port: usize,
    /// Format the node accepted
    pub format: Option<FormatDescriptor>,
}

/// Negotiated state of one stage, for introspection
#[derive(Debug, Clone, Serialize)]
pub struct StageDescription {
    pub id: SourceId,
    pub name: String,
    /// `source` or `node`
    pub role: &'static str,
    pub inputs: Vec<EdgeDescription>,
    pub outputs: Vec<FormatDescriptor>,
    pub needs_restart: bool,
}

/// Owned graph of sources and nodes plus its driver
pub struct Pipeline {
    name: String,
    slots: Vec<Slot>,
    terminal: Option<usize>,
    negotiated: bool,
    scratch: UnitBuffer,
    stats: PipelineStats,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            terminal: None,
            negotiated: false,
            scratch: UnitBuffer::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Pre-size the pipeline's own buffer for [`Pipeline::read`]
    pub fn with_unit_capacity(mut self, capacity: usize) -> Self {
        self.scratch.reserve(capacity);
        self
    }

    /// Pipeline name used in logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of sources and nodes
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if nothing was added
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Add an origin with a single stream
    pub fn add_source(&mut self, source: Source) -> SourceId {
        self.add_multiplexed(vec![source])
    }

    /// Add an origin carrying several logical streams; ports pick one by
    /// stream index
    ///
    /// # Panics
    /// If `streams` is empty.
    pub fn add_multiplexed(&mut self, streams: Vec<Source>) -> SourceId {
        assert!(!streams.is_empty(), "an origin needs at least one stream");
        debug!(
            "Pipeline {}: adding source {} with {} stream(s)",
            self.name,
            streams[0].name(),
            streams.len()
        );
        self.push(Slot::Origin(streams))
    }

    /// Add a node with all ports unbound
    pub fn add_node(&mut self, node: impl Node + 'static) -> SourceId {
        self.add_boxed_node(Box::new(node))
    }

    /// Add a boxed node with all ports unbound
    pub fn add_boxed_node(&mut self, node: Box<dyn Node>) -> SourceId {
        debug!("Pipeline {}: adding node {}", self.name, node.name());
        let ports = node.input_ports().len();
        self.push(Slot::Stage(Stage {
            node,
            bindings: vec![None; ports],
            output: None,
            realigned_for: None,
            scratch: UnitBuffer::new(),
        }))
    }

    /// Add a node and bind its port 0 to the most recently added stage
    pub fn append(&mut self, node: impl Node + 'static) -> Result<SourceId> {
        self.append_boxed(Box::new(node))
    }

    /// Boxed form of [`Pipeline::append`]
    pub fn append_boxed(&mut self, node: Box<dyn Node>) -> Result<SourceId> {
        let upstream = self
            .slots
            .len()
            .checked_sub(1)
            .map(SourceId)
            .ok_or_else(|| ConduitError::connection("append needs an upstream stage"))?;
        let id = self.add_boxed_node(node);
        self.connect(id, 0, upstream, 0)?;
        Ok(id)
    }

    fn push(&mut self, slot: Slot) -> SourceId {
        self.slots.push(slot);
        self.negotiated = false;
        SourceId(self.slots.len() - 1)
    }

    /// Bind `port` of `node` to stream `stream_index` of `upstream`
    ///
    /// # Panics
    /// If the port is already bound.
    pub fn connect(
        &mut self,
        node: SourceId,
        port: usize,
        upstream: SourceId,
        stream_index: usize,
    ) -> Result<()> {
        if upstream.0 >= node.0 {
            return Err(ConduitError::connection(format!(
                "{} can only read from stages added before it, not {}",
                node, upstream
            )));
        }
        let streams = self
            .slots
            .get(upstream.0)
            .map(Slot::stream_count)
            .ok_or_else(|| ConduitError::connection(format!("no stage {}", upstream)))?;
        if stream_index >= streams {
            return Err(ConduitError::connection(format!(
                "{} has {} stream(s), asked for stream {}",
                upstream, streams, stream_index
            )));
        }

        let Some(Slot::Stage(stage)) = self.slots.get_mut(node.0) else {
            return Err(ConduitError::connection(format!("{} is not a node", node)));
        };
        let Some(binding) = stage.bindings.get_mut(port) else {
            return Err(ConduitError::connection(format!(
                "{} has no input port {}",
                stage.node.name(),
                port
            )));
        };
        assert!(
            binding.is_none(),
            "port {} of {} already bound",
            port,
            stage.node.name()
        );

        stage.node.connect(port, upstream, stream_index);
        *binding = Some(Binding {
            slot: upstream.0,
            stream: stream_index,
        });
        self.negotiated = false;
        debug!(
            "Pipeline {}: {} port {} <- {} stream {}",
            self.name,
            stage.node.name(),
            port,
            upstream,
            stream_index
        );
        Ok(())
    }

    /// Make `id` the stage read by [`Pipeline::read_into`]; defaults to
    /// the last one added
    pub fn set_terminal(&mut self, id: SourceId) -> Result<()> {
        if id.0 >= self.slots.len() {
            return Err(ConduitError::connection(format!("no stage {}", id)));
        }
        self.terminal = Some(id.0);
        Ok(())
    }

    fn terminal(&self) -> Option<usize> {
        self.terminal.or_else(|| self.slots.len().checked_sub(1))
    }

    /// True after a successful negotiation pass
    pub fn is_negotiated(&self) -> bool {
        self.negotiated
    }

    /// Run the negotiation pass over the whole graph
    pub fn negotiate(&mut self) -> Result<()> {
        self.negotiate_from(0)
    }

    /// Renegotiate starting at `start`; stages before it keep their
    /// agreed formats
    fn negotiate_from(&mut self, start: usize) -> Result<()> {
        self.negotiated = false;
        for index in start..self.slots.len() {
            let (upstream, rest) = self.slots.split_at_mut(index);
            let Slot::Stage(stage) = &mut rest[0] else {
                continue;
            };
            stage.realigned_for = None;
            negotiate_stage(&self.name, upstream, stage)?;
        }
        self.negotiated = true;
        self.stats.negotiations += 1;
        info!(
            "Pipeline {} negotiated ({} stages, from {})",
            self.name,
            self.slots.len(),
            start
        );
        Ok(())
    }

    /// True if any node asked for a restart that has not been handled
    pub fn restart_pending(&self) -> bool {
        self.first_pending_restart().is_some()
    }

    fn first_pending_restart(&self) -> Option<usize> {
        self.slots.iter().position(|slot| match slot {
            Slot::Stage(stage) => stage.node.needs_restart(),
            Slot::Origin(_) => false,
        })
    }

    /// First stage to renegotiate when `index` restarts
    ///
    /// Upstream stages realigned for a stage that is about to be
    /// renegotiated go back to their own output first, so a relaxed
    /// limit can widen the format again.
    fn restart_start(&self, index: usize) -> usize {
        let mut start = index;
        while let Some(earliest) = self.slots[..start].iter().position(|slot| {
            matches!(slot, Slot::Stage(stage) if stage.realigned_for.is_some_and(|r| r >= start))
        }) {
            start = earliest;
        }
        start
    }

    fn stage(&self, id: SourceId) -> Result<&Stage> {
        match self.slots.get(id.0) {
            Some(Slot::Stage(stage)) => Ok(stage),
            _ => Err(ConduitError::connection(format!("{} is not a node", id))),
        }
    }

    fn stage_mut(&mut self, id: SourceId) -> Result<&mut Stage> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Stage(stage)) => Ok(stage),
            _ => Err(ConduitError::connection(format!("{} is not a node", id))),
        }
    }

    /// Parameters published by a node
    pub fn parameters(&self, id: SourceId) -> Result<Vec<ParameterInfo>> {
        Ok(self.stage(id)?.node.parameters())
    }

    /// Current value of a node parameter
    pub fn get_parameter(&self, id: SourceId, name: &str) -> Result<ParamValue> {
        let stage = self.stage(id)?;
        stage
            .node
            .get_parameter(name)
            .ok_or_else(|| ConduitError::unknown_parameter(stage.node.name(), name))
    }

    /// Change a node parameter
    ///
    /// If the node raises needs-restart and the pipeline was already
    /// negotiated, the node and everything downstream are renegotiated
    /// before this returns, together with any upstream stage the node
    /// had realigned. Returns whether a restart happened.
    pub fn set_parameter(&mut self, id: SourceId, name: &str, value: &ParamValue) -> Result<bool> {
        let pipeline = self.name.clone();
        let stage = self.stage_mut(id)?;
        stage.node.set_parameter(name, value)?;
        debug!("Pipeline {}: {}.{} = {}", pipeline, stage.node.name(), name, value);

        if !stage.node.needs_restart() {
            return Ok(false);
        }
        if !self.negotiated {
            debug!("Pipeline {}: restart deferred until negotiation", pipeline);
            return Ok(false);
        }

        info!("Pipeline {}: {} needs restart after '{}' changed", pipeline, id, name);
        self.negotiate_from(self.restart_start(id.0))?;
        self.stats.restarts += 1;
        Ok(true)
    }

    /// Output format of a stage: the node's negotiated output, or the
    /// first descriptor of an origin's first stream
    pub fn output_format(&self, id: SourceId) -> Option<&FormatDescriptor> {
        match self.slots.get(id.0)? {
            Slot::Origin(streams) => streams.first()?.formats().iter().next(),
            Slot::Stage(stage) => stage.output.as_ref(),
        }
    }

    /// Format a node accepted on one of its ports
    pub fn input_format(&self, id: SourceId, port: usize) -> Option<&FormatDescriptor> {
        match self.slots.get(id.0)? {
            Slot::Stage(stage) => stage.node.input_ports().get(port)?.format(),
            Slot::Origin(_) => None,
        }
    }

    /// Borrow a node
    pub fn node(&self, id: SourceId) -> Option<&dyn Node> {
        match self.slots.get(id.0)? {
            Slot::Stage(stage) => Some(stage.node.as_ref()),
            Slot::Origin(_) => None,
        }
    }

    /// Id and name of every node, origin first
    pub fn node_names(&self) -> Vec<(SourceId, String)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Stage(stage) => Some((SourceId(index), stage.node.name().to_string())),
                Slot::Origin(_) => None,
            })
            .collect()
    }

    /// Borrow one stream of an origin
    pub fn source(&self, id: SourceId, stream: usize) -> Option<&Source> {
        match self.slots.get(id.0)? {
            Slot::Origin(streams) => streams.get(stream),
            Slot::Stage(_) => None,
        }
    }

    /// Pipeline counters
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Snapshot of every stage and its negotiated edges
    pub fn describe(&self) -> Vec<StageDescription> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Origin(streams) => StageDescription {
                    id: SourceId(index),
                    name: slot.name().to_string(),
                    role: "source",
                    inputs: Vec::new(),
                    outputs: streams
                        .iter()
                        .flat_map(|s| s.formats().iter().cloned())
                        .collect(),
                    needs_restart: false,
                },
                Slot::Stage(stage) => StageDescription {
                    id: SourceId(index),
                    name: slot.name().to_string(),
                    role: "node",
                    inputs: stage
                        .bindings
                        .iter()
                        .enumerate()
                        .filter_map(|(port, binding)| {
                            binding.map(|b| EdgeDescription {
                                from: SourceId(b.slot),
                                stream: b.stream,
                                port,
                                format: stage
                                    .node
                                    .input_ports()
                                    .get(port)
                                    .and_then(InputPort::format)
                                    .cloned(),
                            })
                        })
                        .collect(),
                    outputs: stage.output.iter().cloned().collect(),
                    needs_restart: stage.node.needs_restart(),
                },
            })
            .collect()
    }

    /// Check the pipeline can be read, renegotiating a node that raised
    /// needs-restart on its own
    fn ready(&mut self) -> Option<usize> {
        if !self.negotiated {
            warn!("Pipeline {} read before negotiation", self.name);
            return None;
        }
        if let Some(index) = self.first_pending_restart() {
            if let Err(e) = self.negotiate_from(self.restart_start(index)) {
                error!("Pipeline {} renegotiation failed: {}", self.name, e);
                return None;
            }
            self.stats.restarts += 1;
        }
        self.terminal()
    }

    /// Read one unit from the terminal into a caller buffer
    ///
    /// Same contract as [`Source::read_into`]. Reading an unnegotiated
    /// pipeline answers `Error`.
    pub fn read_into(&mut self, dst: &mut UnitBuffer) -> ReadStatus {
        let Some(terminal) = self.ready() else {
            return ReadStatus::Error;
        };
        let binding = Binding {
            slot: terminal,
            stream: 0,
        };
        let status = read_slot(&mut self.slots, binding, dst);
        match status {
            ReadStatus::Ok => {
                self.stats.units += 1;
                self.stats.bytes += dst.len() as u64;
            }
            ReadStatus::Again => self.stats.again += 1,
            ReadStatus::Eof | ReadStatus::Error => {
                trace!("Pipeline {} terminal read: {}", self.name, status)
            }
        }
        status
    }

    /// Read one unit from the terminal into the pipeline's own buffer
    pub fn read(&mut self) -> Pull<'_> {
        let mut scratch = std::mem::take(&mut self.scratch);
        let status = self.read_into(&mut scratch);
        self.scratch = scratch;
        match status {
            ReadStatus::Ok => Pull::Unit(&self.scratch),
            status => Pull::from_status(status),
        }
    }

    /// Pull up to `max_units` units without waiting
    ///
    /// Stops at the first non-`Ok` status, which is reported in the
    /// outcome. Consumer errors abort the pump.
    pub fn pump<F>(&mut self, max_units: usize, mut consumer: F) -> Result<PumpOutcome>
    where
        F: FnMut(&UnitBuffer) -> Result<()>,
    {
        let mut units = 0;
        while units < max_units {
            match self.read() {
                Pull::Unit(unit) => consumer(unit)?,
                other => {
                    return Ok(PumpOutcome {
                        units,
                        status: other.status(),
                    });
                }
            }
            units += 1;
        }
        Ok(PumpOutcome {
            units,
            status: ReadStatus::Ok,
        })
    }

    /// Drive the pipeline to end of stream on the tokio runtime
    ///
    /// `AGAIN` sleeps for the configured poll interval so other
    /// pipelines on the same runtime keep running. `ERROR` is surfaced
    /// as [`ConduitError::Stream`] without retrying.
    pub async fn run<F>(&mut self, config: &DriverConfig, mut consumer: F) -> Result<RunSummary>
    where
        F: FnMut(&UnitBuffer) -> Result<()>,
    {
        if !self.negotiated {
            return Err(ConduitError::NotNegotiated);
        }

        let start = Instant::now();
        let mut summary = RunSummary {
            units: 0,
            bytes: 0,
            again_polls: 0,
            elapsed_ms: 0,
        };
        let mut idle_polls = 0u32;
        info!("Pipeline {} running", self.name);

        loop {
            match self.read() {
                Pull::Unit(unit) => {
                    idle_polls = 0;
                    summary.units += 1;
                    summary.bytes += unit.len() as u64;
                    consumer(unit)?;
                }
                Pull::Again => {
                    idle_polls += 1;
                    summary.again_polls += 1;
                    if let Some(limit) = config.max_idle_polls {
                        if idle_polls >= limit {
                            warn!("Pipeline {} idle for {} polls", self.name, idle_polls);
                            return Err(ConduitError::IdleTimeout { polls: idle_polls });
                        }
                    }
                    tokio::time::sleep(config.poll_interval()).await;
                }
                Pull::Eof => {
                    summary.elapsed_ms = start.elapsed().as_millis() as u64;
                    info!(
                        "Pipeline {} finished: {} units, {} bytes in {} ms",
                        self.name, summary.units, summary.bytes, summary.elapsed_ms
                    );
                    return Ok(summary);
                }
                Pull::Error => {
                    error!("Pipeline {} stream error after {} units", self.name, summary.units);
                    return Err(ConduitError::stream(format!(
                        "pipeline {} returned ERROR after {} units",
                        self.name, summary.units
                    )));
                }
            }
        }
    }
}

/// Negotiate every port of one stage against its upstream
fn negotiate_stage(pipeline: &str, upstream: &mut [Slot], stage: &mut Stage) -> Result<()> {
    let node_name = stage.node.name().to_string();
    stage.node.reset();

    for port in 0..stage.bindings.len() {
        let Some(binding) = stage.bindings[port] else {
            return Err(ConduitError::connection(format!(
                "{} port {} is not connected",
                node_name, port
            )));
        };
        let accepts = stage.node.input_ports().get(port).and_then(InputPort::accepts);

        let offered = offered_format(&upstream[binding.slot], binding.stream, accepts)
            .ok_or_else(|| {
                ConduitError::negotiation(
                    &node_name,
                    port,
                    format!(
                        "{} publishes no {} format",
                        upstream[binding.slot].name(),
                        accepts.map_or("usable".to_string(), |k| k.to_string())
                    ),
                )
            })?;
        if let Some(kind) = accepts {
            if offered.kind() != kind {
                return Err(ConduitError::negotiation(
                    &node_name,
                    port,
                    format!("offered {} format, accepts {}", offered.kind(), kind),
                ));
            }
        }

        let mut adopted = offered.clone();
        stage
            .node
            .set_input_format(port, &mut adopted)
            .map_err(|e| match e {
                ConduitError::Negotiation { .. } => e,
                other => ConduitError::negotiation(&node_name, port, other.to_string()),
            })?;
        if let Some(input) = stage.node.input_ports_mut().get_mut(port) {
            input.set_format(adopted.clone());
        }

        if adopted != offered {
            debug!(
                "Pipeline {}: {} port {} adjusted {} -> {}",
                pipeline, node_name, port, offered, adopted
            );
            realign_upstream(pipeline, upstream, binding, adopted)?;
        } else {
            debug!("Pipeline {}: {} port {} accepted {}", pipeline, node_name, port, adopted);
        }
    }

    let output = stage.node.output_format().ok_or_else(|| {
        ConduitError::negotiation(&node_name, 0, "node produced no output format")
    })?;
    stage.output = Some(output);
    Ok(())
}

/// Walk an adjusted edge format upstream until a stage adopts it
///
/// `slots` holds every stage negotiated so far; the requesting stage sits
/// just past its end. A stage whose output another negotiated stage
/// already reads cannot change, and an origin only satisfies the request
/// if it publishes exactly that format.
fn realign_upstream(
    pipeline: &str,
    slots: &mut [Slot],
    mut binding: Binding,
    mut format: FormatDescriptor,
) -> Result<()> {
    let requester = slots.len();
    let mut from = requester;

    loop {
        let target = binding.slot;
        let other_reader = slots
            .iter()
            .enumerate()
            .skip(target + 1)
            .find(|(index, slot)| {
                *index != from && matches!(slot, Slot::Stage(stage) if stage.reads_from(target))
            })
            .map(|(index, slot)| format!("{} {}", slot.name(), SourceId(index)));

        let up = match &mut slots[target] {
            Slot::Origin(streams) => return origin_publishes(streams, binding.stream, &format),
            Slot::Stage(up) => up,
        };
        if up.output.as_ref() == Some(&format) {
            return Ok(());
        }
        let name = up.node.name().to_string();
        if let Some(reader) = other_reader {
            return Err(ConduitError::negotiation(
                &name,
                0,
                format!("{} already reads its output, cannot switch it to {}", reader, format),
            ));
        }

        let next = match up.node.realign_output(&format)? {
            Realign::Adopted => None,
            Realign::Upstream {
                port,
                format: forwarded,
            } => {
                let upstream_binding = up.bindings.get(port).copied().flatten().ok_or_else(|| {
                    ConduitError::connection(format!("{} port {} is not connected", name, port))
                })?;
                if let Some(input) = up.node.input_ports_mut().get_mut(port) {
                    input.set_format(forwarded.clone());
                }
                Some((upstream_binding, forwarded))
            }
        };

        if up.node.output_format().as_ref() != Some(&format) {
            return Err(ConduitError::negotiation(
                &name,
                0,
                format!("accepted {} but still reports a different output", format),
            ));
        }
        debug!("Pipeline {}: {} realigned to {}", pipeline, name, format);
        up.output = Some(format);
        up.realigned_for = Some(requester);

        match next {
            Some((upstream_binding, forwarded)) => {
                from = target;
                binding = upstream_binding;
                format = forwarded;
            }
            None => return Ok(()),
        }
    }
}

fn origin_publishes(streams: &[Source], stream: usize, format: &FormatDescriptor) -> Result<()> {
    let source = streams.get(stream);
    let origin = source.map_or("origin", Source::name);
    match source.and_then(|s| s.get_format(format.kind())) {
        Some(published) if published == format => Ok(()),
        Some(published) => Err(ConduitError::negotiation(
            origin,
            stream,
            format!("publishes {}, downstream needs {}", published, format),
        )),
        None => Err(ConduitError::negotiation(
            origin,
            stream,
            format!("publishes no {} format, downstream needs {}", format.kind(), format),
        )),
    }
}

fn offered_format(slot: &Slot, stream: usize, accepts: Option<FormatKind>) -> Option<FormatDescriptor> {
    match slot {
        Slot::Origin(streams) => {
            let formats = streams.get(stream)?.formats();
            match accepts {
                Some(kind) => formats.get(kind).cloned(),
                None => formats.iter().next().cloned(),
            }
        }
        Slot::Stage(stage) => stage.output.clone(),
    }
}

impl FillUnit for Pipeline {
    fn fill(&mut self, unit: &mut UnitBuffer) -> ReadStatus {
        self.read_into(unit)
    }
}
