//! Probe command - pull a file through a pipeline

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use conduit_core::config::ConfigFile;
use conduit_core::format::{CodecId, CompressionInfo};
use conduit_core::pipeline::{Pipeline, RunSummary};
use conduit_core::source::Source;
use conduit_core::sources::{ChunkSource, TS_PACKET_SIZE};
use serde::Serialize;
use tracing::info;

use super::{build_chain, report};

const TS_SYNC_BYTE: u8 = 0x47;

/// Arguments for the probe command
#[derive(Args)]
pub struct ProbeArgs {
    /// File to read
    pub input: PathBuf,

    /// Unit size in bytes
    #[arg(short = 'p', long, default_value_t = TS_PACKET_SIZE)]
    pub packet_size: usize,

    /// Node to append, in order (repeatable)
    #[arg(short, long = "node")]
    pub nodes: Vec<String>,

    /// Parameter override, node.param=value (repeatable)
    #[arg(short, long = "set")]
    pub sets: Vec<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ProbeReport {
    input: PathBuf,
    packet_size: usize,
    #[serde(flatten)]
    summary: RunSummary,
    /// Full-size units not starting with the TS sync byte
    sync_errors: u64,
    /// Trailing unit shorter than the packet size
    short_units: u64,
}

/// Read the file through the pipeline until end of stream
pub async fn probe(args: ProbeArgs) -> Result<()> {
    anyhow::ensure!(args.packet_size > 0, "--packet-size must be at least 1");

    let config = ConfigFile::load_or_default();
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;

    let codec = if args.packet_size == TS_PACKET_SIZE {
        CodecId::MpegTs
    } else {
        CodecId::Unknown
    };
    let source = Source::producing(
        args.input.display().to_string(),
        ChunkSource::new(BufReader::new(file), args.packet_size),
    )
    .with_format(CompressionInfo::new(codec).with_max_packet_size(args.packet_size));

    let mut pipeline = Pipeline::new("probe").with_unit_capacity(config.buffers.unit_capacity);
    pipeline.add_source(source);
    build_chain(&mut pipeline, &args.nodes, &args.sets, &config)?;
    pipeline.negotiate().map_err(report)?;

    let check_sync = codec == CodecId::MpegTs;
    let mut sync_errors = 0;
    let mut short_units = 0;
    let summary = pipeline
        .run(&config.driver, |unit| {
            if unit.len() < args.packet_size {
                short_units += 1;
            } else if check_sync && unit.data().first() != Some(&TS_SYNC_BYTE) {
                sync_errors += 1;
            }
            Ok(())
        })
        .await
        .map_err(report)?;
    info!("Probe finished with stats {:?}", pipeline.stats());

    let result = ProbeReport {
        input: args.input,
        packet_size: args.packet_size,
        summary,
        sync_errors,
        short_units,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Input:        {}", result.input.display());
    println!("Unit size:    {} bytes", result.packet_size);
    println!("Units:        {}", result.summary.units);
    println!("Bytes:        {}", result.summary.bytes);
    println!("AGAIN polls:  {}", result.summary.again_polls);
    println!("Elapsed:      {} ms", result.summary.elapsed_ms);
    if result.short_units > 0 {
        println!("Short units:  {}", result.short_units);
    }
    if check_sync {
        println!("Sync errors:  {}", result.sync_errors);
    }

    Ok(())
}
