//! Negotiate command - show the formats a chain agrees on

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use conduit_core::config::ConfigFile;
use conduit_core::format::{AudioFormat, CodecId, CompressionInfo, FormatDescriptor, VideoFormat};
use conduit_core::pipeline::Pipeline;
use conduit_core::source::Source;
use conduit_core::sources::MemorySource;

use super::{build_chain, report};

/// Arguments for the negotiate command
#[derive(Args)]
pub struct NegotiateArgs {
    /// Synthetic video source, WIDTHxHEIGHT@FPS
    #[arg(long, conflicts_with_all = ["audio", "codec"])]
    pub video: Option<String>,

    /// Synthetic audio source, RATE:CHANNELS
    #[arg(long, conflicts_with = "codec")]
    pub audio: Option<String>,

    /// Synthetic compressed source (h264, hevc, av1, aac, opus, ts, ...)
    #[arg(long)]
    pub codec: Option<String>,

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

/// Build the chain and print every negotiated edge
pub async fn negotiate(args: NegotiateArgs) -> Result<()> {
    let format = source_format(&args)?;
    let config = ConfigFile::load_or_default();

    let mut pipeline = Pipeline::new("negotiate");
    pipeline.add_source(Source::filling("synthetic", MemorySource::default()).with_format(format));
    build_chain(&mut pipeline, &args.nodes, &args.sets, &config)?;
    pipeline.negotiate().map_err(report)?;

    let stages = pipeline.describe();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stages)?);
        return Ok(());
    }

    println!("{:<4} {:<14} {:<8} {}", "ID", "Stage", "Role", "Format");
    println!("{}", "-".repeat(72));
    for stage in &stages {
        for edge in &stage.inputs {
            let format = edge
                .format
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<4} {:<14} {:<8} in[{}] <- {}.{}: {}",
                "", "", "", edge.port, edge.from, edge.stream, format
            );
        }
        let output = stage
            .outputs
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<4} {:<14} {:<8} {}",
            stage.id.to_string(),
            stage.name,
            stage.role,
            output
        );
    }

    Ok(())
}

fn source_format(args: &NegotiateArgs) -> Result<FormatDescriptor> {
    if let Some(video) = &args.video {
        return parse_video(video).map(FormatDescriptor::from);
    }
    if let Some(audio) = &args.audio {
        return parse_audio(audio).map(FormatDescriptor::from);
    }
    if let Some(codec) = &args.codec {
        let codec: CodecId = codec.parse().map_err(|e: String| anyhow!(e))?;
        return Ok(CompressionInfo::new(codec).into());
    }
    bail!("choose a source with --video, --audio or --codec")
}

/// Parse `WIDTHxHEIGHT@FPS`; the rate defaults to 30
fn parse_video(s: &str) -> Result<VideoFormat> {
    let (size, fps) = s.split_once('@').unwrap_or((s, "30"));
    let (width, height) = size
        .split_once('x')
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT[@FPS], got '{}'", s))?;
    Ok(VideoFormat::new(
        width.parse().context("invalid width")?,
        height.parse().context("invalid height")?,
        fps.parse().context("invalid framerate")?,
    ))
}

/// Parse `RATE[:CHANNELS]`
fn parse_audio(s: &str) -> Result<AudioFormat> {
    let (rate, channels) = s.split_once(':').unwrap_or((s, "2"));
    Ok(AudioFormat {
        sample_rate: rate.parse().context("invalid sample rate")?,
        channels: channels.parse().context("invalid channel count")?,
        ..AudioFormat::default()
    })
}
