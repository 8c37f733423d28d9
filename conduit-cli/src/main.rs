//! Conduit CLI
//!
//! Inspect and exercise pull-based media pipelines.
//!
//! # Usage
//!
//! ```bash
//! # List the bundled nodes and their parameters
//! conduit nodes
//!
//! # Negotiate a chain against a synthetic 4K source
//! conduit negotiate --video 3840x2160@60 --node scale --node framerate --node clamp --set clamp.max_width=1280
//!
//! # Pull a transport stream file through a pipeline
//! conduit probe capture.ts
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Conduit - pull-based media pipeline toolkit
#[derive(Parser)]
#[command(name = "conduit")]
#[command(version)]
#[command(about = "Inspect and exercise pull-based media pipelines", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull a file through a pipeline in fixed-size units
    Probe(commands::ProbeArgs),

    /// Build a chain on a synthetic source and show the negotiated formats
    Negotiate(commands::NegotiateArgs),

    /// List bundled nodes and their parameters
    #[command(alias = "ls")]
    Nodes(commands::NodesArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

/// `-v` applies to the library and to this binary's own events
fn log_directives(level: Level) -> Vec<String> {
    ["conduit_core", "conduit"]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let mut filter = EnvFilter::from_default_env();
    for directive in log_directives(level) {
        filter = filter.add_directive(directive.parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Probe(args) => commands::probe(args).await?,
        Commands::Negotiate(args) => commands::negotiate(args).await?,
        Commands::Nodes(args) => commands::nodes(args).await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::Directive;

    #[test]
    fn test_log_directives_cover_cli_and_core() {
        let directives = log_directives(Level::DEBUG);
        assert!(directives.contains(&"conduit=DEBUG".to_string()));
        assert!(directives.contains(&"conduit_core=DEBUG".to_string()));
        for directive in &directives {
            assert!(directive.parse::<Directive>().is_ok());
        }
    }
}
