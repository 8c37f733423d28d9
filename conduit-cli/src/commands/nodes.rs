//! Nodes command - list bundled nodes

use anyhow::Result;
use clap::Args;
use conduit_core::nodes::list_builtin;
use conduit_core::params::ParameterInfo;

/// Arguments for the nodes command
#[derive(Args)]
pub struct NodesArgs {
    /// Print the list as JSON
    #[arg(long)]
    pub json: bool,
}

/// List bundled nodes with their parameters
pub async fn nodes(args: NodesArgs) -> Result<()> {
    let nodes = list_builtin();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    println!("Conduit - Bundled Nodes\n");
    for node in &nodes {
        let accepts = node
            .accepts
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "any".to_string());
        println!("{} (accepts {})", node.name, accepts);

        if node.parameters.is_empty() {
            println!("    no parameters");
        }
        for param in &node.parameters {
            println!("    {:<12} {}", param.name, describe(param));
        }
        println!();
    }

    Ok(())
}

fn describe(param: &ParameterInfo) -> String {
    let range = match (param.min, param.max) {
        (Some(min), Some(max)) => format!(" [{}..{}]", min, max),
        _ => String::new(),
    };
    let restart = if param.restart { ", restarts" } else { "" };
    format!(
        "{:?}{}, default {}{}: {}",
        param.kind, range, param.default, restart, param.help
    )
}
