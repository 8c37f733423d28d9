//! CLI command implementations

mod config;
mod negotiate;
mod nodes;
mod probe;

pub use config::{config, ConfigArgs};
pub use negotiate::{negotiate, NegotiateArgs};
pub use nodes::{nodes, NodesArgs};
pub use probe::{probe, ProbeArgs};

use anyhow::{anyhow, bail, Result};
use conduit_core::config::ConfigFile;
use conduit_core::nodes::{builtin, BUILTIN_NODES};
use conduit_core::params::ParamValue;
use conduit_core::pipeline::Pipeline;
use conduit_core::ConduitError;

/// Append bundled nodes by name, then apply stored and command-line
/// parameters
fn build_chain(pipeline: &mut Pipeline, names: &[String], sets: &[String], config: &ConfigFile) -> Result<()> {
    for name in names {
        let node = builtin(name).ok_or_else(|| {
            anyhow!("unknown node '{}' (available: {})", name, BUILTIN_NODES.join(", "))
        })?;
        pipeline.append_boxed(node).map_err(report)?;
    }

    config.apply_to(pipeline).map_err(report)?;

    let targets = pipeline.node_names();
    for set in sets {
        let (node, param, value) = parse_set(set)?;
        let matching: Vec<_> = targets.iter().filter(|(_, name)| *name == node).collect();
        if matching.is_empty() {
            bail!("--set {}: no node named '{}' in the chain", set, node);
        }
        for (id, _) in matching {
            pipeline
                .set_parameter(*id, param, &ParamValue::parse(value))
                .map_err(report)?;
        }
    }
    Ok(())
}

/// Split `node.param=value`
fn parse_set(set: &str) -> Result<(&str, &str, &str)> {
    let (target, value) = set
        .split_once('=')
        .ok_or_else(|| anyhow!("--set expects node.param=value, got '{}'", set))?;
    let (node, param) = target
        .split_once('.')
        .ok_or_else(|| anyhow!("--set expects node.param=value, got '{}'", set))?;
    Ok((node, param, value))
}

/// Print the hint attached to a core error before handing it to anyhow
fn report(err: ConduitError) -> anyhow::Error {
    if let Some(hint) = err.user_hint() {
        eprintln!("Hint: {}", hint);
    }
    err.into()
}
