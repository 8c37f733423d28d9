//! Bundled nodes
//!
//! Stand-ins for plugin-provided nodes, created by name through
//! [`builtin`].

mod clamp;
mod framerate;
mod gain;
mod passthrough;
mod scale;

pub use clamp::Clamp;
pub use framerate::Framerate;
pub use gain::Gain;
pub use passthrough::Passthrough;
pub use scale::Scale;

use serde::Serialize;

use crate::format::FormatKind;
use crate::node::Node;
use crate::params::ParameterInfo;

/// Names accepted by [`builtin`]
pub const BUILTIN_NODES: &[&str] = &["passthrough", "scale", "clamp", "framerate", "gain"];

/// Create a bundled node by name
pub fn builtin(name: &str) -> Option<Box<dyn Node>> {
    match name {
        "passthrough" => Some(Box::new(Passthrough::new())),
        "scale" => Some(Box::new(Scale::default())),
        "clamp" => Some(Box::new(Clamp::default())),
        "framerate" => Some(Box::new(Framerate::default())),
        "gain" => Some(Box::new(Gain::default())),
        _ => None,
    }
}

/// Summary of a bundled node for listings
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub name: String,
    /// Kind accepted on port 0 (`None` = any)
    pub accepts: Option<FormatKind>,
    pub parameters: Vec<ParameterInfo>,
}

/// Describe every bundled node
pub fn list_builtin() -> Vec<NodeInfo> {
    BUILTIN_NODES
        .iter()
        .filter_map(|name| builtin(name))
        .map(|node| NodeInfo {
            name: node.name().to_string(),
            accepts: node.input_ports().first().and_then(|p| p.accepts()),
            parameters: node.parameters(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_every_name() {
        for name in BUILTIN_NODES {
            let node = builtin(name).expect("registered");
            assert_eq!(node.name(), *name);
        }
        assert!(builtin("deinterlace").is_none());
    }

    #[test]
    fn test_list_builtin() {
        let nodes = list_builtin();
        assert_eq!(nodes.len(), BUILTIN_NODES.len());
        let gain = nodes.iter().find(|n| n.name == "gain").unwrap();
        assert_eq!(gain.accepts, Some(FormatKind::Audio));
        assert!(gain.parameters.iter().any(|p| p.name == "gain_db"));
    }
}
