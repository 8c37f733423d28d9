//! Error types for Conduit
//!
//! Stream conditions (`AGAIN`, `EOF`, `ERROR`) travel as [`ReadStatus`]
//! values through the read path. This type covers everything else:
//! negotiation failures, bad connections, parameter and config problems,
//! and the driver surfacing a terminal stream error to its caller.
//!
//! [`ReadStatus`]: crate::status::ReadStatus

use thiserror::Error;

/// Result type alias using ConduitError
pub type Result<T> = std::result::Result<T, ConduitError>;

/// Main error type for Conduit operations
#[derive(Debug, Error)]
pub enum ConduitError {
    /// A node rejected every adjustment of the offered format
    #[error("Negotiation failed at {node} (port {port}): {reason}")]
    Negotiation {
        node: String,
        port: usize,
        reason: String,
    },

    /// A port was connected to something that cannot feed it
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    /// Parameter name not published by the node
    #[error("Unknown parameter '{name}' for node {node}")]
    UnknownParameter { node: String, name: String },

    /// Parameter value of the wrong type or out of range
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream returned ERROR and the driver gave up on the stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Upstream kept answering AGAIN past the idle limit
    #[error("No data after {polls} idle polls")]
    IdleTimeout { polls: u32 },

    /// Reads attempted before a successful negotiation pass
    #[error("Pipeline not negotiated")]
    NotNegotiated,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ConduitError>,
    },
}

impl ConduitError {
    /// Create a negotiation error
    pub fn negotiation(node: impl Into<String>, port: usize, reason: impl Into<String>) -> Self {
        Self::Negotiation {
            node: node.into(),
            port,
            reason: reason.into(),
        }
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::InvalidConnection(msg.into())
    }

    /// Create an unknown-parameter error
    pub fn unknown_parameter(node: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownParameter {
            node: node.into(),
            name: name.into(),
        }
    }

    /// Create an invalid-parameter error
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::Stream(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for failures raised by the negotiation pass
    pub fn is_negotiation(&self) -> bool {
        match self {
            Self::Negotiation { .. } => true,
            Self::WithContext { source, .. } => source.is_negotiation(),
            _ => false,
        }
    }

    /// Suggestion for the user, if one applies
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Negotiation { .. } => Some(
                "Check that each node accepts the format kind its upstream produces \
                 (e.g. video nodes behind a video source)",
            ),
            Self::InvalidConnection(_) => {
                Some("Nodes can only be connected to sources added before them")
            }
            Self::UnknownParameter { .. } => {
                Some("Run `conduit nodes` to list the parameters each node publishes")
            }
            Self::InvalidParameter { .. } => {
                Some("Run `conduit nodes` to see the type and range of each parameter")
            }
            Self::Config(_) => Some("Check ~/.config/conduit/config.toml for syntax errors"),
            Self::IdleTimeout { .. } => {
                Some("Raise [driver] max_idle_polls or check that the upstream producer is running")
            }
            Self::NotNegotiated => Some("Call negotiate() after connecting all nodes"),
            Self::WithContext { source, .. } => source.user_hint(),
            Self::Stream(_) | Self::Io(_) => None,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl From<toml::de::Error> for ConduitError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("Failed to parse config: {}", err))
    }
}

impl From<toml::ser::Error> for ConduitError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(format!("Failed to serialize config: {}", err))
    }
}
