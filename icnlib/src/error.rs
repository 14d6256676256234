use std::path::PathBuf;

use thiserror::Error;

use crate::{ContentId, NodeId, Time};

/// Errors raised while routing a request or constructing a strategy
///
/// Every variant is fatal for the run: there is no degraded mode which keeps replaying events
/// after one of these has been returned
#[derive(Debug, Error)]
pub enum StrategyError {
    /// A request reached the source of a content and the source did not hold it
    #[error("content {content} was not found at its source node {node}")]
    ContentNotAtSource { content: ContentId, node: NodeId },

    #[error("content {0} has no source node")]
    UnknownContent(ContentId),

    #[error("no path between node {from} and node {to}")]
    NoPath { from: NodeId, to: NodeId },

    #[error("metacaching policy '{0}' is not supported, expected LCE or LCD")]
    UnsupportedMetacaching(String),

    #[error("invalid value {value} for parameter '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("a session is already open")]
    SessionAlreadyOpen,

    #[error("no session is open")]
    NoOpenSession,

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl StrategyError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> Self {
        StrategyError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// Errors raised while loading one of the files produced out of band for the oracle, hybrid and
/// static strategies
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("couldn't read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{0} contains no entries")]
    Empty(PathBuf),

    #[error("snapshot {0} does not exist")]
    MissingSnapshot(usize),
}

/// Errors raised while building a topology
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("node {0} is not part of the topology")]
    UnknownNode(NodeId),

    #[error("node {0} is declared more than once")]
    DuplicateNode(NodeId),

    #[error("the topology is not connected")]
    Disconnected,

    #[error("content {content} is served by both node {first} and node {second}")]
    DuplicateSource {
        content: ContentId,
        first: NodeId,
        second: NodeId,
    },

    #[error("invalid content range {from}..={to}")]
    InvalidContentRange { from: ContentId, to: ContentId },
}

/// Errors raised while setting up or driving a simulation run
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("trace line {line}: {message}")]
    Trace { line: usize, message: String },

    #[error("event at time {time} arrived after an event at time {previous}")]
    OutOfOrder { time: Time, previous: Time },

    #[error("couldn't read the trace: {0}")]
    Io(#[from] std::io::Error),
}
