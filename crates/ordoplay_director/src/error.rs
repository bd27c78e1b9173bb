// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the director runtime.

use crate::graph::GraphId;
use crate::link::ConnectionError;
use crate::node::NodeId;

/// Errors raised by script construction, persistence and snapshots
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Graph not found
    #[error("Graph not found: {0}")]
    GraphNotFound(GraphId),

    /// Node type is not registered
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// The root graph cannot be removed
    #[error("The root graph cannot be removed")]
    RootGraphRemoval,

    /// Link wiring failed
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Script document could not be parsed
    #[error("Failed to parse script: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Script document could not be written
    #[error("Failed to serialize script: {0}")]
    Serialize(#[from] ron::Error),

    /// Script document version is newer than supported
    #[error("Unsupported script version {found} (expected at most {supported})")]
    UnsupportedVersion {
        /// Version found in the document
        found: u32,
        /// Highest supported version
        supported: u32,
    },

    /// Engine snapshot could not be encoded or decoded
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
