// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player errors.

use ordoplay_director::DirectorError;

/// Errors that stop the player
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// Bad command line
    #[error("{0}")]
    Usage(String),
    /// Config values that cannot be run
    #[error("Invalid player config: {0}")]
    InvalidConfig(String),
    /// Config written by a newer player
    #[error("Player config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },
    /// Config parse failure
    #[error("Failed to parse player config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Config serialization failure
    #[error("Failed to serialize player config: {0}")]
    Serialize(#[from] ron::Error),
    /// Report serialization failure
    #[error("Failed to write report: {0}")]
    Report(#[from] serde_json::Error),
    /// Script loading or engine failure
    #[error(transparent)]
    Director(#[from] DirectorError),
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
