// SPDX-License-Identifier: MIT OR Apache-2.0
//! Player configuration.
//!
//! A player config names the script to run and how to run it: frame count,
//! timestep, time scale, log filter, engine tunables and a schedule of
//! remote events to raise on given frames.

use crate::error::PlayerError;
use ordoplay_director::{ActorId, EngineConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current player config format version
pub const PLAYER_FORMAT_VERSION: u32 = 1;

/// Default player config file name
pub const PLAYER_FILE_NAME: &str = "player.ron";

/// How the final report is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReportFormat {
    /// Aligned text table
    #[default]
    Text,
    /// Pretty JSON
    Json,
}

/// Remote event raised before a given frame runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTrigger {
    /// Engine frame number
    pub frame: u64,
    /// Remote event name
    pub event: String,
    /// Optional instigator
    #[serde(default)]
    pub instigator: Option<ActorId>,
}

/// Player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Format version
    pub version: u32,
    /// Script document, relative to the config file
    pub script: PathBuf,
    /// Engine frames to run
    pub frames: u64,
    /// Simulation seconds per engine frame
    pub fixed_timestep: f64,
    /// Simulation speed relative to real time
    pub time_scale: f32,
    /// Engine frames allowed per host frame
    pub max_steps_per_frame: u32,
    /// Default tracing filter directive (overridden by `RUST_LOG`)
    pub log_filter: String,
    /// Engine tunables
    pub engine: EngineConfig,
    /// Remote events to raise
    pub triggers: Vec<ScheduledTrigger>,
    /// Report format
    pub report: ReportFormat,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            version: PLAYER_FORMAT_VERSION,
            script: PathBuf::from("script.dirscript"),
            frames: 60,
            fixed_timestep: 1.0 / 60.0,
            time_scale: 1.0,
            max_steps_per_frame: 8,
            log_filter: "info".to_string(),
            engine: EngineConfig::default(),
            triggers: Vec::new(),
            report: ReportFormat::Text,
        }
    }
}

impl PlayerConfig {
    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self, PlayerError> {
        let content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = ron::from_str(&content)?;

        if config.version > PLAYER_FORMAT_VERSION {
            return Err(PlayerError::UnsupportedVersion {
                found: config.version,
                supported: PLAYER_FORMAT_VERSION,
            });
        }
        config.validate()?;
        Ok(config)
    }

    /// Save as pretty RON
    pub fn save(&self, path: &Path) -> Result<(), PlayerError> {
        let pretty = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        let content = ron::ser::to_string_pretty(self, pretty)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the frame loop cannot run with
    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.fixed_timestep.is_nan() || self.fixed_timestep <= 0.0 {
            return Err(PlayerError::InvalidConfig(format!(
                "fixed_timestep must be positive, got {}",
                self.fixed_timestep
            )));
        }
        if self.time_scale.is_nan() || self.time_scale <= 0.0 {
            return Err(PlayerError::InvalidConfig(format!(
                "time_scale must be positive, got {}",
                self.time_scale
            )));
        }
        if self.max_steps_per_frame == 0 {
            return Err(PlayerError::InvalidConfig("max_steps_per_frame must be at least 1".into()));
        }
        Ok(())
    }

    /// Script path, resolved against the directory holding the config
    pub fn script_path(&self, config_path: &Path) -> PathBuf {
        match config_path.parent() {
            Some(dir) if self.script.is_relative() => dir.join(&self.script),
            _ => self.script.clone(),
        }
    }

    /// Triggers scheduled for a frame, in file order
    pub fn triggers_at(&self, frame: u64) -> impl Iterator<Item = &ScheduledTrigger> {
        self.triggers.iter().filter(move |t| t.frame == frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PlayerConfig = ron::from_str("(frames: 10, report: Json)").unwrap();
        assert_eq!(config.frames, 10);
        assert_eq!(config.report, ReportFormat::Json);
        assert_eq!(config.version, PLAYER_FORMAT_VERSION);
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PLAYER_FILE_NAME);
        let mut config = PlayerConfig::default();
        config.triggers.push(ScheduledTrigger {
            frame: 3,
            event: "Ping".into(),
            instigator: Some(ActorId::new()),
        });
        config.save(&path).unwrap();

        let loaded = PlayerConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.triggers_at(3).count(), 1);
        assert_eq!(loaded.triggers_at(4).count(), 0);
        assert_eq!(loaded.script_path(&path), dir.path().join("script.dirscript"));
    }

    #[test]
    fn test_rejects_newer_version_and_bad_timestep() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PLAYER_FILE_NAME);

        let newer = PlayerConfig {
            version: PLAYER_FORMAT_VERSION + 1,
            ..Default::default()
        };
        newer.save(&path).unwrap();
        assert!(matches!(PlayerConfig::load(&path), Err(PlayerError::UnsupportedVersion { .. })));

        let stalled = PlayerConfig {
            time_scale: 0.0,
            ..Default::default()
        };
        stalled.save(&path).unwrap();
        assert!(matches!(PlayerConfig::load(&path), Err(PlayerError::InvalidConfig(_))));
    }
}
