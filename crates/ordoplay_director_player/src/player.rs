// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless frame loop.

use crate::clock::FrameClock;
use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::report::Report;
use ordoplay_director::library::create_default_registry;
use ordoplay_director::persist::load_script;
use ordoplay_director::{Engine, Script};
use std::path::Path;

/// Runs a script under a player config
pub struct Player {
    config: PlayerConfig,
    engine: Engine,
    clock: FrameClock,
    triggers_raised: usize,
}

impl Player {
    /// Wrap an already loaded script
    pub fn new(config: PlayerConfig, script: Script) -> Self {
        let clock = FrameClock::new(config.fixed_timestep, config.time_scale, config.max_steps_per_frame);
        let engine = Engine::with_config(script, config.engine.clone());
        Self {
            config,
            engine,
            clock,
            triggers_raised: 0,
        }
    }

    /// Load a config and the script it names
    pub fn load(config_path: &Path) -> Result<Self, PlayerError> {
        let config = PlayerConfig::load(config_path)?;
        let registry = create_default_registry();
        let script_path = config.script_path(config_path);
        let (script, report) = load_script(&script_path, &registry)?;
        if !report.is_clean() {
            tracing::warn!(
                "Script loaded partially: missing types {:?}, {} skipped nodes, {} unresolved links",
                report.missing_node_types,
                report.skipped_nodes,
                report.unresolved_links
            );
        }
        Ok(Self::new(config, script))
    }

    /// Player config
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Override the number of frames to run
    pub fn set_frames(&mut self, frames: u64) {
        self.config.frames = frames;
    }

    /// The engine being driven
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run every configured frame and return the report
    pub fn run(&mut self) -> Report {
        tracing::info!(
            "Running '{}' for {} frames at {:.4}s (x{})",
            self.engine.script().name,
            self.config.frames,
            self.config.fixed_timestep,
            self.config.time_scale
        );
        self.engine.start();

        let host_step = self.clock.host_step();
        while self.engine.frame() < self.config.frames {
            let steps = self.clock.advance(host_step);
            for _ in 0..steps {
                if self.engine.frame() >= self.config.frames {
                    break;
                }
                self.step();
            }
        }

        let status = self.engine.status();
        if status.runaway_aborts > 0 {
            tracing::warn!("{} threads were aborted as runaway loops", status.runaway_aborts);
        }
        tracing::info!(
            "Finished after {} frames; {} threads still live",
            self.engine.frame(),
            self.engine.active_thread_count()
        );
        Report::collect(&self.engine, self.clock.elapsed_time, self.triggers_raised)
    }

    fn step(&mut self) {
        let frame = self.engine.frame();
        let due: Vec<_> = self.config.triggers_at(frame).cloned().collect();
        for trigger in due {
            let results = self.engine.trigger_remote_event(&trigger.event, trigger.instigator);
            let fired = results.iter().filter(|(_, outcome)| outcome.fired()).count();
            tracing::debug!(
                "Frame {frame}: raised '{}' ({fired}/{} listeners fired)",
                trigger.event,
                results.len()
            );
            self.triggers_raised += 1;
        }
        self.engine.update(self.clock.sim_delta(), self.clock.real_delta());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PLAYER_FILE_NAME;
    use crate::demo;

    #[test]
    fn test_demo_counts_pings() {
        let registry = create_default_registry();
        let script = demo::build_demo_script(&registry).unwrap();
        let mut player = Player::new(demo::demo_config(), script);

        let report = player.run();
        assert_eq!(report.frames, 60);
        assert_eq!(report.triggers_raised, 3);
        assert_eq!(report.value("Counter"), Some("3"));
        assert_eq!(report.value("Last Event"), Some("Ping"));
        assert_eq!(report.active_threads, 0);
        assert_eq!(report.runaway_aborts, 0);
    }

    #[test]
    fn test_sample_files_run() {
        let dir = tempfile::tempdir().unwrap();
        let registry = create_default_registry();
        let config_path = demo::write_sample(dir.path(), &registry).unwrap();
        assert_eq!(config_path, dir.path().join(PLAYER_FILE_NAME));

        let mut player = Player::load(&config_path).unwrap();
        assert_eq!(player.config().frames, 60);
        let report = player.run();
        assert_eq!(report.value("Counter"), Some("3"));

        let json = report.render(crate::config::ReportFormat::Json).unwrap();
        assert!(json.contains("\"Counter\""));
        let text = report.render(crate::config::ReportFormat::Text).unwrap();
        assert!(text.contains("Script 'Demo'"));
    }

    #[test]
    fn test_time_scale_keeps_frame_count() {
        let registry = create_default_registry();
        let script = demo::build_demo_script(&registry).unwrap();
        let config = PlayerConfig {
            time_scale: 3.0,
            ..demo::demo_config()
        };
        let mut player = Player::new(config, script);
        let report = player.run();
        assert_eq!(report.frames, 60);
        assert_eq!(report.value("Counter"), Some("3"));
        assert!(player.engine().is_started());
    }
}
