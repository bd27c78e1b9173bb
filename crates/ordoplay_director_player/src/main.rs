// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` Director Player - headless script runner
//!
//! Loads a player config and the behavior script it names, steps the engine
//! on a fixed timestep, raises the scheduled remote events and prints a
//! report of the final values.
//!
//! Usage:
//!   `ordoplay_director_player <player.ron> [--frames N] [--json]`
//!   `ordoplay_director_player --write-sample <dir>`

mod clock;
mod config;
mod demo;
mod error;
mod player;
mod report;

use config::ReportFormat;
use error::PlayerError;
use player::Player;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const USAGE: &str = "Usage: ordoplay_director_player <player.ron> [--frames N] [--json]\n       ordoplay_director_player --write-sample <dir>";

/// What the command line asked for
#[derive(Debug, PartialEq)]
enum Command {
    Run {
        config: PathBuf,
        frames: Option<u64>,
        json: bool,
    },
    WriteSample(PathBuf),
}

fn parse_args(args: &[String]) -> Result<Command, PlayerError> {
    let usage = || PlayerError::Usage(USAGE.to_string());
    let first = args.get(1).ok_or_else(usage)?;

    if first == "--write-sample" {
        let dir = args.get(2).ok_or_else(usage)?;
        return Ok(Command::WriteSample(PathBuf::from(dir)));
    }

    let mut frames = None;
    let mut json = false;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" => {
                let value = args.get(i + 1).ok_or_else(usage)?;
                let count = value
                    .parse()
                    .map_err(|_| PlayerError::Usage(format!("Invalid frame count '{value}'")))?;
                frames = Some(count);
                i += 2;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            other => return Err(PlayerError::Usage(format!("Unknown argument '{other}'\n{USAGE}"))),
        }
    }

    Ok(Command::Run {
        config: PathBuf::from(first),
        frames,
        json,
    })
}

fn init_tracing(default_filter: &str) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    match default_filter.parse() {
        Ok(directive) => env_filter = env_filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring log filter '{default_filter}': {e}"),
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run(command: Command) -> Result<(), PlayerError> {
    match command {
        Command::WriteSample(dir) => {
            init_tracing("info");
            let registry = ordoplay_director::library::create_default_registry();
            let config_path = demo::write_sample(&dir, &registry)?;
            println!("Sample written; run it with: ordoplay_director_player {}", config_path.display());
            Ok(())
        }
        Command::Run { config, frames, json } => {
            let mut player = Player::load(&config)?;
            init_tracing(&player.config().log_filter);
            tracing::info!("Starting OrdoPlay Director Player v{}", env!("CARGO_PKG_VERSION"));

            if let Some(frames) = frames {
                player.set_frames(frames);
            }
            let format = if json { ReportFormat::Json } else { player.config().report };
            let report = player.run();
            tracing::debug!("Final engine state: {:?}", player.engine());
            println!("{}", report.render(format)?);
            Ok(())
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    };

    if let Err(e) = run(command) {
        tracing::error!("Player failed: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("player").chain(list.iter().copied()).map(String::from).collect()
    }

    #[test]
    fn test_parse_run() {
        let command = parse_args(&args(&["demo/player.ron", "--frames", "120", "--json"])).unwrap();
        assert_eq!(
            command,
            Command::Run {
                config: PathBuf::from("demo/player.ron"),
                frames: Some(120),
                json: true,
            }
        );
    }

    #[test]
    fn test_parse_write_sample() {
        let command = parse_args(&args(&["--write-sample", "out"])).unwrap();
        assert_eq!(command, Command::WriteSample(PathBuf::from("out")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_args(&args(&[])), Err(PlayerError::Usage(_))));
        assert!(matches!(parse_args(&args(&["p.ron", "--frames", "x"])), Err(PlayerError::Usage(_))));
        assert!(matches!(parse_args(&args(&["p.ron", "--fast"])), Err(PlayerError::Usage(_))));
    }
}
