// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sample script and config written by `--write-sample`.
//!
//! Each "Ping" waits a quarter second, then adds one to "Counter". A
//! sub-graph records the last event name, and a "Value Changed" event logs
//! every counter change.

use crate::config::{PlayerConfig, ScheduledTrigger, PLAYER_FILE_NAME};
use crate::error::PlayerError;
use ordoplay_director::persist::{save_script, SCRIPT_EXTENSION};
use ordoplay_director::{DirectorError, NodeId, NodeRegistry, Script};
use std::path::{Path, PathBuf};

fn named(script: &mut Script, registry: &NodeRegistry, type_name: &str, name: &str) -> Result<NodeId, DirectorError> {
    let graph = script.root();
    let id = script.create_node(registry, type_name, graph)?;
    if let Some(node) = script.node_mut(id) {
        node.name = name.to_string();
    }
    Ok(id)
}

fn set(script: &mut Script, node: NodeId, property: &str, value: &str) {
    let written = script
        .node_mut(node)
        .is_some_and(|n| n.set_property_string(property, value));
    if !written {
        tracing::warn!("Demo node {node}: could not set '{property}'");
    }
}

/// Build the sample script
pub fn build_demo_script(registry: &NodeRegistry) -> Result<Script, DirectorError> {
    let mut script = Script::new("Demo");
    script.description = "Counts pings after a short delay".to_string();

    let start = named(&mut script, registry, "Start", "Start")?;
    let hello = named(&mut script, registry, "Log", "Hello")?;
    set(&mut script, hello, "Message", "Demo started");
    script.connect(start, "Out", hello, "In")?;

    let ping = named(&mut script, registry, "Remote Event", "Ping")?;
    set(&mut script, ping, "Event Name", "Ping");
    let delay = named(&mut script, registry, "Delay", "Wait")?;
    set(&mut script, delay, "Delay", "0.25");
    let add = named(&mut script, registry, "Math", "Increment")?;
    set(&mut script, add, "Operator", "+");
    set(&mut script, add, "B", "1");
    let counter = named(&mut script, registry, "Int", "Counter")?;
    let pong = named(&mut script, registry, "Log", "Pong")?;
    set(&mut script, pong, "Message", "Pong");

    script.connect(ping, "Out", delay, "Start")?;
    script.connect(delay, "Out", add, "In")?;
    script.connect(add, "Out", pong, "In")?;
    script.bind_value(add, "A", counter)?;
    script.bind_value(add, "Result", counter)?;

    let changed = named(&mut script, registry, "Value Changed", "Counter Changed")?;
    let report = named(&mut script, registry, "Log", "Report")?;
    set(&mut script, report, "Message", "Counter changed");
    script.bind_value(changed, "Value", counter)?;
    script.connect(changed, "Out", report, "In")?;
    if let Some(node) = script.node_mut(report) {
        node.logging = true;
    }

    let root = script.root();
    let history = script.add_graph(root, "History")?;
    let inner_ping = script.create_node(registry, "Remote Event", history)?;
    set(&mut script, inner_ping, "Event Name", "Ping");
    let record = script.create_node(registry, "Set Value", history)?;
    set(&mut script, record, "Source", "Ping");
    let last = script.create_node(registry, "String", history)?;
    if let Some(node) = script.node_mut(last) {
        node.name = "Last Event".to_string();
    }
    script.connect(inner_ping, "Out", record, "In")?;
    script.bind_value(record, "Dest", last)?;

    Ok(script)
}

/// Player config for the sample script
pub fn demo_config() -> PlayerConfig {
    let triggers = [5, 20, 40]
        .into_iter()
        .map(|frame| ScheduledTrigger {
            frame,
            event: "Ping".to_string(),
            instigator: None,
        })
        .collect();
    PlayerConfig {
        script: PathBuf::from(format!("demo.{SCRIPT_EXTENSION}")),
        frames: 60,
        triggers,
        ..Default::default()
    }
}

/// Write the sample script and config into `dir`; returns the config path
pub fn write_sample(dir: &Path, registry: &NodeRegistry) -> Result<PathBuf, PlayerError> {
    std::fs::create_dir_all(dir)?;
    let config = demo_config();
    let script = build_demo_script(registry)?;
    save_script(&script, &config.script_path(&dir.join(PLAYER_FILE_NAME)))?;

    let config_path = dir.join(PLAYER_FILE_NAME);
    config.save(&config_path)?;
    tracing::info!("Wrote sample to {}", dir.display());
    Ok(config_path)
}
