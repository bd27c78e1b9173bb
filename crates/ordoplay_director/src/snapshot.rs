// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime state snapshots.
//!
//! A snapshot captures what changes while a script runs: the frame counter,
//! value node contents, event trigger counts and where each live thread
//! sits. Node-private thread state is not captured, so restored threads
//! re-enter their current node as a first update.

use crate::engine::Engine;
use crate::error::DirectorError;
use crate::node::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};

/// Saved position of one execution thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    /// Node that started the thread
    pub origin: NodeId,
    /// Node the thread sits on
    pub node: NodeId,
    /// Input index the thread entered through
    pub input: usize,
    /// Whether the thread continues synchronously across immediate links
    pub immediate: bool,
}

/// Saved runtime state of an engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    /// Next frame number
    pub frame: u64,
    /// Whether start hooks had run
    pub started: bool,
    /// Value and array node contents as property strings
    pub values: Vec<(NodeId, String)>,
    /// Event trigger counts
    pub trigger_counts: Vec<(NodeId, u32)>,
    /// Live threads
    pub threads: Vec<ThreadSnapshot>,
}

impl EngineState {
    /// Encode with bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>, DirectorError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode from bincode
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DirectorError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl Engine {
    /// Capture the runtime state
    pub fn snapshot(&self) -> EngineState {
        let mut state = EngineState {
            frame: self.frame(),
            started: self.is_started(),
            ..Default::default()
        };

        for node in self.script().nodes() {
            match node.kind() {
                NodeKind::Value | NodeKind::ArrayValue => {
                    if let Some(text) = node.property_string("Value") {
                        state.values.push((node.id(), text));
                    }
                }
                NodeKind::Event => {
                    if let Some(event) = node.as_event() {
                        state.trigger_counts.push((node.id(), event.trigger_count()));
                    }
                }
                NodeKind::Action => {}
            }
        }

        state.threads = self
            .threads()
            .map(|t| ThreadSnapshot {
                origin: t.origin,
                node: t.cursor.node,
                input: t.cursor.input,
                immediate: t.immediate,
            })
            .collect();
        state
    }

    /// Restore a captured state onto the same script.
    ///
    /// Values are written without change notifications. Entries naming nodes
    /// the script no longer has are skipped.
    pub fn restore(&mut self, state: &EngineState) {
        self.clear_threads();
        *self.frame_mut() = state.frame;
        *self.started_flag() = state.started;

        let mut skipped = 0usize;
        for (id, text) in &state.values {
            let written = self
                .script_mut()
                .node_mut(*id)
                .is_some_and(|node| node.set_property_string("Value", text));
            if !written {
                skipped += 1;
            }
        }

        for (id, count) in &state.trigger_counts {
            match self.script_mut().node_mut(*id).and_then(|n| n.as_event_mut()) {
                Some(event) => event.trigger_count = *count,
                None => skipped += 1,
            }
        }

        for thread in &state.threads {
            let valid = self
                .script()
                .node(thread.node)
                .is_some_and(|n| n.kind() == NodeKind::Action && thread.input < n.inputs().len());
            if valid {
                self.restore_thread(thread.origin, thread.node, thread.input, true, thread.immediate);
            } else {
                skipped += 1;
            }
        }

        if skipped > 0 {
            tracing::warn!("Snapshot restore skipped {skipped} entries for missing nodes");
        }
        tracing::debug!(
            "Restored frame {} with {} threads",
            state.frame,
            self.active_thread_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library;
    use crate::script::Script;
    use crate::value::Value;

    #[test]
    fn test_snapshot_restores_values_and_threads() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Snapshot");
        let root = script.root();
        let start = script.create_node(&registry, "Start", root).expect("start");
        let delay = script.create_node(&registry, "Delay", root).expect("delay");
        let counter = script.create_node(&registry, "Int", root).expect("int");
        script.connect(start, "Out", delay, "Start").expect("connect");

        let mut engine = Engine::new(script);
        engine.update(0.1, 0.1);
        engine.set_value(counter, 7);
        let state = engine.snapshot();
        assert_eq!(state.threads.len(), 1);

        let bytes = state.to_bytes().expect("encode");
        let decoded = EngineState::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, state);

        engine.set_value(counter, 1);
        engine.clear_threads();
        engine.restore(&decoded);
        assert_eq!(engine.value(counter), Some(Value::Int(7)));
        assert_eq!(engine.active_thread_count(), 1);
        assert_eq!(engine.frame(), state.frame);
        assert!(engine.threads().all(|t| t.cursor.node == delay));
    }

    #[test]
    fn test_trigger_counts_survive_restore() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Counts");
        let root = script.root();
        let event = script.create_node(&registry, "Remote Event", root).expect("event");
        let log = script.create_node(&registry, "Log", root).expect("log");
        script.connect(event, "Out", log, "In").expect("connect");
        if let Some(node) = script.node_mut(event) {
            node.set_property_string("Event Name", "Ping");
            node.set_property_string("Max Trigger Count", "1");
        }

        let mut engine = Engine::new(script);
        engine.start();
        let state = engine.snapshot();
        assert!(engine.trigger(event, "Out", None, true, true).fired());
        assert!(!engine.trigger(event, "Out", None, true, true).fired());

        engine.restore(&state);
        assert!(engine.trigger(event, "Out", None, true, true).fired());
    }
}
