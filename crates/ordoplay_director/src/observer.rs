// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution observation: hooks for debuggers, tests and recorders.

use crate::node::NodeId;
use crate::thread::ThreadId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Phase of a node activation, as reported to observers and node logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    /// An event node fired
    Triggered,
    /// First update that completed immediately
    Executed,
    /// First update that kept the node running
    Began,
    /// Later update that produced outputs while the node keeps running
    Updated,
    /// Later update that completed the node
    Finished,
}

/// One observed node activation
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    /// Frame the activation happened in
    pub frame: u64,
    /// Node that ran
    pub node: NodeId,
    /// Type name of the node
    pub type_name: String,
    /// Thread that ran it (`None` for event triggers)
    pub thread: Option<ThreadId>,
    /// Input the thread entered through
    pub input: Option<String>,
    /// Outputs activated by the activation
    pub outputs: Vec<String>,
    /// Phase
    pub phase: ExecutionPhase,
}

/// Receives a callback for every node activation
pub trait ExecutionObserver: Send {
    /// Called after a node ran and its outputs were collected
    fn on_node_execution(&mut self, record: &ExecutionRecord);
}

/// Observer that stores every record in a shared list.
///
/// Clones share the same list, so a clone can be handed to the engine while
/// the caller keeps one to inspect.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRecorder {
    records: Arc<Mutex<Vec<ExecutionRecord>>>,
}

impl ExecutionRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record so far
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().clone()
    }

    /// Number of activations of a node
    pub fn count_for(&self, node: NodeId) -> usize {
        self.records.lock().iter().filter(|r| r.node == node).count()
    }

    /// Records for one node
    pub fn records_for(&self, node: NodeId) -> Vec<ExecutionRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.node == node)
            .cloned()
            .collect()
    }

    /// Forget everything recorded
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl ExecutionObserver for ExecutionRecorder {
    fn on_node_execution(&mut self, record: &ExecutionRecord) {
        self.records.lock().push(record.clone());
    }
}
