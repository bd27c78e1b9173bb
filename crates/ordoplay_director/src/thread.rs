// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution threads: cursors that walk the action graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;

/// Identifier of an execution thread, unique for the lifetime of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadState {
    /// Created, not yet stepped
    Spawned,
    /// Moved on and waiting for its next step
    Active,
    /// Waiting on a node that reported it is still running
    Parked,
    /// Finished or stopped; removed at the next purge
    Terminated,
}

/// Per-thread scratch data owned by the node the thread is at.
///
/// Reset whenever the thread moves to another node.
#[derive(Default)]
pub struct ThreadData(pub(crate) Option<Box<dyn Any + Send>>);

impl ThreadData {
    /// Whether any data is stored
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Drop stored data
    pub fn clear(&mut self) {
        self.0 = None;
    }
}

impl fmt::Debug for ThreadData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0.is_some() { "ThreadData(..)" } else { "ThreadData(empty)" })
    }
}

/// Position of a thread in the graph
#[derive(Debug)]
pub struct Cursor {
    /// Node the thread is at
    pub node: NodeId,
    /// Index of the input link it entered through
    pub input: usize,
    /// Next update is the node's first for this activation
    pub first: bool,
    /// Frame in which the cursor entered its node during frame processing
    pub(crate) entered_frame: Option<u64>,
    pub(crate) data: ThreadData,
}

impl Cursor {
    pub(crate) fn new(node: NodeId, input: usize) -> Self {
        Self {
            node,
            input,
            first: true,
            entered_frame: None,
            data: ThreadData::default(),
        }
    }
}

/// An execution thread
#[derive(Debug)]
pub struct ExecutionThread {
    /// Thread ID
    pub id: ThreadId,
    /// Node that spawned the thread
    pub origin: NodeId,
    /// Current position
    pub cursor: Cursor,
    /// Runs synchronously across immediate links
    pub immediate: bool,
    /// Lifecycle state
    pub state: ThreadState,
    /// First frame on which the thread may step
    pub(crate) resume_frame: u64,
}

impl ExecutionThread {
    /// Whether the thread is still live
    pub fn is_live(&self) -> bool {
        self.state != ThreadState::Terminated
    }
}
