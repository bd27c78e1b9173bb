// SPDX-License-Identifier: MIT OR Apache-2.0
//! Behavior traits implemented by event and action node types.
//!
//! The engine owns node storage; a behavior only ever sees the script
//! through a [`NodeContext`], which is how it reads and writes value links,
//! activates outputs and raises triggers.

use crate::context::NodeContext;
use crate::link::LinkSet;
use crate::property::PropertyMap;
use crate::value::Value;

/// Role a node plays at the boundary of its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// Exposed as an input link of the enclosing graph
    Input,
    /// Exposed as an output link of the enclosing graph
    Output,
    /// Exposed as a value link of the enclosing graph
    ExternalValue,
}

/// Hooks shared by every behavior
pub trait NodeBehavior: Send {
    /// Declare the node's links
    fn init(&self, _links: &mut LinkSet) {}

    /// Register behavior-specific properties
    fn build_property_map(&self, _map: &mut PropertyMap) {}

    /// Read a behavior-specific property
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Write a behavior-specific property; returns false when unknown
    fn set_property(&mut self, _name: &str, _value: &Value) -> bool {
        false
    }

    /// Called once when the engine starts
    fn on_start(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// Called when a value node bound to one of this node's value links changes
    fn on_link_value_changed(&mut self, _link: &str, _ctx: &mut NodeContext<'_>) {}

    /// Whether [`tick`](Self::tick) should run every frame
    fn wants_tick(&self) -> bool {
        false
    }

    /// Per-frame hook, independent of execution threads
    fn tick(&mut self, _ctx: &mut NodeContext<'_>) {}

    /// Boundary role, if this node is a graph port
    fn port_role(&self) -> Option<PortRole> {
        None
    }
}

/// Event node behavior: the entry points into a script
pub trait EventBehavior: NodeBehavior {
    /// Whether this node responds to the named remote event
    fn listens_for(&self, _event: &str) -> bool {
        false
    }
}

/// Action node behavior
pub trait ActionBehavior: NodeBehavior {
    /// Advance the node for one activation.
    ///
    /// Return true to stay active (the thread parks here and the node is
    /// updated again next frame), false once complete. Outputs activated
    /// through the context are followed; a completed node that activated
    /// nothing continues through "Out" unless it skipped the default output.
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool;
}

/// A behavior detached from its node while one of its hooks runs
pub(crate) enum TakenBehavior {
    Event(Box<dyn EventBehavior>),
    Action(Box<dyn ActionBehavior>),
}

impl TakenBehavior {
    pub(crate) fn on_start(&mut self, ctx: &mut NodeContext<'_>) {
        match self {
            Self::Event(b) => b.on_start(ctx),
            Self::Action(b) => b.on_start(ctx),
        }
    }

    pub(crate) fn on_link_value_changed(&mut self, link: &str, ctx: &mut NodeContext<'_>) {
        match self {
            Self::Event(b) => b.on_link_value_changed(link, ctx),
            Self::Action(b) => b.on_link_value_changed(link, ctx),
        }
    }

    pub(crate) fn wants_tick(&self) -> bool {
        match self {
            Self::Event(b) => b.wants_tick(),
            Self::Action(b) => b.wants_tick(),
        }
    }

    pub(crate) fn tick(&mut self, ctx: &mut NodeContext<'_>) {
        match self {
            Self::Event(b) => b.tick(ctx),
            Self::Action(b) => b.tick(ctx),
        }
    }
}
