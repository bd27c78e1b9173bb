// SPDX-License-Identifier: MIT OR Apache-2.0
//! The view of the running script a behavior gets during a hook.

use crate::node::NodeId;
use crate::script::Script;
use crate::thread::{ThreadData, ThreadId};
use crate::value::{ActorId, Value};

/// Side effects a behavior asks the engine to perform once its hook returns
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Request {
    /// Trigger an output of an event node
    Trigger {
        node: NodeId,
        output: String,
        instigator: Option<ActorId>,
        count_trigger: bool,
        immediate: bool,
    },
    /// Trigger every event node listening for a name
    RemoteEvent {
        name: String,
        instigator: Option<ActorId>,
    },
    /// Stop the threads sitting on an input of a node
    CancelInput {
        node: NodeId,
        input: usize,
        except: Option<ThreadId>,
    },
    /// A value node changed through a value link write
    ValueChanged(NodeId),
}

/// Context handed to node behaviors
pub struct NodeContext<'a> {
    script: &'a mut Script,
    node: NodeId,
    sim_delta: f32,
    real_delta: f32,
    input: usize,
    first_update: bool,
    thread: Option<ThreadId>,
    data: &'a mut ThreadData,
    pub(crate) skip_default: bool,
    pub(crate) requests: Vec<Request>,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(script: &'a mut Script, node: NodeId, data: &'a mut ThreadData) -> Self {
        Self {
            script,
            node,
            sim_delta: 0.0,
            real_delta: 0.0,
            input: 0,
            first_update: false,
            thread: None,
            data,
            skip_default: false,
            requests: Vec::new(),
        }
    }

    pub(crate) fn with_deltas(mut self, sim_delta: f32, real_delta: f32) -> Self {
        self.sim_delta = sim_delta;
        self.real_delta = real_delta;
        self
    }

    pub(crate) fn with_activation(mut self, thread: ThreadId, input: usize, first_update: bool) -> Self {
        self.thread = Some(thread);
        self.input = input;
        self.first_update = first_update;
        self
    }

    /// Node being run
    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Read access to the whole script
    pub fn script(&self) -> &Script {
        self.script
    }

    /// Simulation time elapsed this frame, in seconds
    pub fn sim_delta(&self) -> f32 {
        self.sim_delta
    }

    /// Real time elapsed this frame, in seconds
    pub fn real_delta(&self) -> f32 {
        self.real_delta
    }

    /// Index of the input the thread entered through
    pub fn input_index(&self) -> usize {
        self.input
    }

    /// Name of the input the thread entered through
    pub fn input_name(&self) -> Option<&str> {
        self.script
            .node(self.node)
            .and_then(|n| n.inputs().get(self.input))
            .map(|l| l.name.as_str())
    }

    /// Whether the thread entered through the named input
    pub fn is_input(&self, name: &str) -> bool {
        self.thread.is_some() && self.input_name() == Some(name)
    }

    /// Whether this is the node's first update for the current activation
    pub fn first_update(&self) -> bool {
        self.first_update
    }

    /// Thread being advanced, if the hook runs inside one
    pub fn thread(&self) -> Option<ThreadId> {
        self.thread
    }

    fn readable(&self, link: &str) -> bool {
        self.script
            .node(self.node)
            .and_then(|n| n.value_link(link))
            .is_some_and(|l| l.readable)
    }

    fn writable(&self, link: &str) -> bool {
        self.script
            .node(self.node)
            .and_then(|n| n.value_link(link))
            .is_some_and(|l| l.writable)
    }

    /// Number of values a link resolves to (elements for per-element links)
    pub fn property_count(&self, link: &str) -> usize {
        self.script.link_value_count(self.node, link)
    }

    /// Value at an explicit slot of a link.
    ///
    /// `None` when the link is unbound, unreadable or the index is out of range;
    /// callers fall back to the node's own property.
    pub fn get_at(&self, link: &str, index: usize) -> Option<Value> {
        if !self.readable(link) {
            return None;
        }
        self.script.link_value_at(self.node, link, index)
    }

    /// First value of a link
    pub fn get(&self, link: &str) -> Option<Value> {
        self.get_at(link, 0)
    }

    /// Every value of a link
    pub fn values(&self, link: &str) -> Vec<Value> {
        if !self.readable(link) {
            return Vec::new();
        }
        self.script.link_values(self.node, link)
    }

    /// First value of a link as a float
    pub fn get_float(&self, link: &str) -> Option<f32> {
        self.get(link).and_then(|v| v.as_float())
    }

    /// First value of a link as a double
    pub fn get_double(&self, link: &str) -> Option<f64> {
        self.get(link).and_then(|v| v.as_double())
    }

    /// First value of a link as an int
    pub fn get_int(&self, link: &str) -> Option<i32> {
        self.get(link).and_then(|v| v.as_int())
    }

    /// First value of a link as a bool
    pub fn get_bool(&self, link: &str) -> Option<bool> {
        self.get(link).and_then(|v| v.as_bool())
    }

    /// First value of a link as a string
    pub fn get_string(&self, link: &str) -> Option<String> {
        self.get(link).map(|v| v.to_property_string())
    }

    /// First value of a link as an actor
    pub fn get_actor(&self, link: &str) -> Option<ActorId> {
        self.get(link).and_then(|v| v.as_actor())
    }

    /// Float from a link, or `fallback` when unbound
    pub fn float_or(&self, link: &str, fallback: f32) -> f32 {
        self.get_float(link).unwrap_or(fallback)
    }

    /// Int from a link, or `fallback` when unbound
    pub fn int_or(&self, link: &str, fallback: i32) -> i32 {
        self.get_int(link).unwrap_or(fallback)
    }

    /// String from a link, or `fallback` when unbound
    pub fn string_or(&self, link: &str, fallback: &str) -> String {
        self.get_string(link).unwrap_or_else(|| fallback.to_string())
    }

    /// Write a value into every slot of a link; returns the number of
    /// value nodes that changed
    pub fn set(&mut self, link: &str, value: impl Into<Value>) -> usize {
        if !self.writable(link) {
            return 0;
        }
        let changed = self.script.write_link(self.node, link, &value.into());
        let count = changed.len();
        self.requests.extend(changed.into_iter().map(Request::ValueChanged));
        count
    }

    /// Write a value into one slot of a link; returns true when it changed
    pub fn set_at(&mut self, link: &str, index: usize, value: impl Into<Value>) -> bool {
        if !self.writable(link) {
            return false;
        }
        match self.script.write_link_at(self.node, link, index, &value.into()) {
            Some(changed) => {
                self.requests.push(Request::ValueChanged(changed));
                true
            }
            None => false,
        }
    }

    /// Activate an output link; returns false when the node has no such output
    pub fn activate_output(&mut self, name: &str) -> bool {
        match self.script.node_mut(self.node).and_then(|n| n.output_mut(name)) {
            Some(link) => {
                link.activated = true;
                true
            }
            None => false,
        }
    }

    /// Do not follow "Out" when the node completes without activating anything
    pub fn skip_default_output(&mut self) {
        self.skip_default = true;
    }

    /// Run `f` on this thread's state for the node, creating it on first use.
    ///
    /// State belongs to the thread, so two threads running through the same
    /// node never see each other's state.
    pub fn with_state<T, R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R
    where
        T: Default + Send + 'static,
    {
        let mut state: Box<T> = match self.data.0.take().map(|b| b.downcast::<T>()) {
            Some(Ok(state)) => state,
            _ => Box::default(),
        };
        let result = f(&mut state);
        self.data.0 = Some(state);
        result
    }

    /// Drop this thread's state for the node
    pub fn clear_state(&mut self) {
        self.data.clear();
    }

    /// Trigger an output of this (event) node, counted and immediate
    pub fn fire(&mut self, output: &str, instigator: Option<ActorId>) {
        self.requests.push(Request::Trigger {
            node: self.node,
            output: output.to_string(),
            instigator,
            count_trigger: true,
            immediate: true,
        });
    }

    /// Trigger every event node listening for `name`
    pub fn raise_remote_event(&mut self, name: &str, instigator: Option<ActorId>) {
        self.requests.push(Request::RemoteEvent {
            name: name.to_string(),
            instigator,
        });
    }

    /// Stop the other threads sitting on the named input of this node
    pub fn cancel_threads_on_input(&mut self, input: &str) {
        let Some(index) = self.script.node(self.node).and_then(|n| n.input_index(input)) else {
            return;
        };
        self.requests.push(Request::CancelInput {
            node: self.node,
            input: index,
            except: self.thread,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library;

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    #[test]
    fn test_state_is_typed_and_persistent() {
        let mut script = Script::new("Test");
        let id = crate::node::NodeId::new();
        let mut data = ThreadData::default();
        let mut ctx = NodeContext::new(&mut script, id, &mut data);

        let first = ctx.with_state(|c: &mut Counter| {
            c.hits += 1;
            c.hits
        });
        let second = ctx.with_state(|c: &mut Counter| {
            c.hits += 1;
            c.hits
        });
        assert_eq!((first, second), (1, 2));

        // A different type replaces the state
        let fresh = ctx.with_state(|v: &mut Vec<u8>| v.len());
        assert_eq!(fresh, 0);
        ctx.clear_state();
        assert!(data.is_empty());
    }

    #[test]
    fn test_link_flags_are_honored() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Test");
        let root = script.root();
        let delay = script.create_node(&registry, "Delay", root).expect("delay");
        let float = script.create_node(&registry, "Float", root).expect("float");
        let elapsed = script.create_node(&registry, "Float", root).expect("elapsed");
        script.bind_value(delay, "Delay", float).expect("bind");
        script.bind_value(delay, "Elapsed Time", elapsed).expect("bind");

        let mut data = ThreadData::default();
        let mut ctx = NodeContext::new(&mut script, delay, &mut data);
        // "Delay" is read-only from the node's side, "Elapsed Time" write-only
        assert_eq!(ctx.set("Delay", 3.0_f32), 0);
        assert_eq!(ctx.set("Elapsed Time", 0.5_f32), 1);
        assert_eq!(ctx.get("Elapsed Time"), None);
        assert_eq!(ctx.get_float("Delay"), Some(0.0));
        assert_eq!(ctx.float_or("Missing", 4.0), 4.0);
        assert_eq!(ctx.requests, vec![Request::ValueChanged(elapsed)]);
    }
}
