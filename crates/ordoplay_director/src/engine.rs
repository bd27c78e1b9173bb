// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution engine: owns a script and advances its threads frame by frame.
//!
//! Events start threads; a thread walks action nodes, one update per step.
//! Immediate threads keep stepping within a frame for as long as they cross
//! immediate links; deferred threads take one step per frame. A node that
//! reports it is still running parks its thread until the next frame.

use crate::behavior::TakenBehavior;
use crate::config::EngineConfig;
use crate::context::{NodeContext, Request};
use crate::link::{ValueRef, DEFAULT_OUTPUT};
use crate::node::{Node, NodeId, NodeKind};
use crate::observer::{ExecutionObserver, ExecutionPhase, ExecutionRecord};
use crate::script::Script;
use crate::thread::{Cursor, ExecutionThread, ThreadData, ThreadId, ThreadState};
use crate::value::{ActorId, Value};
use crate::value_node::ValueRole;
use std::collections::{HashMap, VecDeque};

/// Result of asking an event node to trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The output fired; one thread per connected input
    Fired(Vec<ThreadId>),
    /// The node or a graph containing it is disabled
    Disabled,
    /// The instigator did not match the node's bound instigators
    Filtered,
    /// The trigger limit has been reached
    Spent,
    /// The node has no output of that name
    NoSuchOutput,
    /// The node is not an event node
    NotAnEvent,
    /// No node with that ID
    NodeNotFound,
}

impl TriggerOutcome {
    /// Whether the trigger went through
    pub fn fired(&self) -> bool {
        matches!(self, Self::Fired(_))
    }

    /// Threads started by the trigger
    pub fn threads(&self) -> &[ThreadId] {
        match self {
            Self::Fired(threads) => threads,
            _ => &[],
        }
    }
}

/// Diagnostics about what the engine did recently
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStatus {
    /// Most recent trigger request and its outcome
    pub last_trigger: Option<(NodeId, TriggerOutcome)>,
    /// Trigger requests that did not fire
    pub refused_triggers: u32,
    /// Threads aborted by the per-frame re-entry guard
    pub runaway_aborts: u32,
    /// Most recently executed node
    pub last_activated: Option<NodeId>,
}

enum Step {
    Parked,
    Terminated,
    Moved { synchronous: bool },
}

struct Destination {
    node: NodeId,
    input: usize,
    immediate: bool,
}

/// The execution engine
pub struct Engine {
    script: Script,
    config: EngineConfig,
    threads: Vec<ExecutionThread>,
    next_thread: u64,
    frame: u64,
    started: bool,
    in_update: bool,
    draining: bool,
    immediate_queue: VecDeque<ThreadId>,
    /// Node input entries since the frame (or immediate drain) began
    entries: HashMap<(NodeId, usize), u32>,
    notify_depth: u32,
    status: EngineStatus,
    observers: Vec<Box<dyn ExecutionObserver>>,
}

impl Engine {
    /// Create an engine with the default configuration
    pub fn new(script: Script) -> Self {
        Self::with_config(script, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration
    pub fn with_config(script: Script, config: EngineConfig) -> Self {
        Self {
            script,
            config,
            threads: Vec::new(),
            next_thread: 1,
            frame: 0,
            started: false,
            in_update: false,
            draining: false,
            immediate_queue: VecDeque::new(),
            entries: HashMap::new(),
            notify_depth: 0,
            status: EngineStatus::default(),
            observers: Vec::new(),
        }
    }

    /// The script being run
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Mutable access to the script (structural edits are allowed between frames)
    pub fn script_mut(&mut self) -> &mut Script {
        &mut self.script
    }

    /// Give the script back
    pub fn into_script(self) -> Script {
        self.script
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of the next frame to be processed
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether start hooks have run
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Diagnostics
    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    /// Register an execution observer
    pub fn add_observer(&mut self, observer: Box<dyn ExecutionObserver>) {
        self.observers.push(observer);
    }

    /// Live threads
    pub fn threads(&self) -> impl Iterator<Item = &ExecutionThread> {
        self.threads.iter().filter(|t| t.is_live())
    }

    /// Number of live threads
    pub fn active_thread_count(&self) -> usize {
        self.threads().count()
    }

    /// Get a live thread
    pub fn thread(&self, id: ThreadId) -> Option<&ExecutionThread> {
        self.threads().find(|t| t.id == id)
    }

    /// Whether a thread is still live
    pub fn is_thread_live(&self, id: ThreadId) -> bool {
        self.thread(id).is_some()
    }

    /// Run every node's start hook once. Called by the first [`update`](Self::update)
    /// when not called explicitly.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        tracing::info!("Starting script '{}' ({} nodes)", self.script.name, self.script.node_count());

        for id in self.script.ordered_nodes() {
            if self.script.is_node_enabled(id) {
                self.run_hook(id, 0.0, 0.0, |behavior, ctx| behavior.on_start(ctx));
            }
        }
        self.drain_immediate();
    }

    /// Advance one frame.
    ///
    /// Runs per-frame tick hooks, then steps every thread whose turn it is,
    /// including threads spawned during this frame by immediate links.
    pub fn update(&mut self, sim_delta: f32, real_delta: f32) {
        self.in_update = true;
        self.entries.clear();
        if !self.started {
            self.start();
        }

        for id in self.script.ordered_nodes() {
            let ticks = self
                .script
                .node(id)
                .is_some_and(Node::wants_tick);
            if ticks && self.script.is_node_enabled(id) {
                self.run_hook(id, sim_delta, real_delta, |behavior, ctx| behavior.tick(ctx));
            }
        }

        let mut index = 0;
        while index < self.threads.len() {
            let thread = &self.threads[index];
            if thread.is_live() && thread.resume_frame <= self.frame {
                let id = thread.id;
                self.advance_thread(id, sim_delta, real_delta);
            }
            index += 1;
        }

        self.purge_terminated();
        self.frame += 1;
        self.in_update = false;
    }

    /// Trigger an output of an event node.
    ///
    /// With `count_trigger` the node's trigger limit applies and the trigger
    /// is counted. An immediate trigger raised outside [`update`](Self::update)
    /// on a started engine runs its threads right away.
    pub fn trigger(
        &mut self,
        node: NodeId,
        output: &str,
        instigator: Option<ActorId>,
        count_trigger: bool,
        immediate: bool,
    ) -> TriggerOutcome {
        let outcome = self.trigger_event(node, output, instigator, count_trigger, immediate);
        if outcome.fired() {
            tracing::debug!("Event {node} fired '{output}' ({} threads)", outcome.threads().len());
            self.drain_immediate();
        } else {
            self.status.refused_triggers += 1;
            tracing::debug!("Event {node} refused trigger '{output}': {outcome:?}");
        }
        self.status.last_trigger = Some((node, outcome.clone()));
        outcome
    }

    /// Trigger every event node listening for a remote event
    pub fn trigger_remote_event(
        &mut self,
        name: &str,
        instigator: Option<ActorId>,
    ) -> Vec<(NodeId, TriggerOutcome)> {
        let listeners = self.script.event_listeners(name);
        if listeners.is_empty() {
            tracing::debug!("Remote event '{name}' has no listeners");
        }
        listeners
            .into_iter()
            .map(|node| (node, self.trigger(node, DEFAULT_OUTPUT, instigator, true, true)))
            .collect()
    }

    /// Start a thread directly at an input of an action node
    pub fn begin_thread(&mut self, node: NodeId, input: &str, immediate: bool) -> Option<ThreadId> {
        let target = self.script.node(node)?;
        if target.kind() != NodeKind::Action {
            return None;
        }
        let input = target.input_index(input)?;
        let id = self.spawn_thread(node, node, input, immediate, immediate);
        self.drain_immediate();
        Some(id)
    }

    /// Stop a thread without firing any outputs
    pub fn stop_thread(&mut self, id: ThreadId) -> bool {
        let Some(index) = self.thread_index(id) else {
            return false;
        };
        if !self.threads[index].is_live() {
            return false;
        }
        self.terminate(index);
        if !self.in_update && !self.draining {
            self.purge_terminated();
        }
        true
    }

    /// Stop every thread sitting on a node; returns how many were stopped
    pub fn stop_threads_at(&mut self, node: NodeId) -> usize {
        let doomed: Vec<ThreadId> = self
            .threads()
            .filter(|t| t.cursor.node == node)
            .map(|t| t.id)
            .collect();
        doomed.into_iter().filter(|id| self.stop_thread(*id)).count()
    }

    /// Remove a node from the script, stopping threads that sit on it
    pub fn remove_node(&mut self, node: NodeId) -> Option<Node> {
        self.stop_threads_at(node);
        self.script.remove_node(node)
    }

    /// Current value of a scalar value node
    pub fn value(&self, node: NodeId) -> Option<Value> {
        self.script.node(node)?.as_value().map(|v| v.value().clone())
    }

    /// Set a scalar value node, notifying the value links bound to it
    pub fn set_value(&mut self, node: NodeId, value: impl Into<Value>) -> bool {
        let value = value.into();
        let changed = self
            .script
            .node_mut(node)
            .and_then(Node::as_value_mut)
            .is_some_and(|v| v.set_value(&value));
        if changed {
            self.notify_value_changed(node);
        }
        changed
    }

    /// Replace the contents of an array value node, notifying bound links
    pub fn set_array(&mut self, node: NodeId, values: &[Value]) -> bool {
        let changed = self
            .script
            .node_mut(node)
            .and_then(Node::as_array_mut)
            .is_some_and(|a| a.set_array(values));
        if changed {
            self.notify_value_changed(node);
        }
        changed
    }

    /// Write a property from its string form; value changes notify bound links
    pub fn set_property_string(&mut self, node: NodeId, name: &str, text: &str) -> bool {
        let Some(target) = self.script.node_mut(node) else {
            return false;
        };
        let before = target.property_string("Value");
        let written = target.set_property_string(name, text);
        let after = target.property_string("Value");
        if written && before != after {
            self.notify_value_changed(node);
        }
        written
    }

    /// Restore every value node to its initial value
    pub fn reset_values(&mut self) {
        for id in self.script.ordered_nodes() {
            let changed = match self.script.node_mut(id) {
                Some(node) if node.kind() == NodeKind::Value => {
                    node.as_value_mut().is_some_and(|v| v.reset())
                }
                Some(node) if node.kind() == NodeKind::ArrayValue => {
                    node.as_array_mut().is_some_and(|a| a.reset())
                }
                _ => false,
            };
            if changed {
                self.notify_value_changed(id);
            }
        }
    }

    fn trigger_event(
        &mut self,
        node_id: NodeId,
        output: &str,
        instigator: Option<ActorId>,
        count_trigger: bool,
        immediate: bool,
    ) -> TriggerOutcome {
        let Some(node) = self.script.node(node_id) else {
            return TriggerOutcome::NodeNotFound;
        };
        if node.kind() != NodeKind::Event {
            return TriggerOutcome::NotAnEvent;
        }
        if !self.script.is_node_enabled(node_id) {
            return TriggerOutcome::Disabled;
        }
        if node.output(output).is_none() {
            return TriggerOutcome::NoSuchOutput;
        }
        if !self.instigator_matches(node_id, instigator) {
            return TriggerOutcome::Filtered;
        }

        if count_trigger {
            if let Some(event) = self.script.node_mut(node_id).and_then(Node::as_event_mut) {
                if event.max_trigger_count > 0 {
                    if event.trigger_count >= event.max_trigger_count {
                        return TriggerOutcome::Spent;
                    }
                    event.trigger_count += 1;
                }
            }
        }

        let outputs = vec![output.to_string()];
        let destinations = self.destinations(node_id, &outputs);
        self.report(node_id, None, None, outputs, ExecutionPhase::Triggered);

        let threads = destinations
            .into_iter()
            .map(|d| self.spawn_thread(node_id, d.node, d.input, immediate, immediate && d.immediate))
            .collect();
        TriggerOutcome::Fired(threads)
    }

    fn instigator_matches(&self, node: NodeId, instigator: Option<ActorId>) -> bool {
        let bound = self
            .script
            .node(node)
            .and_then(|n| n.value_link("Instigator"))
            .is_some_and(|l| l.is_bound());
        if !bound {
            return true;
        }
        let allowed = self.script.link_values(node, "Instigator");
        if allowed.is_empty() {
            return true;
        }
        instigator.is_some_and(|actor| allowed.iter().any(|v| v.as_actor() == Some(actor)))
    }

    fn thread_index(&self, id: ThreadId) -> Option<usize> {
        self.threads.iter().position(|t| t.id == id)
    }

    /// Spawn a thread at a node input. `synchronous` threads run within the
    /// current frame (or right away, when outside a frame on a started engine).
    fn spawn_thread(
        &mut self,
        origin: NodeId,
        node: NodeId,
        input: usize,
        immediate: bool,
        synchronous: bool,
    ) -> ThreadId {
        let id = ThreadId(self.next_thread);
        self.next_thread += 1;

        let mut cursor = Cursor::new(node, input);
        let resume_frame = if self.in_update {
            if synchronous {
                cursor.entered_frame = Some(self.frame);
                self.frame
            } else {
                self.frame + 1
            }
        } else {
            if synchronous && self.started {
                self.immediate_queue.push_back(id);
            }
            self.frame
        };

        self.enter_input(node, input);
        self.threads.push(ExecutionThread {
            id,
            origin,
            cursor,
            immediate,
            state: ThreadState::Spawned,
            resume_frame,
        });
        id
    }

    fn enter_input(&mut self, node: NodeId, input: usize) {
        if let Some(link) = self.script.node_mut(node).and_then(|n| n.inputs.get_mut(input)) {
            link.activation_count += 1;
        }
    }

    fn leave_input(&mut self, node: NodeId, input: usize) {
        if let Some(link) = self.script.node_mut(node).and_then(|n| n.inputs.get_mut(input)) {
            link.activation_count = link.activation_count.saturating_sub(1);
        }
    }

    fn terminate(&mut self, index: usize) {
        let thread = &mut self.threads[index];
        if thread.state == ThreadState::Terminated {
            return;
        }
        thread.state = ThreadState::Terminated;
        thread.cursor.data.clear();
        let (node, input) = (thread.cursor.node, thread.cursor.input);
        self.leave_input(node, input);
    }

    fn purge_terminated(&mut self) {
        self.threads.retain(ExecutionThread::is_live);
    }

    fn drain_immediate(&mut self) {
        if self.draining || self.in_update || !self.started {
            return;
        }
        self.draining = true;
        self.entries.clear();
        while let Some(id) = self.immediate_queue.pop_front() {
            self.advance_thread(id, 0.0, 0.0);
        }
        self.draining = false;
        self.purge_terminated();
    }

    fn next_resume_frame(&self) -> u64 {
        if self.in_update {
            self.frame + 1
        } else {
            self.frame
        }
    }

    fn advance_thread(&mut self, id: ThreadId, sim_delta: f32, real_delta: f32) {
        loop {
            let Some(index) = self.thread_index(id) else {
                return;
            };
            if !self.threads[index].is_live() {
                return;
            }

            match self.step(index, sim_delta, real_delta) {
                Step::Parked => {
                    let resume = self.next_resume_frame();
                    if let Some(index) = self.thread_index(id) {
                        let thread = &mut self.threads[index];
                        if thread.is_live() {
                            thread.state = ThreadState::Parked;
                            thread.resume_frame = resume;
                        }
                    }
                    return;
                }
                Step::Terminated => {
                    if let Some(index) = self.thread_index(id) {
                        self.terminate(index);
                    }
                    return;
                }
                Step::Moved { synchronous: true } => continue,
                Step::Moved { synchronous: false } => {
                    let resume = self.next_resume_frame();
                    if let Some(index) = self.thread_index(id) {
                        let thread = &mut self.threads[index];
                        thread.state = ThreadState::Active;
                        thread.resume_frame = resume;
                    }
                    return;
                }
            }
        }
    }

    fn step(
        &mut self,
        index: usize,
        sim_delta: f32,
        real_delta: f32,
    ) -> Step {
        let thread = &self.threads[index];
        let thread_id = thread.id;
        let immediate = thread.immediate;
        let node_id = thread.cursor.node;
        let input = thread.cursor.input;
        let first = thread.cursor.first;
        let entered_now = thread.cursor.entered_frame == Some(self.frame) && self.in_update;

        let Some(node) = self.script.node(node_id) else {
            tracing::warn!("Thread {thread_id} points at missing node {node_id}");
            return Step::Terminated;
        };
        if node.kind() != NodeKind::Action {
            tracing::warn!("Thread {thread_id} reached non-action node {node_id}");
            return Step::Terminated;
        }
        if !self.script.is_node_enabled(node_id) {
            tracing::debug!("Thread {thread_id} stopped at disabled node {node_id}");
            return Step::Terminated;
        }

        // Entries are counted across all threads; resumed parked threads do not count
        let entered = if first {
            let count = self.entries.entry((node_id, input)).or_insert(0);
            *count += 1;
            *count
        } else {
            0
        };
        if entered > self.config.max_reentry_per_frame {
            tracing::error!(
                "Thread {thread_id} entered {} '{}' more than {} times in one frame; aborting runaway loop",
                node.type_name(),
                node.name,
                self.config.max_reentry_per_frame
            );
            self.status.runaway_aborts += 1;
            return Step::Terminated;
        }

        let Some(mut behavior) = self.script.node_mut(node_id).and_then(Node::take_action) else {
            tracing::warn!("Node {node_id} has no behavior to run");
            return Step::Terminated;
        };

        let (sim_delta, real_delta) = if first && entered_now {
            (0.0, 0.0)
        } else {
            (sim_delta, real_delta)
        };

        let mut data = std::mem::take(&mut self.threads[index].cursor.data);
        let (keep_running, skip_default, requests) = {
            let mut ctx = NodeContext::new(&mut self.script, node_id, &mut data)
                .with_deltas(sim_delta, real_delta)
                .with_activation(thread_id, input, first);
            let keep_running = behavior.update(&mut ctx);
            (keep_running, ctx.skip_default, std::mem::take(&mut ctx.requests))
        };
        if let Some(node) = self.script.node_mut(node_id) {
            node.restore_action(behavior);
        }

        {
            let cursor = &mut self.threads[index].cursor;
            cursor.first = false;
            if keep_running {
                cursor.data = data;
            }
        }

        let mut activated = self.take_activated(node_id);
        if !keep_running && activated.is_empty() && !skip_default {
            let has_default = self
                .script
                .node(node_id)
                .is_some_and(|n| n.output(DEFAULT_OUTPUT).is_some());
            if has_default {
                activated.push(DEFAULT_OUTPUT.to_string());
            }
        }

        let phase = match (first, keep_running) {
            (true, false) => Some(ExecutionPhase::Executed),
            (true, true) => Some(ExecutionPhase::Began),
            (false, false) => Some(ExecutionPhase::Finished),
            (false, true) if !activated.is_empty() => Some(ExecutionPhase::Updated),
            (false, true) => None,
        };
        self.status.last_activated = Some(node_id);
        if let Some(phase) = phase {
            let input_name = self
                .script
                .node(node_id)
                .and_then(|n| n.inputs().get(input))
                .map(|l| l.name.clone());
            self.report(node_id, Some(thread_id), input_name, activated.clone(), phase);
        }

        let destinations = self.destinations(node_id, &activated);

        let step = if keep_running {
            for d in destinations {
                self.spawn_thread(node_id, d.node, d.input, immediate, immediate && d.immediate);
            }
            Step::Parked
        } else {
            let mut destinations = destinations.into_iter();
            match destinations.next() {
                None => Step::Terminated,
                Some(next) => {
                    for d in destinations {
                        self.spawn_thread(node_id, d.node, d.input, immediate, immediate && d.immediate);
                    }
                    self.leave_input(node_id, input);
                    self.enter_input(next.node, next.input);
                    let mut cursor = Cursor::new(next.node, next.input);
                    if self.in_update {
                        cursor.entered_frame = Some(self.frame);
                    }
                    if let Some(index) = self.thread_index(thread_id) {
                        self.threads[index].cursor = cursor;
                        self.threads[index].state = ThreadState::Active;
                    }
                    Step::Moved {
                        synchronous: immediate && next.immediate,
                    }
                }
            }
        };

        self.process_requests(requests);

        // A request may have stopped this very thread
        match self.thread_index(thread_id) {
            Some(index) if self.threads[index].is_live() => step,
            _ => Step::Terminated,
        }
    }

    /// Collect and clear the activated outputs of a node, in link order
    fn take_activated(&mut self, node: NodeId) -> Vec<String> {
        let Some(node) = self.script.node_mut(node) else {
            return Vec::new();
        };
        node.outputs
            .iter_mut()
            .filter(|o| o.activated)
            .map(|o| {
                o.activated = false;
                o.name.clone()
            })
            .collect()
    }

    /// Resolve activated outputs to enabled target inputs, in fan-out order
    fn destinations(&self, node: NodeId, outputs: &[String]) -> Vec<Destination> {
        let Some(source) = self.script.node(node) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for name in outputs {
            let Some(link) = source.output(name) else {
                continue;
            };
            for target in link.targets() {
                if !self.script.is_node_enabled(target.node) {
                    continue;
                }
                let Some(input) = self.script.node(target.node).and_then(|n| n.input_index(&target.input)) else {
                    continue;
                };
                out.push(Destination {
                    node: target.node,
                    input,
                    immediate: link.immediate,
                });
            }
        }
        out
    }

    fn run_hook(
        &mut self,
        node: NodeId,
        sim_delta: f32,
        real_delta: f32,
        hook: impl FnOnce(&mut TakenBehavior, &mut NodeContext<'_>),
    ) {
        let Some(mut behavior) = self.script.node_mut(node).and_then(Node::take_behavior) else {
            return;
        };
        let mut data = ThreadData::default();
        let requests = {
            let mut ctx = NodeContext::new(&mut self.script, node, &mut data).with_deltas(sim_delta, real_delta);
            hook(&mut behavior, &mut ctx);
            std::mem::take(&mut ctx.requests)
        };
        if let Some(target) = self.script.node_mut(node) {
            target.restore_behavior(behavior);
        }
        // Outputs only carry threads out of updates
        self.take_activated(node);
        self.process_requests(requests);
    }

    fn process_requests(&mut self, requests: Vec<Request>) {
        for request in requests {
            match request {
                Request::Trigger {
                    node,
                    output,
                    instigator,
                    count_trigger,
                    immediate,
                } => {
                    self.trigger(node, &output, instigator, count_trigger, immediate);
                }
                Request::RemoteEvent { name, instigator } => {
                    self.trigger_remote_event(&name, instigator);
                }
                Request::CancelInput { node, input, except } => {
                    let doomed: Vec<usize> = self
                        .threads
                        .iter()
                        .enumerate()
                        .filter(|(_, t)| {
                            t.is_live() && t.cursor.node == node && t.cursor.input == input && Some(t.id) != except
                        })
                        .map(|(i, _)| i)
                        .collect();
                    for index in doomed {
                        self.terminate(index);
                    }
                }
                Request::ValueChanged(node) => self.notify_value_changed(node),
            }
        }
    }

    /// Tell every value link bound to `node` (directly or through external
    /// value proxies) that its value changed
    fn notify_value_changed(&mut self, node: NodeId) {
        if self.notify_depth >= self.config.max_notify_depth {
            tracing::warn!("Value change notifications nested too deep at node {node}; dropping");
            return;
        }
        self.notify_depth += 1;

        let mut pending = vec![node];
        let mut visited = vec![node];
        let mut listeners: Vec<ValueRef> = Vec::new();
        while let Some(value) = pending.pop() {
            let Some(value_node) = self.script.node(value) else {
                continue;
            };
            for referrer in value_node.referrers() {
                let is_proxy = self
                    .script
                    .node(referrer.node)
                    .and_then(Node::as_value)
                    .is_some_and(|v| v.role() == ValueRole::External);
                if is_proxy {
                    if !visited.contains(&referrer.node) {
                        visited.push(referrer.node);
                        pending.push(referrer.node);
                    }
                } else {
                    listeners.push(referrer.clone());
                }
            }
        }

        for listener in listeners {
            if self.script.is_node_enabled(listener.node) {
                let link = listener.link;
                self.run_hook(listener.node, 0.0, 0.0, |behavior, ctx| {
                    behavior.on_link_value_changed(&link, ctx);
                });
            }
        }

        self.notify_depth -= 1;
    }

    fn report(
        &mut self,
        node: NodeId,
        thread: Option<ThreadId>,
        input: Option<String>,
        outputs: Vec<String>,
        phase: ExecutionPhase,
    ) {
        let Some(target) = self.script.node(node) else {
            return;
        };
        if self.config.node_logging && target.logging {
            let label = if target.comment.is_empty() {
                target.name.as_str()
            } else {
                target.comment.as_str()
            };
            tracing::info!(
                "{:?} Input ({}) on Node '{} - {}' and Output ({})",
                phase,
                input.as_deref().unwrap_or(""),
                target.type_name(),
                label,
                outputs.join(", ")
            );
        }
        if self.observers.is_empty() {
            return;
        }
        let record = ExecutionRecord {
            frame: self.frame,
            node,
            type_name: target.type_name().to_string(),
            thread,
            input,
            outputs,
            phase,
        };
        for observer in &mut self.observers {
            observer.on_node_execution(&record);
        }
    }

    // Snapshot support

    pub(crate) fn started_flag(&mut self) -> &mut bool {
        &mut self.started
    }

    pub(crate) fn frame_mut(&mut self) -> &mut u64 {
        &mut self.frame
    }

    pub(crate) fn clear_threads(&mut self) {
        let live: Vec<usize> = (0..self.threads.len()).collect();
        for index in live {
            self.terminate(index);
        }
        self.threads.clear();
        self.immediate_queue.clear();
    }

    pub(crate) fn restore_thread(&mut self, origin: NodeId, node: NodeId, input: usize, first: bool, immediate: bool) -> ThreadId {
        let id = self.spawn_thread(origin, node, input, immediate, false);
        if let Some(index) = self.thread_index(id) {
            let thread = &mut self.threads[index];
            thread.cursor.first = first;
            thread.state = if first { ThreadState::Spawned } else { ThreadState::Parked };
        }
        id
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("script", &self.script.name)
            .field("frame", &self.frame)
            .field("started", &self.started)
            .field("threads", &self.active_thread_count())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library;
    use crate::node::NodeRegistry;
    use crate::observer::ExecutionRecorder;

    struct Fixture {
        registry: NodeRegistry,
        script: Script,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: library::create_default_registry(),
                script: Script::new("Test"),
            }
        }

        fn node(&mut self, type_name: &str) -> NodeId {
            let root = self.script.root();
            self.script.create_node(&self.registry, type_name, root).unwrap()
        }

        fn remote_event(&mut self, name: &str) -> NodeId {
            let id = self.node("Remote Event");
            self.prop(id, "Event Name", name);
            id
        }

        fn prop(&mut self, node: NodeId, name: &str, value: &str) {
            assert!(self.script.node_mut(node).unwrap().set_property_string(name, value));
        }

        fn connect(&mut self, from: NodeId, output: &str, to: NodeId, input: &str) {
            self.script.connect(from, output, to, input).unwrap();
        }

        fn bind(&mut self, node: NodeId, link: &str, value: NodeId) {
            self.script.bind_value(node, link, value).unwrap();
        }

        fn engine(self) -> (Engine, ExecutionRecorder) {
            self.engine_with(EngineConfig::default())
        }

        fn engine_with(self, config: EngineConfig) -> (Engine, ExecutionRecorder) {
            let recorder = ExecutionRecorder::new();
            let mut engine = Engine::with_config(self.script, config);
            engine.add_observer(Box::new(recorder.clone()));
            engine.start();
            (engine, recorder)
        }
    }

    fn float(engine: &Engine, node: NodeId) -> f32 {
        engine.value(node).and_then(|v| v.as_float()).unwrap()
    }

    #[test]
    fn test_delay_completes_on_tenth_tick() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let delay = fx.node("Delay");
        let log = fx.node("Log");
        let elapsed = fx.node("Float");
        fx.connect(event, "Out", delay, "Start");
        fx.connect(delay, "Out", log, "In");
        fx.bind(delay, "Elapsed Time", elapsed);
        let (mut engine, recorder) = fx.engine();

        let outcome = engine.trigger(event, "Out", None, true, false);
        let thread = outcome.threads()[0];

        for tick in 1..=9 {
            engine.update(0.1, 0.1);
            assert!(engine.is_thread_live(thread), "parked on tick {tick}");
            assert!((float(&engine, elapsed) - 0.1 * tick as f32).abs() < 1e-3);
        }
        engine.update(0.1, 0.1);
        assert_eq!(float(&engine, elapsed), 0.0);

        let phases: Vec<_> = recorder.records_for(delay).iter().map(|r| (r.frame, r.phase)).collect();
        assert_eq!(phases, vec![(0, ExecutionPhase::Began), (9, ExecutionPhase::Finished)]);
        assert_eq!(recorder.count_for(log), 0);

        // Deferred thread crosses into the Log on the next frame
        engine.update(0.1, 0.1);
        assert_eq!(recorder.count_for(log), 1);
        assert_eq!(engine.active_thread_count(), 0);
    }

    #[test]
    fn test_threads_through_one_node_are_independent() {
        let mut fx = Fixture::new();
        let a = fx.remote_event("A");
        let b = fx.remote_event("B");
        let delay = fx.node("Delay");
        fx.prop(delay, "Delay", "0.5");
        fx.connect(a, "Out", delay, "Start");
        fx.connect(b, "Out", delay, "Start");
        let (mut engine, _) = fx.engine();

        let first = engine.trigger(a, "Out", None, true, false).threads()[0];
        let second = engine.trigger(b, "Out", None, true, false).threads()[0];
        assert_ne!(first, second);

        engine.update(0.1, 0.1);
        engine.update(0.1, 0.1);
        assert!(engine.stop_thread(first));
        assert!(!engine.is_thread_live(first));
        assert!(!engine.stop_thread(first));

        engine.update(0.1, 0.1);
        engine.update(0.1, 0.1);
        assert!(engine.is_thread_live(second));
        engine.update(0.1, 0.1);
        assert!(!engine.is_thread_live(second));

        let start = engine.script().node(delay).and_then(|n| n.input("Start")).unwrap();
        assert_eq!(start.activation_count(), 0);
    }

    #[test]
    fn test_stop_input_cancels_waiting_threads() {
        let mut fx = Fixture::new();
        let go = fx.remote_event("Go");
        let halt = fx.remote_event("Halt");
        let delay = fx.node("Delay");
        let log = fx.node("Log");
        fx.connect(go, "Out", delay, "Start");
        fx.connect(halt, "Out", delay, "Stop");
        fx.connect(delay, "Out", log, "In");
        let (mut engine, recorder) = fx.engine();

        engine.trigger_remote_event("Go", None);
        engine.trigger_remote_event("Go", None);
        engine.update(0.1, 0.1);
        assert_eq!(engine.active_thread_count(), 2);

        engine.trigger_remote_event("Halt", None);
        assert_eq!(engine.active_thread_count(), 0);
        for _ in 0..20 {
            engine.update(0.1, 0.1);
        }
        assert_eq!(recorder.count_for(log), 0);
    }

    #[test]
    fn test_fan_out_runs_in_link_order() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let first = fx.node("Log");
        let second = fx.node("Log");
        fx.connect(event, "Out", first, "In");
        fx.connect(event, "Out", second, "In");
        let (mut engine, recorder) = fx.engine();

        let results = engine.trigger_remote_event("Go", None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.threads().len(), 2);

        let order: Vec<_> = recorder.records().iter().map(|r| (r.node, r.phase)).collect();
        assert_eq!(
            order,
            vec![
                (event, ExecutionPhase::Triggered),
                (first, ExecutionPhase::Executed),
                (second, ExecutionPhase::Executed),
            ]
        );
        assert_eq!(engine.active_thread_count(), 0);
    }

    #[test]
    fn test_deferred_link_waits_for_next_frame() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let first = fx.node("Log");
        let second = fx.node("Log");
        fx.connect(event, "Out", first, "In");
        fx.connect(first, "Out", second, "In");
        if let Some(link) = fx.script.node_mut(first).and_then(|n| n.output_mut("Out")) {
            link.immediate = false;
        }
        let (mut engine, recorder) = fx.engine();

        engine.trigger_remote_event("Go", None);
        assert_eq!(recorder.count_for(first), 1);
        assert_eq!(recorder.count_for(second), 0);
        assert_eq!(engine.active_thread_count(), 1);

        engine.update(0.016, 0.016);
        assert_eq!(recorder.count_for(second), 1);
        assert_eq!(engine.active_thread_count(), 0);
    }

    #[test]
    fn test_trigger_limit() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        fx.prop(event, "Max Trigger Count", "2");
        let (mut engine, _) = fx.engine();

        assert!(engine.trigger(event, "Out", None, true, true).fired());
        assert!(engine.trigger(event, "Out", None, true, true).fired());
        assert_eq!(engine.trigger(event, "Out", None, true, true), TriggerOutcome::Spent);
        assert_eq!(engine.status().refused_triggers, 1);
        assert_eq!(engine.status().last_trigger, Some((event, TriggerOutcome::Spent)));

        // Uncounted triggers ignore the limit
        assert!(engine.trigger(event, "Out", None, false, true).fired());
        let count = engine.script().node(event).and_then(|n| n.as_event()).map(|e| e.trigger_count());
        assert_eq!(count, Some(2));

        assert_eq!(engine.trigger(event, "Nope", None, true, true), TriggerOutcome::NoSuchOutput);
    }

    #[test]
    fn test_instigator_filter() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Touch");
        let first = fx.node("Actor");
        let second = fx.node("Actor");
        fx.bind(event, "Instigator", first);
        fx.bind(event, "Instigator", second);
        let open = fx.remote_event("Open");
        let (mut engine, _) = fx.engine();

        let hero = ActorId::new();
        let sidekick = ActorId::new();
        let stranger = ActorId::new();
        assert!(engine.set_value(first, hero));
        assert!(engine.set_value(second, sidekick));

        assert!(engine.trigger(event, "Out", Some(hero), true, true).fired());
        assert!(engine.trigger(event, "Out", Some(sidekick), true, true).fired());
        assert_eq!(engine.trigger(event, "Out", Some(stranger), true, true), TriggerOutcome::Filtered);
        assert_eq!(engine.trigger(event, "Out", None, true, true), TriggerOutcome::Filtered);

        // Nothing bound to Instigator: anyone, or no one, may trigger
        assert!(engine.trigger(open, "Out", None, true, true).fired());
        assert!(engine.trigger(open, "Out", Some(stranger), true, true).fired());

        let results = engine.trigger_remote_event("Touch", Some(hero));
        assert!(results.iter().all(|(_, outcome)| outcome.fired()));
    }

    #[test]
    fn test_disabled_graph_refuses_triggers() {
        let mut fx = Fixture::new();
        let root = fx.script.root();
        let sub = fx.script.add_graph(root, "Sub").unwrap();
        let event = fx.script.create_node(&fx.registry, "Remote Event", sub).unwrap();
        fx.prop(event, "Event Name", "Go");
        let log = fx.node("Log");
        fx.connect(event, "Out", log, "In");
        fx.script.graph_mut(sub).unwrap().enabled = false;
        let (mut engine, recorder) = fx.engine();

        assert_eq!(engine.trigger(event, "Out", None, true, true), TriggerOutcome::Disabled);
        engine.script_mut().graph_mut(sub).unwrap().enabled = true;
        assert!(engine.trigger(event, "Out", None, true, true).fired());

        // Disabled targets are skipped when resolving destinations
        engine.script_mut().node_mut(log).unwrap().enabled = false;
        assert_eq!(engine.trigger(event, "Out", None, true, true), TriggerOutcome::Fired(Vec::new()));
        assert_eq!(recorder.count_for(log), 1);
    }

    #[test]
    fn test_runaway_loop_is_aborted() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let a = fx.node("Log");
        let b = fx.node("Log");
        fx.connect(event, "Out", a, "In");
        fx.connect(a, "Out", b, "In");
        fx.connect(b, "Out", a, "In");
        let config = EngineConfig {
            max_reentry_per_frame: 8,
            ..Default::default()
        };
        let (mut engine, recorder) = fx.engine_with(config);

        engine.trigger_remote_event("Go", None);
        assert_eq!(engine.status().runaway_aborts, 1);
        assert_eq!(engine.active_thread_count(), 0);
        assert_eq!(recorder.count_for(a), 8);
        assert_eq!(recorder.count_for(b), 8);
    }

    #[test]
    fn test_runaway_loop_through_fan_out_is_aborted() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let a = fx.node("Log");
        let b = fx.node("Log");
        let c = fx.node("Log");
        fx.connect(event, "Out", a, "In");
        fx.connect(a, "Out", b, "In");
        fx.connect(a, "Out", c, "In");
        fx.connect(b, "Out", a, "In");
        fx.connect(c, "Out", a, "In");
        let config = EngineConfig {
            max_reentry_per_frame: 8,
            ..Default::default()
        };
        let (mut engine, recorder) = fx.engine_with(config);

        // Every pass through A spawns another thread into C
        engine.trigger_remote_event("Go", None);
        assert!(engine.status().runaway_aborts > 0);
        assert_eq!(engine.active_thread_count(), 0);
        assert_eq!(recorder.count_for(a), 8);
        assert_eq!(recorder.count_for(b), 8);
        assert_eq!(recorder.count_for(c), 8);

        // The bound resets with the next drain
        engine.trigger_remote_event("Go", None);
        assert_eq!(recorder.count_for(a), 16);
        assert_eq!(engine.active_thread_count(), 0);
    }

    #[test]
    fn test_remote_event_raised_from_script() {
        let mut fx = Fixture::new();
        let start = fx.node("Start");
        let call = fx.node("Call Remote Event");
        fx.prop(call, "Event Name", "Boom");
        let listener = fx.remote_event("Boom");
        let log = fx.node("Log");
        fx.connect(start, "Out", call, "In");
        fx.connect(listener, "Out", log, "In");

        let recorder = ExecutionRecorder::new();
        let mut engine = Engine::new(fx.script);
        engine.add_observer(Box::new(recorder.clone()));
        engine.update(0.016, 0.016);

        let log_records = recorder.records_for(log);
        assert_eq!(log_records.len(), 1);
        assert_eq!(log_records[0].frame, 0);
    }

    #[test]
    fn test_value_changed_through_external_proxy() {
        let mut fx = Fixture::new();
        let event = fx.node("Value Changed");
        let proxy = fx.node("External Value");
        let health = fx.node("Int");
        let log = fx.node("Log");
        fx.bind(proxy, "Value", health);
        fx.bind(event, "Value", proxy);
        fx.connect(event, "Out", log, "In");
        let (mut engine, recorder) = fx.engine();

        assert!(engine.set_value(health, 5));
        assert_eq!(recorder.count_for(log), 1);

        // Unchanged values do not notify
        assert!(!engine.set_value(health, 5));
        assert_eq!(recorder.count_for(log), 1);
        assert_eq!(engine.script().link_value_at(event, "Value", 0), Some(Value::Int(5)));
    }

    #[test]
    fn test_timer_pause_and_stop() {
        let mut fx = Fixture::new();
        let go = fx.remote_event("Go");
        let hold = fx.remote_event("Hold");
        let halt = fx.remote_event("Halt");
        let timer = fx.node("Timer");
        let time = fx.node("Float");
        fx.connect(go, "Out", timer, "Start");
        fx.connect(hold, "Out", timer, "Pause");
        fx.connect(halt, "Out", timer, "Stop");
        fx.bind(timer, "Time", time);
        let (mut engine, _) = fx.engine();

        engine.trigger_remote_event("Go", None);
        engine.update(0.25, 0.25);
        engine.update(0.25, 0.25);
        assert_eq!(float(&engine, time), 0.5);

        engine.trigger_remote_event("Hold", None);
        engine.update(0.25, 0.25);
        assert_eq!(float(&engine, time), 0.5);
        assert_eq!(engine.active_thread_count(), 0);

        engine.trigger_remote_event("Halt", None);
        assert_eq!(float(&engine, time), 0.0);
    }

    #[test]
    fn test_array_items() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let numbers = fx.node("Int Array");
        let get = fx.node("Get Array Item");
        let set = fx.node("Set Array Item");
        let size = fx.node("Array Size");
        let item = fx.node("Int");
        let count = fx.node("Int");
        let missing = fx.node("Log");
        fx.prop(get, "Index", "1");
        fx.prop(set, "Index", "0");
        fx.prop(set, "Item", "42");
        fx.bind(get, "Array", numbers);
        fx.bind(get, "Item", item);
        fx.bind(set, "Array", numbers);
        fx.bind(size, "Array", numbers);
        fx.bind(size, "Size", count);
        fx.connect(event, "Out", get, "In");
        fx.connect(get, "Out", set, "In");
        fx.connect(get, "Out of Range", missing, "In");
        fx.connect(set, "Out", size, "In");
        let (mut engine, recorder) = fx.engine();

        assert!(engine.set_array(numbers, &[Value::Int(1), Value::Int(2), Value::Int(3)]));
        engine.trigger_remote_event("Go", None);
        assert_eq!(engine.value(item), Some(Value::Int(2)));
        assert_eq!(engine.value(count), Some(Value::Int(3)));
        let first = engine.script().node(numbers).and_then(|n| n.as_array()).and_then(|a| a.element(0).cloned());
        assert_eq!(first, Some(Value::Int(42)));

        assert!(engine.set_property_string(get, "Index", "7"));
        engine.trigger_remote_event("Go", None);
        assert_eq!(recorder.count_for(missing), 1);
        assert_eq!(recorder.count_for(set), 1);
    }

    #[test]
    fn test_math_feeds_compare() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let math = fx.node("Math");
        let compare = fx.node("Compare");
        let product = fx.node("Double");
        let equal = fx.node("Log");
        let other = fx.node("Log");
        fx.prop(math, "Operator", "*");
        fx.prop(math, "A", "2");
        fx.prop(math, "B", "3");
        fx.prop(compare, "B", "6");
        fx.bind(math, "Result", product);
        fx.bind(compare, "A", product);
        fx.connect(event, "Out", math, "In");
        fx.connect(math, "Out", compare, "In");
        fx.connect(compare, "Equal", equal, "In");
        fx.connect(compare, "Less", other, "In");
        fx.connect(compare, "Greater", other, "In");
        let (mut engine, recorder) = fx.engine();

        engine.trigger_remote_event("Go", None);
        assert_eq!(engine.value(product), Some(Value::Double(6.0)));
        assert_eq!(recorder.count_for(equal), 1);
        assert_eq!(recorder.count_for(other), 0);
    }

    #[test]
    fn test_flow_ports_pass_through() {
        let mut fx = Fixture::new();
        let root = fx.script.root();
        let sub = fx.script.add_graph(root, "Sub").unwrap();
        let entry = fx.script.create_node(&fx.registry, "Input Link", sub).unwrap();
        let exit = fx.script.create_node(&fx.registry, "Output Link", sub).unwrap();
        let inner = fx.script.create_node(&fx.registry, "Log", sub).unwrap();
        let event = fx.remote_event("Go");
        let after = fx.node("Log");
        fx.connect(event, "Out", entry, "In");
        fx.connect(entry, "Out", inner, "In");
        fx.connect(inner, "Out", exit, "In");
        fx.connect(exit, "Out", after, "In");
        assert_eq!(fx.script.input_nodes(sub), vec![entry]);
        assert_eq!(fx.script.output_nodes(sub), vec![exit]);
        let (mut engine, recorder) = fx.engine();

        engine.trigger_remote_event("Go", None);
        assert_eq!(recorder.count_for(inner), 1);
        assert_eq!(recorder.count_for(after), 1);
    }

    #[test]
    fn test_begin_thread_and_remove_node() {
        let mut fx = Fixture::new();
        let event = fx.remote_event("Go");
        let delay = fx.node("Delay");
        let (mut engine, _) = fx.engine();

        assert_eq!(engine.begin_thread(event, "Out", true), None);
        assert_eq!(engine.begin_thread(delay, "Nope", true), None);
        let thread = engine.begin_thread(delay, "Start", false).unwrap();
        engine.update(0.1, 0.1);
        assert!(engine.is_thread_live(thread));

        let second = engine.begin_thread(delay, "Start", false).unwrap();
        assert_eq!(engine.stop_threads_at(delay), 2);
        assert!(!engine.is_thread_live(second));

        engine.begin_thread(delay, "Start", false).unwrap();
        assert!(engine.remove_node(delay).is_some());
        assert_eq!(engine.active_thread_count(), 0);
        assert!(!engine.is_thread_live(thread));
        assert_eq!(engine.trigger(delay, "Out", None, true, true), TriggerOutcome::NodeNotFound);
    }

    #[test]
    fn test_reset_values_notifies() {
        let mut fx = Fixture::new();
        let event = fx.node("Value Changed");
        let score = fx.node("Int");
        let log = fx.node("Log");
        fx.bind(event, "Value", score);
        fx.connect(event, "Out", log, "In");
        let (mut engine, recorder) = fx.engine();

        engine.set_value(score, 10);
        engine.reset_values();
        assert_eq!(engine.value(score), Some(Value::Int(0)));
        assert_eq!(recorder.count_for(log), 2);
    }
}
