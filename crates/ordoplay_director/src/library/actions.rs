// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action nodes: timing, flow and utility.

use crate::behavior::{ActionBehavior, NodeBehavior};
use crate::context::NodeContext;
use crate::link::{LinkSet, ValueLink};
use crate::node::{NodeBody, NodeCategory, NodeRegistry, NodeType};
use crate::property::{PropertyDef, PropertyMap};
use crate::value::{Value, ValueType};

/// Accumulated time within this much of the target counts as reached
pub const TIME_TOLERANCE: f32 = 1e-4;

/// Register the action node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        "Delay",
        NodeCategory::Flow,
        "Waits for a duration before continuing through Out",
        || NodeBody::action(Delay::default()),
    ));
    registry.register(NodeType::new(
        "Timer",
        NodeCategory::Flow,
        "Accumulates running time between Start and Stop",
        || NodeBody::action(Timer::default()),
    ));
    registry.register(NodeType::new(
        "Log",
        NodeCategory::Utility,
        "Writes a message to the log",
        || NodeBody::action(Log::default()),
    ));
    registry.register(NodeType::new(
        "Set Value",
        NodeCategory::Utility,
        "Copies Source into every Dest value",
        || NodeBody::action(SetValue::default()),
    ));
    registry.register(NodeType::new(
        "Compare",
        NodeCategory::Math,
        "Continues through Less, Equal or Greater",
        || NodeBody::action(Compare::default()),
    ));
    registry.register(NodeType::new(
        "Math",
        NodeCategory::Math,
        "Applies an operator to A and B and writes Result",
        || NodeBody::action(Math::default()),
    ));
    registry.register(NodeType::new(
        "Call Remote Event",
        NodeCategory::Utility,
        "Raises a remote event by name",
        || NodeBody::action(CallRemoteEvent::default()),
    ));
}

/// Waits `Delay` seconds of simulation time.
///
/// Elapsed time is kept per thread, so concurrent threads through one
/// Delay node wait independently. "Stop" cancels every waiting thread.
#[derive(Debug)]
pub struct Delay {
    delay: f32,
}

impl Default for Delay {
    fn default() -> Self {
        Self { delay: 1.0 }
    }
}

#[derive(Default)]
struct DelayRun {
    elapsed: f32,
}

impl NodeBehavior for Delay {
    fn init(&self, links: &mut LinkSet) {
        links
            .input("Start")
            .input("Stop")
            .output("Out")
            .value(ValueLink::new("Delay", ValueType::Float).input_only())
            .value(ValueLink::new("Elapsed Time", ValueType::Float).output().multiple());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Delay", ValueType::Float).description("Seconds to wait"));
    }

    fn property(&self, name: &str) -> Option<Value> {
        (name == "Delay").then_some(Value::Float(self.delay))
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match (name, value.as_float()) {
            ("Delay", Some(delay)) => {
                self.delay = delay;
                true
            }
            _ => false,
        }
    }
}

impl ActionBehavior for Delay {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        if ctx.is_input("Stop") {
            ctx.cancel_threads_on_input("Start");
            ctx.set("Elapsed Time", 0.0_f32);
            ctx.skip_default_output();
            return false;
        }

        let delay = ctx.float_or("Delay", self.delay);
        let delta = ctx.sim_delta();
        let first = ctx.first_update();
        let elapsed = ctx.with_state(|run: &mut DelayRun| {
            if first {
                run.elapsed = 0.0;
            }
            run.elapsed += delta;
            run.elapsed
        });

        if elapsed + TIME_TOLERANCE >= delay {
            ctx.set("Elapsed Time", 0.0_f32);
            ctx.clear_state();
            return false;
        }
        ctx.set("Elapsed Time", elapsed);
        true
    }
}

/// Start/Stop/Pause timer writing its running time to "Time".
///
/// Timer state belongs to the node: one timer runs at a time and a second
/// Start while running is ignored. Pause keeps the accumulated time, Stop
/// clears it.
#[derive(Debug, Default)]
pub struct Timer {
    running: bool,
    elapsed: f32,
    generation: u64,
}

#[derive(Default)]
struct TimerRun {
    generation: u64,
}

impl NodeBehavior for Timer {
    fn init(&self, links: &mut LinkSet) {
        links
            .input("Start")
            .input("Stop")
            .input("Pause")
            .output("Started")
            .output("Stopped")
            .output("Paused")
            .value(ValueLink::new("Time", ValueType::Float).output().multiple());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Time", ValueType::Float).read_only());
    }

    fn property(&self, name: &str) -> Option<Value> {
        (name == "Time").then_some(Value::Float(self.elapsed))
    }
}

impl ActionBehavior for Timer {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        if ctx.is_input("Stop") {
            self.running = false;
            self.elapsed = 0.0;
            ctx.set("Time", 0.0_f32);
            ctx.activate_output("Stopped");
            return false;
        }

        if ctx.is_input("Pause") {
            if self.running {
                self.running = false;
                ctx.activate_output("Paused");
            } else {
                ctx.skip_default_output();
            }
            return false;
        }

        if ctx.first_update() {
            if self.running {
                ctx.skip_default_output();
                return false;
            }
            self.running = true;
            self.generation += 1;
            let generation = self.generation;
            ctx.with_state(|run: &mut TimerRun| run.generation = generation);
            ctx.activate_output("Started");
            return true;
        }

        let generation = ctx.with_state(|run: &mut TimerRun| run.generation);
        if !self.running || generation != self.generation {
            ctx.skip_default_output();
            return false;
        }
        self.elapsed += ctx.sim_delta();
        let elapsed = self.elapsed;
        ctx.set("Time", elapsed);
        true
    }
}

/// Writes "Message" to the log
#[derive(Debug, Default)]
pub struct Log {
    message: String,
}

impl NodeBehavior for Log {
    fn init(&self, links: &mut LinkSet) {
        links.value(ValueLink::new("Message", ValueType::String).input_only());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Message", ValueType::String));
    }

    fn property(&self, name: &str) -> Option<Value> {
        (name == "Message").then(|| Value::String(self.message.clone()))
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        if name != "Message" {
            return false;
        }
        self.message = value.to_property_string();
        true
    }
}

impl ActionBehavior for Log {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let message = ctx.string_or("Message", &self.message);
        let name = ctx
            .script()
            .node(ctx.node_id())
            .map(|n| n.name.clone())
            .unwrap_or_default();
        tracing::info!("[{name}] {message}");
        false
    }
}

/// Copies "Source" into every slot of "Dest"
#[derive(Debug, Default)]
pub struct SetValue {
    source: String,
}

impl NodeBehavior for SetValue {
    fn init(&self, links: &mut LinkSet) {
        links
            .value(ValueLink::new("Source", ValueType::Any).input_only())
            .value(ValueLink::new("Dest", ValueType::Any).output().multiple().per_element());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Source", ValueType::String).description("Used when Source is unbound"));
    }

    fn property(&self, name: &str) -> Option<Value> {
        (name == "Source").then(|| Value::String(self.source.clone()))
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        if name != "Source" {
            return false;
        }
        self.source = value.to_property_string();
        true
    }
}

impl ActionBehavior for SetValue {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let value = ctx
            .get("Source")
            .unwrap_or_else(|| Value::String(self.source.clone()));
        ctx.set("Dest", value);
        false
    }
}

/// Compares A with B
#[derive(Debug, Default)]
pub struct Compare {
    a: f64,
    b: f64,
}

impl NodeBehavior for Compare {
    fn init(&self, links: &mut LinkSet) {
        links
            .input("In")
            .output("Less")
            .output("Equal")
            .output("Greater")
            .value(ValueLink::new("A", ValueType::Double).input_only())
            .value(ValueLink::new("B", ValueType::Double).input_only());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("A", ValueType::Double))
            .add(PropertyDef::new("B", ValueType::Double));
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "A" => Some(Value::Double(self.a)),
            "B" => Some(Value::Double(self.b)),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        let Some(number) = value.as_double() else {
            return false;
        };
        match name {
            "A" => self.a = number,
            "B" => self.b = number,
            _ => return false,
        }
        true
    }
}

impl ActionBehavior for Compare {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let a = ctx.get_double("A").unwrap_or(self.a);
        let b = ctx.get_double("B").unwrap_or(self.b);
        let output = if (a - b).abs() <= f64::EPSILON {
            "Equal"
        } else if a < b {
            "Less"
        } else {
            "Greater"
        };
        ctx.activate_output(output);
        false
    }
}

/// Operator applied by a [`Math`] node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathOperator {
    /// A + B
    #[default]
    Add,
    /// A - B
    Subtract,
    /// A * B
    Multiply,
    /// A / B (0 when B is 0)
    Divide,
    /// min(A, B)
    Min,
    /// max(A, B)
    Max,
}

impl MathOperator {
    /// Parse from the property form
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "+" | "add" => Some(Self::Add),
            "-" | "subtract" => Some(Self::Subtract),
            "*" | "multiply" => Some(Self::Multiply),
            "/" | "divide" => Some(Self::Divide),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// Property form
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Apply to two operands
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide if b == 0.0 => 0.0,
            Self::Divide => a / b,
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        }
    }
}

/// Arithmetic on two numbers
#[derive(Debug, Default)]
pub struct Math {
    operator: MathOperator,
    a: f64,
    b: f64,
}

impl NodeBehavior for Math {
    fn init(&self, links: &mut LinkSet) {
        links
            .value(ValueLink::new("A", ValueType::Double).input_only())
            .value(ValueLink::new("B", ValueType::Double).input_only())
            .value(ValueLink::new("Result", ValueType::Double).output().multiple());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Operator", ValueType::String).description("+, -, *, /, min or max"))
            .add(PropertyDef::new("A", ValueType::Double))
            .add(PropertyDef::new("B", ValueType::Double));
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "Operator" => Some(Value::from(self.operator.symbol())),
            "A" => Some(Value::Double(self.a)),
            "B" => Some(Value::Double(self.b)),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "Operator" => match MathOperator::parse(&value.to_property_string()) {
                Some(operator) => {
                    self.operator = operator;
                    true
                }
                None => false,
            },
            "A" | "B" => match value.as_double() {
                Some(number) if name == "A" => {
                    self.a = number;
                    true
                }
                Some(number) => {
                    self.b = number;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}

impl ActionBehavior for Math {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let a = ctx.get_double("A").unwrap_or(self.a);
        let b = ctx.get_double("B").unwrap_or(self.b);
        if self.operator == MathOperator::Divide && b == 0.0 {
            tracing::warn!("Math node {} divided by zero", ctx.node_id());
        }
        ctx.set("Result", self.operator.apply(a, b));
        false
    }
}

/// Raises a remote event by name
#[derive(Debug, Default)]
pub struct CallRemoteEvent {
    event_name: String,
}

impl NodeBehavior for CallRemoteEvent {
    fn init(&self, links: &mut LinkSet) {
        links
            .value(ValueLink::new("Event Name", ValueType::String).input_only())
            .value(ValueLink::new("Instigator", ValueType::Actor).input_only());
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Event Name", ValueType::String));
    }

    fn property(&self, name: &str) -> Option<Value> {
        (name == "Event Name").then(|| Value::String(self.event_name.clone()))
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        if name != "Event Name" {
            return false;
        }
        self.event_name = value.to_property_string();
        true
    }
}

impl ActionBehavior for CallRemoteEvent {
    fn update(&mut self, ctx: &mut NodeContext<'_>) -> bool {
        let name = ctx.string_or("Event Name", &self.event_name);
        if name.is_empty() {
            tracing::warn!("Call Remote Event node {} has no event name", ctx.node_id());
            return false;
        }
        let instigator = ctx.get_actor("Instigator");
        ctx.raise_remote_event(&name, instigator);
        false
    }
}
