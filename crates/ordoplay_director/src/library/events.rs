// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event nodes: where threads come from.

use crate::behavior::{EventBehavior, NodeBehavior};
use crate::context::NodeContext;
use crate::link::{LinkSet, ValueLink, DEFAULT_OUTPUT};
use crate::node::{NodeBody, NodeCategory, NodeRegistry, NodeType};
use crate::property::{PropertyDef, PropertyMap};
use crate::value::{Value, ValueType};

/// Register the event node types
pub fn register(registry: &mut NodeRegistry) {
    registry.register(NodeType::new(
        "Start",
        NodeCategory::Event,
        "Fires once when the script starts",
        || NodeBody::event(StartEvent),
    ));
    registry.register(NodeType::new(
        "Tick",
        NodeCategory::Event,
        "Fires every frame and writes the frame delta",
        || NodeBody::event(TickEvent),
    ));
    registry.register(NodeType::new(
        "Remote Event",
        NodeCategory::Event,
        "Fires when a remote event with a matching name is raised",
        || NodeBody::event(RemoteEvent::default()),
    ));
    registry.register(NodeType::new(
        "Value Changed",
        NodeCategory::Event,
        "Fires when a bound value changes",
        || NodeBody::event(ValueChangedEvent),
    ));
}

/// Fires when the engine starts
#[derive(Debug, Default)]
pub struct StartEvent;

impl NodeBehavior for StartEvent {
    fn on_start(&mut self, ctx: &mut NodeContext<'_>) {
        ctx.fire(DEFAULT_OUTPUT, None);
    }
}

impl EventBehavior for StartEvent {}

/// Fires every frame
#[derive(Debug, Default)]
pub struct TickEvent;

impl NodeBehavior for TickEvent {
    fn init(&self, links: &mut LinkSet) {
        links.value(ValueLink::new("Delta", ValueType::Float).output().multiple());
    }

    fn wants_tick(&self) -> bool {
        true
    }

    fn tick(&mut self, ctx: &mut NodeContext<'_>) {
        let delta = ctx.sim_delta();
        ctx.set("Delta", delta);
        ctx.fire(DEFAULT_OUTPUT, None);
    }
}

impl EventBehavior for TickEvent {}

/// Named event raised by hosts or by "Call Remote Event" nodes.
///
/// When instigators are bound, only a matching instigator fires the node.
#[derive(Debug, Default)]
pub struct RemoteEvent {
    event_name: String,
}

impl RemoteEvent {
    /// Event listening for `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            event_name: name.into(),
        }
    }
}

impl NodeBehavior for RemoteEvent {
    fn init(&self, links: &mut LinkSet) {
        links.value(
            ValueLink::new("Instigator", ValueType::Actor)
                .input_only()
                .multiple()
                .per_element(),
        );
    }

    fn build_property_map(&self, map: &mut PropertyMap) {
        map.add(PropertyDef::new("Event Name", ValueType::String).description("Name this event responds to"));
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

impl EventBehavior for RemoteEvent {
    fn listens_for(&self, event: &str) -> bool {
        !self.event_name.is_empty() && self.event_name == event
    }
}

/// Fires whenever a value bound to its "Value" link changes
#[derive(Debug, Default)]
pub struct ValueChangedEvent;

impl NodeBehavior for ValueChangedEvent {
    fn init(&self, links: &mut LinkSet) {
        links.value(ValueLink::new("Value", ValueType::Any).input_only().multiple().per_element());
    }

    fn on_link_value_changed(&mut self, link: &str, ctx: &mut NodeContext<'_>) {
        if link == "Value" {
            ctx.fire(DEFAULT_OUTPUT, None);
        }
    }
}

impl EventBehavior for ValueChangedEvent {}
