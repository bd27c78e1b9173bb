// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph-based behavior scripting runtime for `OrdoPlay`.
//!
//! Scripts are trees of graphs holding three kinds of nodes:
//! - Event nodes that start execution threads
//! - Action nodes that threads walk through, one update at a time
//! - Value nodes that hold typed data read and written through value links
//!
//! ## Architecture
//!
//! A [`Script`] owns every graph and node in an arena keyed by ID. Links
//! refer to nodes by ID, never by pointer. The [`Engine`] owns a script and
//! advances its [`ExecutionThread`]s once per frame; immediate links let a
//! thread cross several nodes within the same frame.
//!
//! Node types are registered in a [`NodeRegistry`]. The built-in library
//! (see [`library::create_default_registry`]) covers events, flow control,
//! math, arrays and sub-graph ports. Scripts persist as RON documents
//! ([`persist`]) and running engines can be snapshotted ([`snapshot`]).

pub mod behavior;
pub mod codec;
pub mod config;
pub mod context;
pub mod dataflow;
pub mod engine;
pub mod error;
pub mod graph;
pub mod library;
pub mod link;
pub mod node;
pub mod observer;
pub mod persist;
pub mod property;
pub mod script;
pub mod snapshot;
pub mod thread;
pub mod value;
pub mod value_node;

pub use behavior::{ActionBehavior, EventBehavior, NodeBehavior, PortRole};
pub use config::EngineConfig;
pub use context::NodeContext;
pub use engine::{Engine, EngineStatus, TriggerOutcome};
pub use error::DirectorError;
pub use graph::{Graph, GraphId};
pub use link::{ConnectionError, InputLink, LinkSet, OutputLink, ValueLink};
pub use node::{Node, NodeBody, NodeCategory, NodeId, NodeKind, NodeRegistry, NodeType};
pub use observer::{ExecutionObserver, ExecutionPhase, ExecutionRecord, ExecutionRecorder};
pub use persist::{load_script, save_script, LoadReport, ScriptDocument};
pub use property::{PropertyBinding, PropertyDef, PropertyMap};
pub use script::Script;
pub use snapshot::EngineState;
pub use thread::{ExecutionThread, ThreadId, ThreadState};
pub use value::{ActorId, Value, ValueType};
pub use value_node::{ArrayValueNode, ValueNode, ValueRole};
