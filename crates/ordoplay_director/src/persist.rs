// SPDX-License-Identifier: MIT OR Apache-2.0
//! Script documents: saving and loading scripts as RON.
//!
//! A document mirrors the graph tree. Nodes store their type name, header
//! fields, writable properties as canonical strings, and their outgoing
//! links by target ID. Links are resolved after every node exists, so a
//! document may reference nodes in any order or graph.

use crate::error::DirectorError;
use crate::graph::GraphId;
use crate::node::{Node, NodeId, NodeRegistry, HEADER_PROPERTIES};
use crate::script::Script;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current script document format version
pub const SCRIPT_FORMAT_VERSION: u32 = 1;

/// File extension used for script documents
pub const SCRIPT_EXTENSION: &str = "dirscript";

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Serialized script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptDocument {
    /// Format version
    pub version: u32,
    /// Script name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Root graph
    pub root: GraphRecord,
}

/// Serialized graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Graph ID
    pub id: GraphId,
    /// Graph name
    pub name: String,
    /// Enabled flag
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Comment
    #[serde(default)]
    pub comment: String,
    /// Editor position
    #[serde(default)]
    pub position: [f32; 2],
    /// Nodes directly in this graph
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Nested graphs
    #[serde(default)]
    pub graphs: Vec<GraphRecord>,
}

/// Serialized node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node ID
    pub id: NodeId,
    /// Registered type name
    pub type_name: String,
    /// Display name
    pub name: String,
    /// Enabled flag
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Editor position
    #[serde(default)]
    pub position: [f32; 2],
    /// Comment
    #[serde(default)]
    pub comment: String,
    /// Authors
    #[serde(default)]
    pub authors: Vec<String>,
    /// Per-node logging
    #[serde(default)]
    pub logging: bool,
    /// Writable properties as canonical strings, in property order
    #[serde(default)]
    pub properties: IndexMap<String, String>,
    /// Outgoing flow links
    #[serde(default)]
    pub outputs: Vec<OutputRecord>,
    /// Value bindings
    #[serde(default)]
    pub values: Vec<ValueRecord>,
}

/// Serialized output link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Output name
    pub output: String,
    /// Whether threads cross synchronously
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub immediate: bool,
    /// Connected inputs
    #[serde(default)]
    pub targets: Vec<LinkTarget>,
}

/// Input at the other end of an output link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTarget {
    /// Target node
    pub node: NodeId,
    /// Target input name
    pub input: String,
}

/// Serialized value link bindings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRecord {
    /// Value link name
    pub link: String,
    /// Bound value nodes
    pub values: Vec<NodeId>,
}

/// What a load had to skip
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Node types named in the document but not registered
    pub missing_node_types: Vec<String>,
    /// Nodes skipped because their type is missing
    pub skipped_nodes: usize,
    /// Links that referenced unknown nodes or links
    pub unresolved_links: usize,
    /// Properties that were unknown or did not parse
    pub rejected_properties: usize,
}

impl LoadReport {
    /// Whether the document loaded without skipping anything
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl ScriptDocument {
    /// Capture a script
    pub fn from_script(script: &Script) -> Self {
        Self {
            version: SCRIPT_FORMAT_VERSION,
            name: script.name.clone(),
            description: script.description.clone(),
            root: graph_record(script, script.root()),
        }
    }

    /// Parse a RON document
    pub fn from_ron(text: &str) -> Result<Self, DirectorError> {
        let document: ScriptDocument = ron::from_str(text)?;
        if document.version > SCRIPT_FORMAT_VERSION {
            return Err(DirectorError::UnsupportedVersion {
                found: document.version,
                supported: SCRIPT_FORMAT_VERSION,
            });
        }
        Ok(document)
    }

    /// Write as pretty RON
    pub fn to_ron(&self) -> Result<String, DirectorError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Build a script, instantiating nodes through `registry`.
    ///
    /// Unknown node types, unknown properties and dangling links are
    /// skipped with a warning and counted in the report.
    pub fn instantiate(&self, registry: &NodeRegistry) -> Result<(Script, LoadReport), DirectorError> {
        let mut script = Script::with_root(self.name.clone(), self.root.id);
        script.description = self.description.clone();
        let mut report = LoadReport::default();

        apply_graph_header(&mut script, &self.root);
        load_nodes(&mut script, &self.root, registry, &mut report)?;
        load_links(&mut script, &self.root, &mut report);

        if !report.is_clean() {
            tracing::warn!(
                "Script '{}' loaded with {} missing types, {} unresolved links, {} rejected properties",
                self.name,
                report.missing_node_types.len(),
                report.unresolved_links,
                report.rejected_properties
            );
        }
        Ok((script, report))
    }
}

fn graph_record(script: &Script, id: GraphId) -> GraphRecord {
    let Some(graph) = script.graph(id) else {
        return GraphRecord {
            id,
            name: String::new(),
            enabled: true,
            comment: String::new(),
            position: [0.0, 0.0],
            nodes: Vec::new(),
            graphs: Vec::new(),
        };
    };
    GraphRecord {
        id,
        name: graph.name.clone(),
        enabled: graph.enabled,
        comment: graph.comment.clone(),
        position: graph.position,
        nodes: graph
            .node_ids()
            .filter_map(|node| script.node(node))
            .map(node_record)
            .collect(),
        graphs: graph.sub_graphs().map(|sub| graph_record(script, sub)).collect(),
    }
}

fn node_record(node: &Node) -> NodeRecord {
    let properties = node
        .properties()
        .iter()
        .filter(|def| !def.read_only && !HEADER_PROPERTIES.contains(&def.name.as_str()))
        .filter_map(|def| node.property_string(&def.name).map(|v| (def.name.clone(), v)))
        .collect();

    let outputs = node
        .outputs()
        .iter()
        .filter(|o| !o.targets().is_empty() || !o.immediate)
        .map(|o| OutputRecord {
            output: o.name.clone(),
            immediate: o.immediate,
            targets: o
                .targets()
                .iter()
                .map(|t| LinkTarget {
                    node: t.node,
                    input: t.input.clone(),
                })
                .collect(),
        })
        .collect();

    let values = node
        .value_links()
        .iter()
        .filter(|l| l.is_bound())
        .map(|l| ValueRecord {
            link: l.name.clone(),
            values: l.values().to_vec(),
        })
        .collect();

    NodeRecord {
        id: node.id(),
        type_name: node.type_name().to_string(),
        name: node.name.clone(),
        enabled: node.enabled,
        position: node.position,
        comment: node.comment.clone(),
        authors: node.authors.clone(),
        logging: node.logging,
        properties,
        outputs,
        values,
    }
}

fn apply_graph_header(script: &mut Script, record: &GraphRecord) {
    if let Some(graph) = script.graph_mut(record.id) {
        graph.name = record.name.clone();
        graph.enabled = record.enabled;
        graph.comment = record.comment.clone();
        graph.position = record.position;
    }
}

fn load_nodes(
    script: &mut Script,
    record: &GraphRecord,
    registry: &NodeRegistry,
    report: &mut LoadReport,
) -> Result<(), DirectorError> {
    for node_record in &record.nodes {
        let Some(node) = registry.create_node(&node_record.type_name, record.id) else {
            tracing::warn!(
                "Skipping node {} '{}': unknown node type '{}'",
                node_record.id,
                node_record.name,
                node_record.type_name
            );
            if !report.missing_node_types.contains(&node_record.type_name) {
                report.missing_node_types.push(node_record.type_name.clone());
            }
            report.skipped_nodes += 1;
            continue;
        };

        let mut node = node.with_id(node_record.id);
        node.name = node_record.name.clone();
        node.enabled = node_record.enabled;
        node.position = node_record.position;
        node.comment = node_record.comment.clone();
        node.authors = node_record.authors.clone();
        node.logging = node_record.logging;

        for (name, value) in &node_record.properties {
            if !node.set_property_string(name, value) {
                tracing::warn!("Node {} '{}': rejected property '{name}' = {value:?}", node_record.id, node.name);
                report.rejected_properties += 1;
            }
        }
        script.add_node(node)?;
    }

    for sub in &record.graphs {
        script.add_graph_with_id(record.id, sub.id, sub.name.clone())?;
        apply_graph_header(script, sub);
        load_nodes(script, sub, registry, report)?;
    }
    Ok(())
}

fn load_links(script: &mut Script, record: &GraphRecord, report: &mut LoadReport) {
    for node_record in &record.nodes {
        if script.node(node_record.id).is_none() {
            continue;
        }

        for output in &node_record.outputs {
            match script.node_mut(node_record.id).and_then(|n| n.output_mut(&output.output)) {
                Some(link) => link.immediate = output.immediate,
                None => {
                    tracing::warn!("Node {}: unknown output '{}'", node_record.id, output.output);
                    report.unresolved_links += output.targets.len();
                    continue;
                }
            }
            for target in &output.targets {
                if let Err(e) = script.connect(node_record.id, &output.output, target.node, &target.input) {
                    tracing::warn!("Node {}: dropping link '{}': {e}", node_record.id, output.output);
                    report.unresolved_links += 1;
                }
            }
        }

        for binding in &node_record.values {
            for value in &binding.values {
                if let Err(e) = script.bind_value(node_record.id, &binding.link, *value) {
                    tracing::warn!("Node {}: dropping value binding '{}': {e}", node_record.id, binding.link);
                    report.unresolved_links += 1;
                }
            }
        }
    }

    for sub in &record.graphs {
        load_links(script, sub, report);
    }
}

/// Serialize a script to a RON string
pub fn script_to_string(script: &Script) -> Result<String, DirectorError> {
    ScriptDocument::from_script(script).to_ron()
}

/// Parse a script from a RON string
pub fn script_from_str(text: &str, registry: &NodeRegistry) -> Result<(Script, LoadReport), DirectorError> {
    ScriptDocument::from_ron(text)?.instantiate(registry)
}

/// Save a script to a file
pub fn save_script(script: &Script, path: &Path) -> Result<(), DirectorError> {
    let content = script_to_string(script)?;
    std::fs::write(path, content)?;
    tracing::info!("Saved script '{}' to {}", script.name, path.display());
    Ok(())
}

/// Load a script from a file
pub fn load_script(path: &Path, registry: &NodeRegistry) -> Result<(Script, LoadReport), DirectorError> {
    let content = std::fs::read_to_string(path)?;
    let loaded = script_from_str(&content, registry)?;
    tracing::info!("Loaded script '{}' from {}", loaded.0.name, path.display());
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library;
    use crate::value::Value;

    fn sample(registry: &NodeRegistry) -> (Script, NodeId, NodeId, NodeId) {
        let mut script = Script::new("Sample");
        let root = script.root();
        let sub = script.add_graph(root, "Sub").expect("sub");
        let start = script.create_node(registry, "Start", root).expect("start");
        let delay = script.create_node(registry, "Delay", sub).expect("delay");
        let seconds = script.create_node(registry, "Float", root).expect("float");
        let names = script.create_node(registry, "String Array", sub).expect("array");

        script.connect(start, "Out", delay, "Start").expect("connect");
        script.bind_value(delay, "Delay", seconds).expect("bind");
        if let Some(node) = script.node_mut(seconds) {
            assert!(node.set_property_string("Value", "2.5"));
        }
        if let Some(node) = script.node_mut(names) {
            node.set_property_string("Max Size", "4");
            let text = crate::codec::encode_tokens(["alpha", "beta gamma"]);
            assert!(node.set_property_string("Value", &text));
        }
        if let Some(node) = script.node_mut(delay) {
            node.logging = true;
            node.authors.push("design".to_string());
        }
        (script, start, delay, names)
    }

    #[test]
    fn test_document_preserves_structure() {
        let registry = library::create_default_registry();
        let (script, start, delay, names) = sample(&registry);

        let text = script_to_string(&script).expect("save");
        let (loaded, report) = script_from_str(&text, &registry).expect("load");
        assert!(report.is_clean(), "{report:?}");

        assert_eq!(loaded.root(), script.root());
        assert_eq!(loaded.node_count(), script.node_count());
        let targets = loaded.node(start).and_then(|n| n.output("Out")).map(|l| l.targets().to_vec());
        assert_eq!(targets.map(|t| t[0].node), Some(delay));
        assert_eq!(loaded.link_value_at(delay, "Delay", 0), Some(Value::Float(2.5)));
        assert!(loaded.node(delay).is_some_and(|n| n.logging && n.authors == ["design"]));

        let array = loaded.node(names).and_then(|n| n.as_array()).map(|a| a.elements().to_vec());
        assert_eq!(array, Some(vec![Value::from("alpha"), Value::from("beta gamma")]));
        assert_eq!(loaded.node(names).and_then(|n| n.as_array()).map(|a| a.max_size()), Some(4));
    }

    #[test]
    fn test_array_default_survives_round_trip() {
        let registry = library::create_default_registry();
        let mut script = Script::new("Arrays");
        let root = script.root();
        let array = script.create_node(&registry, "Int Array", root).expect("array");
        let text = crate::codec::encode_tokens(["1", "2", "3"]);
        if let Some(node) = script.node_mut(array) {
            assert!(node.set_property_string("Initial Value", &text));
            assert!(node.set_property_string("Value", &text));
        }

        let (mut loaded, _) = script_from_str(&script_to_string(&script).expect("save"), &registry).expect("load");
        assert!(loaded.node(array).and_then(|n| n.as_array()).is_some_and(|a| a.is_default()));

        if let Some(values) = loaded.node_mut(array).and_then(|n| n.as_array_mut()) {
            assert!(values.set_element(1, &Value::Int(5)));
        }
        let (reloaded, _) = script_from_str(&script_to_string(&loaded).expect("save"), &registry).expect("load");
        let reloaded_array = reloaded.node(array).and_then(|n| n.as_array()).expect("array node");
        assert!(!reloaded_array.is_default());
        assert_eq!(reloaded_array.elements(), &[Value::Int(1), Value::Int(5), Value::Int(3)]);

        let mut reset = reloaded_array.clone();
        reset.reset();
        let once = reset.elements().to_vec();
        reset.reset();
        assert_eq!(reset.elements(), once.as_slice());
        assert!(reset.is_default());
    }

    #[test]
    fn test_unknown_types_are_reported() {
        let registry = library::create_default_registry();
        let (script, start, delay, _) = sample(&registry);
        let text = script_to_string(&script).expect("save");

        let mut partial = NodeRegistry::new();
        for node_type in registry.types().filter(|t| t.id != "Delay") {
            partial.register(node_type.clone());
        }

        let (loaded, report) = script_from_str(&text, &partial).expect("load");
        assert_eq!(report.missing_node_types, vec!["Delay".to_string()]);
        assert_eq!(report.skipped_nodes, 1);
        assert_eq!(report.unresolved_links, 1);
        assert!(loaded.node(delay).is_none());
        assert!(loaded.node(start).is_some());
    }

    #[test]
    fn test_newer_version_rejected() {
        let registry = library::create_default_registry();
        let (script, ..) = sample(&registry);
        let mut document = ScriptDocument::from_script(&script);
        document.version = SCRIPT_FORMAT_VERSION + 1;
        let text = document.to_ron().expect("save");
        assert!(matches!(
            script_from_str(&text, &registry),
            Err(DirectorError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let registry = library::create_default_registry();
        let (script, ..) = sample(&registry);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(format!("sample.{SCRIPT_EXTENSION}"));

        save_script(&script, &path).expect("save");
        let (loaded, report) = load_script(&path, &registry).expect("load");
        assert!(report.is_clean());
        assert_eq!(loaded.name, "Sample");
        assert_eq!(loaded.graphs().count(), 2);
    }
}
