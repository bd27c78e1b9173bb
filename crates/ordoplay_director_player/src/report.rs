// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-of-run report: engine status and the final value table.

use crate::config::ReportFormat;
use crate::error::PlayerError;
use ordoplay_director::{Engine, NodeKind};
use serde::Serialize;
use std::fmt::Write;

/// Final contents of one value node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueEntry {
    /// Node ID
    pub node: String,
    /// Node name
    pub name: String,
    /// Node type
    pub type_name: String,
    /// Value in display form
    pub value: String,
}

/// Summary of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Script name
    pub script: String,
    /// Engine frames run
    pub frames: u64,
    /// Simulation seconds elapsed
    pub elapsed_time: f64,
    /// Scheduled triggers raised
    pub triggers_raised: usize,
    /// Triggers that did not fire
    pub refused_triggers: u32,
    /// Threads aborted as runaway loops
    pub runaway_aborts: u32,
    /// Threads still live at the end
    pub active_threads: usize,
    /// Value nodes in graph order
    pub values: Vec<ValueEntry>,
}

impl Report {
    /// Gather the report from a finished engine
    pub fn collect(engine: &Engine, elapsed_time: f64, triggers_raised: usize) -> Self {
        let script = engine.script();
        let values = script
            .ordered_nodes()
            .into_iter()
            .filter_map(|id| script.node(id))
            .filter_map(|node| {
                let value = match node.kind() {
                    NodeKind::Value => node.as_value()?.value().to_property_string(),
                    NodeKind::ArrayValue => {
                        let elements: Vec<String> = node
                            .as_array()?
                            .elements()
                            .iter()
                            .map(|v| v.to_property_string())
                            .collect();
                        format!("[{}]", elements.join(", "))
                    }
                    NodeKind::Event | NodeKind::Action => return None,
                };
                Some(ValueEntry {
                    node: node.id().to_string(),
                    name: node.name.clone(),
                    type_name: node.type_name().to_string(),
                    value,
                })
            })
            .collect();

        let status = engine.status();
        Self {
            script: script.name.clone(),
            frames: engine.frame(),
            elapsed_time,
            triggers_raised,
            refused_triggers: status.refused_triggers,
            runaway_aborts: status.runaway_aborts,
            active_threads: engine.active_thread_count(),
            values,
        }
    }

    /// Look up a value by node name
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value.as_str())
    }

    /// Render in the requested format
    pub fn render(&self, format: ReportFormat) -> Result<String, PlayerError> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ReportFormat::Text => Ok(self.to_text()),
        }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Script '{}'", self.script);
        let _ = writeln!(out, "  frames:           {}", self.frames);
        let _ = writeln!(out, "  elapsed:          {:.3}s", self.elapsed_time);
        let _ = writeln!(out, "  triggers raised:  {}", self.triggers_raised);
        let _ = writeln!(out, "  refused triggers: {}", self.refused_triggers);
        let _ = writeln!(out, "  runaway aborts:   {}", self.runaway_aborts);
        let _ = writeln!(out, "  live threads:     {}", self.active_threads);

        if self.values.is_empty() {
            return out;
        }
        let name_width = self.values.iter().map(|v| v.name.len()).max().unwrap_or(0);
        let type_width = self.values.iter().map(|v| v.type_name.len()).max().unwrap_or(0);
        let _ = writeln!(out, "Values:");
        for entry in &self.values {
            let _ = writeln!(
                out,
                "  {:name_width$}  {:type_width$}  {}",
                entry.name, entry.type_name, entry.value
            );
        }
        out
    }
}
