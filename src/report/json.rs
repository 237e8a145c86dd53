//! JSON report renderer

use crate::identify::FormatIdentification;
use crate::source::{Message, ModuleRecord, Property, SourceId};
use crate::store::Accessor;
use crate::FathomResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Top-level report envelope.
#[derive(Debug, Serialize)]
pub struct ReportDocument {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub engine: &'static str,
    pub engine_version: &'static str,
    pub root: SourceNode,
}

/// One source node, with modules resolved inline.
#[derive(Debug, Serialize)]
pub struct SourceNode {
    pub id: SourceId,
    pub kind: String,
    pub name: String,
    pub formats: Vec<FormatIdentification>,
    pub modules: Vec<ModuleNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SourceNode>,
}

#[derive(Debug, Serialize)]
pub struct ModuleNode {
    pub name: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity: Option<crate::dispatch::Validity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<i64>,
}

impl From<ModuleRecord> for ModuleNode {
    fn from(record: ModuleRecord) -> Self {
        Self {
            name: record.name,
            version: record.version,
            validity: record.validity,
            elapsed_ms: record.timer.duration_ms(),
        }
    }
}

pub fn render(store: &dyn Accessor, root: SourceId) -> FathomResult<String> {
    let document = ReportDocument {
        report_id: uuid::Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        engine: "fathom",
        engine_version: env!("CARGO_PKG_VERSION"),
        root: build_node(store, root)?,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

fn build_node(store: &dyn Accessor, id: SourceId) -> FathomResult<SourceNode> {
    let record = store.retrieve_source(id)?;
    let mut modules = Vec::with_capacity(record.modules.len());
    for &module_id in &record.modules {
        modules.push(ModuleNode::from(store.retrieve_module(module_id)?));
    }
    let mut children = Vec::with_capacity(record.children.len());
    for &child in &record.children {
        children.push(build_node(store, child)?);
    }
    Ok(SourceNode {
        id,
        kind: record.kind.label().to_string(),
        name: record.kind.display_name(),
        formats: record.formats.iter().cloned().collect(),
        modules,
        messages: record.messages.clone(),
        properties: record.properties.clone(),
        elapsed_ms: record.timer.duration_ms(),
        children,
    })
}
