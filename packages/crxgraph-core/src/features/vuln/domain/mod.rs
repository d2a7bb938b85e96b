/*
 * Catalogs and finding records.
 *
 * The matching machinery is parameterized over these catalogs; swapping
 * them swaps the vulnerability classes, not the analysis.
 */

use serde::Serialize;

use crate::features::ast::Tree;
use crate::features::double_flow::DoubleDataFlow;
use crate::features::flow_graph::DataFlow;
use crate::shared::models::{JsVal, NodeId};

/// Privileged APIs whose results must not reach the renderer.
/// Prefix-matched against full call names: "chrome.cookies" catches
/// "chrome.cookies.getAll". indexedDB is called as indexedDB.open().
pub const DEFAULT_SENSITIVE_APIS: &[&str] = &[
    "chrome.cookies",
    "chrome.scripting",
    "chrome.tabs.executeScript",
    "browser.cookies",
    "browser.scripting",
    "browser.tabs.executeScript",
    "indexedDB",
    "fetch",
];

/// BP-side code-injection sinks (attacker data reaching one of these is
/// an infiltration danger).
pub const BP_INJECTION_SINKS: &[&str] = &[
    "chrome.tabs.executeScript",
    "chrome.scripting.executeScript",
    "chrome.scripting.insertCSS",
    "browser.tabs.executeScript",
    "browser.scripting.executeScript",
    "eval",
];

/// DOM properties whose assignment injects markup.
pub const DOM_INJECTION_SINK_PROPERTIES: &[&str] = &["innerHTML", "outerHTML", "srcdoc"];

/// Exactly named DOM-injection calls.
pub const DOM_INJECTION_SINK_CALLS: &[&str] = &["document.write", "document.writeln", "eval"];

/// Method-suffix DOM-injection calls (any receiver).
pub const DOM_INJECTION_SINK_CALL_SUFFIXES: &[&str] = &[".insertAdjacentHTML"];

/// BP message exits toward the renderer, beyond sendResponse.
pub const BP_MESSAGE_EXIT_SINKS: &[&str] =
    &["chrome.tabs.sendMessage", "browser.tabs.sendMessage"];

/// CS exits toward the page.
pub const CS_EXFILTRATION_SINK_SUFFIXES: &[&str] = &[".postMessage"];

/// Extension storage namespaces.
pub const STORAGE_API_PREFIXES: &[&str] = &["chrome.storage", "browser.storage"];

// ── finding records ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlowNodeRecord {
    pub no: usize,
    pub location: String,
    pub filename: String,
    pub identifier: String,
    pub line_of_code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RendezvousRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub filename: String,
    pub line_of_code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DangerRecord {
    /// Which catalog entry produced the from-flow ("chrome.cookies",
    /// "message", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub from_flow: Vec<FlowNodeRecord>,
    pub to_flow: Vec<FlowNodeRecord>,
    pub rendezvous: RendezvousRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_flow_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ViolationRecord {
    pub location: String,
    pub filename: String,
    pub line_of_code: String,
    pub listener: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StorageAccessRecord {
    pub api: String,
    pub call: String,
    pub location: String,
    pub filename: String,
    pub line_of_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<JsVal>,
}

/// Findings of one extension side.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SideFindings {
    pub exfiltration_dangers: Vec<DangerRecord>,
    pub infiltration_dangers: Vec<DangerRecord>,
    pub extension_storage_accesses: Vec<StorageAccessRecord>,
    #[serde(rename = "31_violations_without_sensitive_api_access")]
    pub violations_31_without_sensitive_api_access: Vec<ViolationRecord>,
}

pub fn flow_records(tree: &Tree, flow: &DataFlow) -> Vec<FlowNodeRecord> {
    flow.nodes()
        .iter()
        .enumerate()
        .map(|(i, &node)| FlowNodeRecord {
            no: i + 1,
            location: tree.location_string(node),
            filename: tree.filename().to_string(),
            identifier: tree
                .name(node)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("<{}>", tree.kind(node))),
            line_of_code: tree.line_of_code(node),
        })
        .collect()
}

pub fn rendezvous_record(tree: &Tree, rendezvous: NodeId) -> RendezvousRecord {
    RendezvousRecord {
        kind: tree.kind(rendezvous).as_str().to_string(),
        location: tree.location_string(rendezvous),
        filename: tree.filename().to_string(),
        line_of_code: tree.line_of_code(rendezvous),
    }
}

impl DangerRecord {
    pub fn from_double(tree: &Tree, double: &DoubleDataFlow, source: &str) -> DangerRecord {
        DangerRecord {
            source: Some(source.to_string()),
            from_flow: flow_records(tree, &double.from_flow),
            to_flow: flow_records(tree, &double.to_flow),
            rendezvous: rendezvous_record(tree, double.rendezvous),
            data_flow_number: double.data_flow_number.clone(),
        }
    }
}
