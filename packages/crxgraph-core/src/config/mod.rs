//! Analysis configuration.
//!
//! One flat options struct; the CLI maps its flags onto this, library
//! users fill it directly. Defaults reproduce the standard
//! renderer-attacker analysis.

use serde::{Deserialize, Serialize};

use crate::features::flow_graph::FlowStrategy;

/// `sourceType` handed to the external parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Script,
    Module,
    CommonJs,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Script => "script",
            SourceType::Module => "module",
            SourceType::CommonJs => "commonjs",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Which of the seven flow-enumeration strategies to use.
    pub data_flows_considered: FlowStrategy,
    /// Emit every matching flow pair instead of the first per query.
    pub return_multiple_flow_variants: bool,
    /// Keep flows even past a correct sender-origin check.
    pub return_safe_flows_verified: bool,
    /// Keep UXSS flows even past a correct sanitizer.
    pub return_safe_flows_sanitized: bool,
    /// Treat http:// origin checks as authenticating (by default only
    /// https:// counts; http is forgeable by a renderer+network
    /// attacker).
    pub consider_http_as_safe: bool,
    /// Report Sec. Req. 3.1 violations even absent privileged-API use.
    pub include_31_violations_without_privileged_api_access: bool,
    /// Only analyze extensions whose content script is injected into an
    /// all-URLs host pattern (the renderer-attacker precondition).
    pub only_when_content_script_injected_everywhere: bool,
    /// Only collect extension-storage accesses; skip the
    /// exfiltration/infiltration rules.
    pub ext_storage_accesses_only: bool,
    /// Drop UXSS flow pairs that pass a correct sanitizer.
    pub check_for_uxss_sanitization: bool,
    pub ignore_cs_initiated_messaging: bool,
    pub ignore_bp_initiated_messaging: bool,
    pub ignore_cs: bool,
    pub ignore_bp: bool,
    pub ignore_message_related_vuln: bool,
    pub ignore_storage_related_vuln: bool,
    pub ignore_exfiltration_dangers: bool,
    pub ignore_infiltration_dangers: bool,
    /// Sensitive-source catalog entries to drop (e.g. "indexedDB").
    pub ignored_sources: Vec<String>,
    /// Per-script wall-clock budget in seconds.
    pub timeout_secs: u64,
    /// Generate all data-flow edges eagerly up front (slow; enables the
    /// pre-analysis pruning pass).
    pub eager_df_gen: bool,
    /// External parser command producing ESTree JSON on stdout
    /// (invoked as `<cmd> <file> <sourceType>`). Inputs ending in
    /// `.json` bypass the parser.
    pub parser_cmd: Option<String>,
    pub source_type: SourceType,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            data_flows_considered: FlowStrategy::default(),
            return_multiple_flow_variants: false,
            return_safe_flows_verified: false,
            return_safe_flows_sanitized: false,
            consider_http_as_safe: false,
            include_31_violations_without_privileged_api_access: false,
            only_when_content_script_injected_everywhere: false,
            ext_storage_accesses_only: false,
            check_for_uxss_sanitization: false,
            ignore_cs_initiated_messaging: false,
            ignore_bp_initiated_messaging: false,
            ignore_cs: false,
            ignore_bp: false,
            ignore_message_related_vuln: false,
            ignore_storage_related_vuln: false,
            ignore_exfiltration_dangers: false,
            ignore_infiltration_dangers: false,
            ignored_sources: Vec::new(),
            timeout_secs: 600,
            eager_df_gen: false,
            parser_cmd: None,
            source_type: SourceType::Module,
        }
    }
}

impl AnalysisConfig {
    /// The sensitive-API catalog minus the ignored sources.
    pub fn sensitive_apis(&self) -> Vec<&'static str> {
        crate::features::vuln::domain::DEFAULT_SENSITIVE_APIS
            .iter()
            .copied()
            .filter(|api| {
                !self
                    .ignored_sources
                    .iter()
                    .any(|ignored| api.starts_with(ignored.as_str()))
            })
            .collect()
    }
}
