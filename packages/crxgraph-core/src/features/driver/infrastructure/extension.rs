/*
 * Per-extension orchestration.
 *
 * Each side (bp, cs) parses, annotates and analyzes independently under
 * its own wall-clock deadline; a crash on one side (parse failure,
 * deadline) never silences the other. Partial results of a crashed side
 * are discarded, the crash is recorded, the worker moves on.
 */

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::ast::Tree;
use crate::features::data_flow;
use crate::features::vuln::infrastructure::rules::{self, Side};
use crate::features::vuln::SideFindings;
use crate::shared::deadline::Deadline;

use super::manifest::Manifest;
use super::parser_cmd;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtensionInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub manifest_version: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CodeStats {
    pub loc: usize,
    pub nodes: usize,
    pub identifiers: usize,
    pub literals: usize,
    pub data_flow_edges: usize,
    pub control_flow_edges: usize,
    pub average_identifier_length: f64,
    pub one_character_identifier_percentage: u32,
}

impl CodeStats {
    fn of(tree: &Tree) -> CodeStats {
        use crate::features::ast::domain::NodeKind;
        CodeStats {
            loc: tree.source_line_count(),
            nodes: tree.len(),
            identifiers: tree.nodes_of_kind(NodeKind::Identifier).count(),
            literals: tree.nodes_of_kind(NodeKind::Literal).count(),
            data_flow_edges: tree.data_edge_count(),
            control_flow_edges: tree.control_edge_count(),
            average_identifier_length: tree.average_identifier_length(),
            one_character_identifier_percentage: tree.one_character_identifier_percentage(),
        }
    }
}

/// The structured result document for one extension.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FindingDocument {
    pub extension: ExtensionInfo,
    pub content_script_injected_into: Vec<String>,
    pub bp: SideFindings,
    pub cs: SideFindings,
    pub code_stats: BTreeMap<String, CodeStats>,
    /// per-phase wall-clock seconds
    pub benchmarks: BTreeMap<String, f64>,
    pub crashes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub generated_at: String,
}

impl FindingDocument {
    pub fn total_danger_count(&self) -> usize {
        self.bp.exfiltration_dangers.len()
            + self.bp.infiltration_dangers.len()
            + self.cs.exfiltration_dangers.len()
            + self.cs.infiltration_dangers.len()
    }
}

/// Prepared per-side inputs. Trees may come from the external parser,
/// pre-parsed documents, or the builder (tests).
pub struct ExtensionInput {
    pub bp_tree: Option<Result<Tree>>,
    pub cs_tree: Option<Result<Tree>>,
    pub manifest: Option<Result<Manifest>>,
}

/// Analyze one extension from prepared inputs.
pub fn analyze_extension(input: ExtensionInput, config: &AnalysisConfig) -> FindingDocument {
    let mut doc = FindingDocument {
        generated_at: chrono::Utc::now().to_rfc3339(),
        ..FindingDocument::default()
    };

    match input.manifest {
        Some(Ok(manifest)) => {
            doc.extension = ExtensionInfo {
                name: manifest.name.clone(),
                version: manifest.version.clone(),
                manifest_version: Some(manifest.manifest_version),
                description: manifest.description.clone(),
            };
            doc.content_script_injected_into = manifest.content_script_matches();
            if config.only_when_content_script_injected_everywhere
                && !manifest.content_script_injected_everywhere()
            {
                doc.skipped = Some(
                    "no content script is injected everywhere; a renderer attacker \
                     cannot act as one of this extension's content scripts"
                        .to_string(),
                );
                return doc;
            }
        }
        Some(Err(e)) => doc.crashes.push(format!("manifest: {}", e)),
        None => {}
    }

    if !config.ignore_bp {
        analyze_script_side(input.bp_tree, Side::Bp, config, &mut doc);
    }
    if !config.ignore_cs {
        analyze_script_side(input.cs_tree, Side::Cs, config, &mut doc);
    }
    doc
}

/// Analyze one extension from files on disk. Multiple scripts per side
/// are concatenated (demarcated by comment banners) into one logical
/// unit before parsing.
pub fn analyze_extension_paths(
    cs: Option<&Path>,
    bp: Option<&Path>,
    manifest: Option<&Path>,
    config: &AnalysisConfig,
) -> FindingDocument {
    let load_side = |path: Option<&Path>, fallback: &str| -> Option<Result<Tree>> {
        match path {
            Some(p) => Some(parser_cmd::parse_script_file(p, config)),
            None => Some(Ok(parser_cmd::empty_script_tree(fallback))),
        }
    };
    let input = ExtensionInput {
        bp_tree: load_side(bp, "background.js"),
        cs_tree: load_side(cs, "contentscript.js"),
        manifest: manifest.map(|p| {
            std::fs::read_to_string(p)
                .map_err(crate::errors::CrxError::from)
                .and_then(|json| Manifest::parse(&json))
        }),
    };
    analyze_extension(input, config)
}

/// Concatenate several script sources into one logical unit.
pub fn concatenate_scripts(sources: &[(String, String)]) -> String {
    let mut out = String::new();
    for (name, source) in sources {
        out.push_str(&format!("// ===== {} =====\n", name));
        out.push_str(source);
        out.push('\n');
    }
    out
}

fn analyze_script_side(
    tree: Option<Result<Tree>>,
    side: Side,
    config: &AnalysisConfig,
    doc: &mut FindingDocument,
) {
    let tree = match tree {
        None => return,
        Some(Err(e)) => {
            doc.crashes.push(format!("{}: {}", side.as_str(), e));
            return;
        }
        Some(Ok(tree)) => tree,
    };
    if tree.is_parsing_error() {
        doc.crashes
            .push(format!("{}: script could not be parsed", side.as_str()));
        return;
    }

    let deadline = Deadline::after_secs(config.timeout_secs);
    if config.eager_df_gen {
        let t0 = Instant::now();
        let added = data_flow::infrastructure::dep::generate_all_edges(&tree);
        let pruned = data_flow::prune_incorrect_edges(&tree);
        tracing::debug!(side = side.as_str(), added, pruned, "eager edge generation");
        doc.benchmarks.insert(
            format!("{}: edge generation", side.as_str()),
            t0.elapsed().as_secs_f64(),
        );
    }

    let t0 = Instant::now();
    match rules::analyze_side(&tree, side, config, &deadline) {
        Ok(findings) => {
            match side {
                Side::Bp => doc.bp = findings,
                Side::Cs => doc.cs = findings,
            }
            doc.benchmarks.insert(
                format!("{}: analysis", side.as_str()),
                t0.elapsed().as_secs_f64(),
            );
            doc.code_stats
                .insert(side.as_str().to_string(), CodeStats::of(&tree));
        }
        Err(e) => {
            // partial results are discarded, the crash marker remains
            tracing::warn!(side = side.as_str(), error = %e, "side analysis crashed");
            doc.crashes.push(format!("{}: {}", side.as_str(), e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::estree;
    use pretty_assertions::assert_eq;

    fn tree_of(doc: serde_json::Value, filename: &str) -> Tree {
        estree::load_document(&doc, filename, None).unwrap()
    }

    #[test]
    fn test_parse_error_marks_crash_but_other_side_runs() {
        let bp = tree_of(b::parsing_error("unexpected token"), "bp.js");
        let cs = tree_of(b::program(vec![]), "cs.js");
        let doc = analyze_extension(
            ExtensionInput {
                bp_tree: Some(Ok(bp)),
                cs_tree: Some(Ok(cs)),
                manifest: None,
            },
            &AnalysisConfig::default(),
        );
        assert_eq!(doc.crashes.len(), 1);
        assert!(doc.crashes[0].starts_with("bp:"));
        // the cs side still produced stats
        assert!(doc.code_stats.contains_key("cs"));
        assert!(!doc.code_stats.contains_key("bp"));
    }

    #[test]
    fn test_injected_everywhere_gate() {
        let manifest = Manifest::parse(
            r#"{
                "manifest_version": 3,
                "content_scripts": [{"matches": ["https://example.com/*"], "js": ["cs.js"]}]
            }"#,
        );
        let config = AnalysisConfig {
            only_when_content_script_injected_everywhere: true,
            ..AnalysisConfig::default()
        };
        let doc = analyze_extension(
            ExtensionInput {
                bp_tree: Some(Ok(tree_of(b::program(vec![]), "bp.js"))),
                cs_tree: Some(Ok(tree_of(b::program(vec![]), "cs.js"))),
                manifest: Some(manifest),
            },
            &config,
        );
        assert!(doc.skipped.is_some());
        assert!(doc.code_stats.is_empty());
    }

    #[test]
    fn test_code_stats_recorded() {
        let bp = tree_of(
            b::program(vec![b::let_decl("x", b::lit_int(1))]),
            "bp.js",
        );
        let doc = analyze_extension(
            ExtensionInput {
                bp_tree: Some(Ok(bp)),
                cs_tree: None,
                manifest: None,
            },
            &AnalysisConfig::default(),
        );
        let stats = &doc.code_stats["bp"];
        assert_eq!(stats.identifiers, 1);
        assert_eq!(stats.literals, 1);
    }

    #[test]
    fn test_concatenate_scripts_demarcates() {
        let joined = concatenate_scripts(&[
            ("a.js".to_string(), "let a = 1;".to_string()),
            ("b.js".to_string(), "let b = 2;".to_string()),
        ]);
        assert!(joined.contains("// ===== a.js ====="));
        assert!(joined.contains("// ===== b.js ====="));
    }
}
