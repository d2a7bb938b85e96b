//! crxgraph CLI
//!
//! Two modes:
//!
//! ```bash
//! # single unpacked extension
//! crxgraph analyze --cs cs.js --bp bp.js --manifest manifest.json \
//!     --output analysis_renderer_attacker.json --parser-cmd espree-json
//!
//! # a directory of unpacked extensions, analyzed in parallel
//! crxgraph batch --dir unpacked/ --parallelize 8 --timeout 600 \
//!     --csv-out result.csv --parser-cmd espree-json
//! ```
//!
//! Exit code 0 on clean completion; non-zero on unrecoverable
//! configuration errors. Progress goes to stdout, finding documents to
//! disk.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;

use crxgraph_core::config::{AnalysisConfig, SourceType};
use crxgraph_core::errors::{CrxError, Result};
use crxgraph_core::features::driver::infrastructure::extension::{
    analyze_extension, analyze_extension_paths, concatenate_scripts, ExtensionInput,
    FindingDocument,
};
use crxgraph_core::features::driver::infrastructure::parser_cmd;
use crxgraph_core::features::driver::Manifest;
use crxgraph_core::FlowStrategy;

#[derive(Parser)]
#[command(name = "crxgraph")]
#[command(about = "Static taint analysis of browser extensions (renderer-attacker model)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single unpacked extension
    Analyze {
        /// Path of the content script (.js, or pre-parsed .json)
        #[arg(long)]
        cs: Option<PathBuf>,

        /// Path of the background page / service worker
        #[arg(long)]
        bp: Option<PathBuf>,

        /// Path of the manifest.json
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Path of the JSON finding document to write (stdout if absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: AnalysisOptions,
    },

    /// Analyze every unpacked extension below a directory
    Batch {
        /// Directory containing unpacked extensions (one manifest.json
        /// per extension directory)
        #[arg(long)]
        dir: PathBuf,

        /// Number of extensions analyzed in parallel
        /// (default: CPU count / 2)
        #[arg(long)]
        parallelize: Option<usize>,

        /// Path of a CSV summary to write
        #[arg(long)]
        csv_out: Option<PathBuf>,

        /// Name of the per-extension output file
        #[arg(long, default_value = "analysis_renderer_attacker.json")]
        outfile_name: String,

        #[command(flatten)]
        options: AnalysisOptions,
    },
}

#[derive(Args)]
struct AnalysisOptions {
    /// External parser command producing ESTree JSON on stdout
    #[arg(long)]
    parser_cmd: Option<String>,

    /// sourceType for the parser: script | module | commonjs
    #[arg(long, default_value = "module")]
    src_type: String,

    /// Flow enumeration strategy (e.g. ONE_PER_NODE_SHORTEST, ALL, ...)
    #[arg(long, default_value = "ONE_PER_NODE_SHORTEST")]
    data_flows_considered: String,

    /// Per-script analysis budget in seconds
    #[arg(long, default_value = "600")]
    timeout: u64,

    #[arg(long)]
    return_multiple_flow_variants: bool,

    #[arg(long)]
    return_safe_flows_verified: bool,

    #[arg(long)]
    return_safe_flows_sanitized: bool,

    #[arg(long)]
    consider_http_as_safe: bool,

    #[arg(long)]
    include_31_violations_without_privileged_api_access: bool,

    #[arg(long)]
    only_when_content_script_injected_everywhere: bool,

    #[arg(long)]
    ext_storage_accesses_only: bool,

    #[arg(long)]
    check_for_uxss_sanitization: bool,

    #[arg(long)]
    ignore_cs_initiated_messaging: bool,

    #[arg(long)]
    ignore_bp_initiated_messaging: bool,

    #[arg(long)]
    ignore_cs: bool,

    #[arg(long)]
    ignore_bp: bool,

    #[arg(long)]
    ignore_message_related_vuln: bool,

    #[arg(long)]
    ignore_storage_related_vuln: bool,

    #[arg(long)]
    ignore_exfiltration_dangers: bool,

    #[arg(long)]
    ignore_infiltration_dangers: bool,

    /// Sensitive sources to drop from the catalog (repeatable),
    /// e.g. --ignore-source indexedDB
    #[arg(long = "ignore-source")]
    ignore_sources: Vec<String>,

    /// Generate all data-flow edges eagerly up front (slow)
    #[arg(long)]
    eager_df_gen: bool,
}

impl AnalysisOptions {
    fn to_config(&self) -> Result<AnalysisConfig> {
        let strategy = FlowStrategy::from_cli_name(&self.data_flows_considered)
            .ok_or_else(|| {
                CrxError::config(format!(
                    "unknown --data-flows-considered value: {}",
                    self.data_flows_considered
                ))
            })?;
        let source_type = match self.src_type.as_str() {
            "script" => SourceType::Script,
            "module" => SourceType::Module,
            "commonjs" => SourceType::CommonJs,
            other => {
                return Err(CrxError::config(format!("unknown --src-type: {}", other)));
            }
        };
        Ok(AnalysisConfig {
            data_flows_considered: strategy,
            return_multiple_flow_variants: self.return_multiple_flow_variants,
            return_safe_flows_verified: self.return_safe_flows_verified,
            return_safe_flows_sanitized: self.return_safe_flows_sanitized,
            consider_http_as_safe: self.consider_http_as_safe,
            include_31_violations_without_privileged_api_access: self
                .include_31_violations_without_privileged_api_access,
            only_when_content_script_injected_everywhere: self
                .only_when_content_script_injected_everywhere,
            ext_storage_accesses_only: self.ext_storage_accesses_only,
            check_for_uxss_sanitization: self.check_for_uxss_sanitization,
            ignore_cs_initiated_messaging: self.ignore_cs_initiated_messaging,
            ignore_bp_initiated_messaging: self.ignore_bp_initiated_messaging,
            ignore_cs: self.ignore_cs,
            ignore_bp: self.ignore_bp,
            ignore_message_related_vuln: self.ignore_message_related_vuln,
            ignore_storage_related_vuln: self.ignore_storage_related_vuln,
            ignore_exfiltration_dangers: self.ignore_exfiltration_dangers,
            ignore_infiltration_dangers: self.ignore_infiltration_dangers,
            ignored_sources: self.ignore_sources.clone(),
            timeout_secs: self.timeout,
            eager_df_gen: self.eager_df_gen,
            parser_cmd: self.parser_cmd.clone(),
            source_type,
        })
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Analyze {
            cs,
            bp,
            manifest,
            output,
            options,
        } => {
            let config = options.to_config()?;
            let doc = analyze_extension_paths(
                cs.as_deref(),
                bp.as_deref(),
                manifest.as_deref(),
                &config,
            );
            let json = serde_json::to_string_pretty(&doc)
                .map_err(|e| CrxError::config(format!("serialization failed: {}", e)))?;
            match output {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{}", json),
            }
            println!("dangers: {}, crashes: {}", doc.total_danger_count(), doc.crashes.len());
            Ok(())
        }
        Commands::Batch {
            dir,
            parallelize,
            csv_out,
            outfile_name,
            options,
        } => {
            let config = options.to_config()?;
            let workers = parallelize.unwrap_or_else(|| (num_cpus::get() / 2).max(1));
            batch(&dir, workers, csv_out.as_deref(), &outfile_name, &config)
        }
    }
}

/// One unpacked extension directory = one manifest.json.
fn find_extension_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == "manifest.json")
        .filter_map(|e| e.path().parent().map(|p| p.to_path_buf()))
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

fn batch(
    root: &Path,
    workers: usize,
    csv_out: Option<&Path>,
    outfile_name: &str,
    config: &AnalysisConfig,
) -> Result<()> {
    let extensions = find_extension_dirs(root);
    if extensions.is_empty() {
        return Err(CrxError::config(format!(
            "no manifest.json found below {}",
            root.display()
        )));
    }
    println!("analyzing {} unpacked extensions with {} workers...", extensions.len(), workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| CrxError::config(format!("failed to build worker pool: {}", e)))?;

    let mut results: Vec<(PathBuf, FindingDocument)> = pool.install(|| {
        extensions
            .par_iter()
            .map(|ext_dir| {
                let doc = analyze_one_unpacked(ext_dir, config);
                let out_path = ext_dir.join(outfile_name);
                if let Ok(json) = serde_json::to_string_pretty(&doc) {
                    if let Err(e) = std::fs::write(&out_path, json) {
                        tracing::error!(path = %out_path.display(), "cannot write findings: {}", e);
                    }
                }
                println!(
                    "{}: {} dangers, {} crashes",
                    ext_dir.display(),
                    doc.total_danger_count(),
                    doc.crashes.len()
                );
                (ext_dir.clone(), doc)
            })
            .collect()
    });
    // workers finish in arbitrary order; merge by extension identity
    results.sort_by(|a, b| a.0.cmp(&b.0));

    if let Some(csv_path) = csv_out {
        write_csv_summary(csv_path, &results)?;
    }
    Ok(())
}

fn analyze_one_unpacked(ext_dir: &Path, config: &AnalysisConfig) -> FindingDocument {
    let manifest_result = std::fs::read_to_string(ext_dir.join("manifest.json"))
        .map_err(CrxError::from)
        .and_then(|json| Manifest::parse(&json));

    // concatenate each side's scripts into one logical unit
    let side_tree = |paths: Vec<String>, fallback: &str| {
        if paths.is_empty() {
            return Ok(parser_cmd::empty_script_tree(fallback));
        }
        let mut sources = Vec::new();
        for rel in &paths {
            match std::fs::read_to_string(ext_dir.join(rel)) {
                Ok(src) => sources.push((rel.clone(), src)),
                Err(e) => tracing::warn!(file = rel.as_str(), "cannot read script: {}", e),
            }
        }
        let joined = concatenate_scripts(&sources);
        parser_cmd::parse_source(&joined, fallback, config)
    };

    let (bp_tree, cs_tree) = match &manifest_result {
        Ok(m) => (
            Some(side_tree(m.background_script_paths(), "background.js")),
            Some(side_tree(m.content_script_paths(), "contentscript.js")),
        ),
        Err(_) => (None, None),
    };

    analyze_extension(
        ExtensionInput {
            bp_tree,
            cs_tree,
            manifest: Some(manifest_result),
        },
        config,
    )
}

fn write_csv_summary(path: &Path, results: &[(PathBuf, FindingDocument)]) -> Result<()> {
    let mut out = String::from(
        "extension,name,version,manifest version,CS injected into,crashes,total dangers,\
         BP exfiltration dangers,BP infiltration dangers,BP 3.1 violations w/o API danger,\
         BP extension storage accesses,CS exfiltration dangers,CS infiltration dangers,\
         CS extension storage accesses\n",
    );
    for (dir, doc) in results {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            dir.display(),
            csv_field(doc.extension.name.as_deref().unwrap_or("")),
            csv_field(doc.extension.version.as_deref().unwrap_or("")),
            doc.extension.manifest_version.unwrap_or(0),
            csv_field(&doc.content_script_injected_into.join(";")),
            doc.crashes.len(),
            doc.total_danger_count(),
            doc.bp.exfiltration_dangers.len(),
            doc.bp.infiltration_dangers.len(),
            doc.bp.violations_31_without_sensitive_api_access.len(),
            doc.bp.extension_storage_accesses.len(),
            doc.cs.exfiltration_dangers.len(),
            doc.cs.infiltration_dangers.len(),
            doc.cs.extension_storage_accesses.len(),
        ));
    }
    std::fs::write(path, out)?;
    Ok(())
}

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
