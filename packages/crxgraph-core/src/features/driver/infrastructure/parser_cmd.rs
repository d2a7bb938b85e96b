/*
 * External parser interface.
 *
 * The core never parses JavaScript itself: a configurable command turns
 * source text into an ESTree JSON document on stdout, invoked as
 *     <cmd> <source-file> <sourceType>
 * with the source handed over through a scratch temp file (released with
 * the scope). Inputs ending in `.json` are pre-parsed documents and
 * bypass the command entirely.
 */

use std::io::Write;
use std::path::Path;
use std::process::Command;

use crate::config::AnalysisConfig;
use crate::errors::{CrxError, Result};
use crate::features::ast::{builder, estree, Tree};

/// Parse one script file into a tree.
pub fn parse_script_file(path: &Path, config: &AnalysisConfig) -> Result<Tree> {
    let filename = path.display().to_string();
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let json = std::fs::read_to_string(path)?;
        return estree::load_str(&json, &filename, None);
    }
    let source = std::fs::read_to_string(path)?;
    parse_source(&source, &filename, config)
}

/// Parse in-memory source text (used after concatenating multi-file
/// sides).
pub fn parse_source(source: &str, filename: &str, config: &AnalysisConfig) -> Result<Tree> {
    let Some(cmd) = &config.parser_cmd else {
        return Err(CrxError::config(
            "no parser command configured; provide pre-parsed .json documents or --parser-cmd",
        ));
    };
    let mut scratch = tempfile::NamedTempFile::new()?;
    scratch.write_all(source.as_bytes())?;
    scratch.flush()?;

    let mut parts = cmd.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| CrxError::config("empty parser command"))?;
    let output = Command::new(program)
        .args(parts)
        .arg(scratch.path())
        .arg(config.source_type.as_str())
        .output()
        .map_err(|e| CrxError::parse(format!("{}: parser failed to start: {}", filename, e)))?;
    if !output.status.success() {
        return Err(CrxError::parse(format!(
            "{}: parser exited with {}: {}",
            filename,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let json = String::from_utf8(output.stdout)
        .map_err(|_| CrxError::parse(format!("{}: parser emitted non-UTF8 output", filename)))?;
    estree::load_str(&json, filename, Some(source))
}

/// The tree of an absent script (an empty program).
pub fn empty_script_tree(filename: &str) -> Tree {
    estree::load_document(&builder::program(vec![]), filename, None)
        .expect("empty program always loads")
}
