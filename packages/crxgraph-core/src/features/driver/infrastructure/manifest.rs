/*
 * Extension manifest (v2/v3) parsing and the renderer-attacker
 * precondition: is some content script injected on an "everywhere"
 * host pattern?
 */

use serde::Deserialize;

use crate::errors::{CrxError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentScriptEntry {
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub js: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Background {
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub service_worker: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub manifest_version: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<serde_json::Value>,
    #[serde(default)]
    pub optional_permissions: Vec<serde_json::Value>,
    #[serde(default)]
    pub host_permissions: Vec<String>,
    #[serde(default)]
    pub optional_host_permissions: Vec<String>,
    #[serde(default)]
    pub content_scripts: Vec<ContentScriptEntry>,
    #[serde(default)]
    pub background: Option<Background>,
}

impl Manifest {
    pub fn parse(json: &str) -> Result<Manifest> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| CrxError::parse(format!("invalid manifest: {}", e)))?;
        if manifest.manifest_version != 2 && manifest.manifest_version != 3 {
            return Err(CrxError::parse(format!(
                "unsupported manifest_version: {}",
                manifest.manifest_version
            )));
        }
        Ok(manifest)
    }

    /// Every URL pattern any content script is injected into.
    pub fn content_script_matches(&self) -> Vec<String> {
        self.content_scripts
            .iter()
            .flat_map(|cs| cs.matches.iter().cloned())
            .collect()
    }

    /// The renderer-attacker precondition: at least one content script
    /// runs on any URL the attacker may control.
    pub fn content_script_injected_everywhere(&self) -> bool {
        self.content_script_matches()
            .iter()
            .any(|p| is_injected_everywhere_pattern(p))
    }

    /// Relative paths of the background scripts (v2) or the service
    /// worker (v3).
    pub fn background_script_paths(&self) -> Vec<String> {
        match &self.background {
            Some(bg) => {
                if let Some(sw) = &bg.service_worker {
                    vec![sw.clone()]
                } else {
                    bg.scripts.clone()
                }
            }
            None => Vec::new(),
        }
    }

    /// Relative paths of all content scripts, in injection order.
    pub fn content_script_paths(&self) -> Vec<String> {
        self.content_scripts
            .iter()
            .flat_map(|cs| cs.js.iter().cloned())
            .collect()
    }
}

/// Host patterns that match "everywhere" (any URL a renderer attacker
/// controls).
pub fn is_injected_everywhere_pattern(pattern: &str) -> bool {
    matches!(
        pattern,
        "<all_urls>"
            | "*://*/*"
            | "http://*/*"
            | "https://*/*"
            | "http*://*/*"
            | "file://*/*"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_mv3_manifest() {
        let m = Manifest::parse(
            r#"{
                "name": "Test", "version": "1.0", "manifest_version": 3,
                "permissions": ["cookies"],
                "content_scripts": [{"matches": ["<all_urls>"], "js": ["cs.js"]}],
                "background": {"service_worker": "bp.js"}
            }"#,
        )
        .unwrap();
        assert_eq!(m.name.as_deref(), Some("Test"));
        assert!(m.content_script_injected_everywhere());
        assert_eq!(m.background_script_paths(), vec!["bp.js"]);
        assert_eq!(m.content_script_paths(), vec!["cs.js"]);
    }

    #[test]
    fn test_mv2_background_scripts() {
        let m = Manifest::parse(
            r#"{
                "manifest_version": 2,
                "background": {"scripts": ["a.js", "b.js"]},
                "content_scripts": [{"matches": ["https://example.com/*"], "js": ["cs.js"]}]
            }"#,
        )
        .unwrap();
        assert_eq!(m.background_script_paths(), vec!["a.js", "b.js"]);
        assert!(!m.content_script_injected_everywhere());
    }

    #[test]
    fn test_bad_manifest_version_is_rejected() {
        assert!(Manifest::parse(r#"{"manifest_version": 1}"#).is_err());
        assert!(Manifest::parse(r#"{"name": "x"}"#).is_err());
        assert!(Manifest::parse("not json").is_err());
    }

    #[test]
    fn test_everywhere_patterns() {
        for p in ["<all_urls>", "*://*/*", "http://*/*", "https://*/*"] {
            assert!(is_injected_everywhere_pattern(p));
        }
        for p in ["https://example.com/*", "*://*.example.com/*"] {
            assert!(!is_injected_everywhere_pattern(p));
        }
    }
}
