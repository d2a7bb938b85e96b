/*
 * Extension-storage access collection: every chrome.storage /
 * browser.storage call, with statically evaluated keys where possible
 * (partial evaluation; opaque parts degrade to null).
 */

use crate::errors::Result;
use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::pdg::{calls, static_eval};
use crate::shared::deadline::Deadline;
use crate::shared::models::JsVal;

use super::super::domain::{StorageAccessRecord, STORAGE_API_PREFIXES};

pub fn extension_storage_accesses(
    tree: &Tree,
    deadline: &Deadline,
) -> Result<Vec<StorageAccessRecord>> {
    let mut out = Vec::new();
    for call in tree.nodes_of_kind(NodeKind::CallExpression) {
        deadline.check()?;
        let full_name = calls::call_full_name(tree, call);
        let Some(prefix) = STORAGE_API_PREFIXES
            .iter()
            .find(|p| full_name.starts_with(**p))
        else {
            continue;
        };
        let keys = calls::call_arguments(tree, call)
            .first()
            .map(|&arg| static_eval::try_static_eval(tree, arg, true, JsVal::Null));
        out.push(StorageAccessRecord {
            api: prefix.to_string(),
            call: full_name,
            location: tree.location_string(call),
            filename: tree.filename().to_string(),
            line_of_code: tree.line_of_code(call),
            keys,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::estree;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_storage_get_with_static_keys() {
        // chrome.storage.local.get(["token"], cb);
        let doc = b::program(vec![b::expr_stmt(b::call(
            b::member_path(&["chrome", "storage", "local", "get"]),
            vec![
                b::array(vec![b::lit_str("token")]),
                b::ident("cb"),
            ],
        ))]);
        let t = estree::load_document(&doc, "bp.js", None).unwrap();
        let accesses = extension_storage_accesses(&t, &Deadline::unlimited()).unwrap();
        assert_eq!(accesses.len(), 1);
        assert_eq!(accesses[0].api, "chrome.storage");
        assert_eq!(accesses[0].call, "chrome.storage.local.get");
        assert_eq!(
            accesses[0].keys,
            Some(JsVal::Array(vec![JsVal::str("token")]))
        );
    }

    #[test]
    fn test_opaque_keys_degrade_to_null() {
        // browser.storage.sync.set(buildPayload());
        let doc = b::program(vec![b::expr_stmt(b::call(
            b::member_path(&["browser", "storage", "sync", "set"]),
            vec![b::call(b::ident("buildPayload"), vec![])],
        ))]);
        let t = estree::load_document(&doc, "bp.js", None).unwrap();
        let accesses = extension_storage_accesses(&t, &Deadline::unlimited()).unwrap();
        assert_eq!(accesses[0].keys, Some(JsVal::Null));
    }
}
