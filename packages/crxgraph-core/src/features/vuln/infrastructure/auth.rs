/*
 * Sender-origin authentication (Kim+Lee Sec. Req. 3.1: Extension
 * Message Authentication).
 *
 * A listener is considered verified when an if-test inside its body
 * compares a sender-url-derived value against an https:// origin
 * (equality, or startsWith). http:// origins only authenticate under
 * consider-http-as-safe: a renderer attacker with network capabilities
 * can forge extension messages from http origins. Anything else is not
 * authentication - pessimistic, favoring false positives over misses.
 */

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::pdg::calls;
use crate::features::pdg::listeners::MessageListener;
use crate::features::pdg::static_eval;
use crate::shared::deadline::Deadline;
use crate::shared::models::{JsVal, NodeId};

pub fn listener_is_sender_verified(
    tree: &Tree,
    listener: &MessageListener,
    consider_http_as_safe: bool,
    deadline: &Deadline,
) -> bool {
    let Some(body) = listener.body(tree) else {
        return false;
    };
    let Ok(url_exprs) = listener.sender_url_expressions(tree, deadline) else {
        return false;
    };
    if url_exprs.is_empty() {
        return false;
    }

    for if_stmt in tree.descendants_of_kind(body, NodeKind::IfStatement) {
        let Some(test) = tree.get_one(if_stmt, "test") else {
            continue;
        };
        if test_authenticates(tree, test, &url_exprs, consider_http_as_safe) {
            tracing::info!(
                file = tree.filename(),
                line = tree.line_number(if_stmt),
                "sender-origin verification found"
            );
            return true;
        }
    }
    false
}

fn test_authenticates(
    tree: &Tree,
    test: NodeId,
    url_exprs: &[NodeId],
    consider_http_as_safe: bool,
) -> bool {
    let involves_url = |node: NodeId| {
        url_exprs
            .iter()
            .any(|u| tree.is_inside_or_is(*u, node) || tree.is_inside_or_is(node, *u))
    };
    let origin_ok = |node: NodeId| match static_eval::static_eval(tree, node, false) {
        Ok(JsVal::Str(s)) => {
            s.starts_with("https://") || (consider_http_as_safe && s.starts_with("http://"))
        }
        _ => false,
    };
    for node in tree.preorder(test) {
        match tree.kind(node) {
            NodeKind::BinaryExpression => {
                if !matches!(tree.operator(node), Some("==" | "===" | "!=" | "!==")) {
                    continue;
                }
                let (Ok(lhs), Ok(rhs)) = (tree.lhs(node), tree.rhs(node)) else {
                    continue;
                };
                if (involves_url(lhs) && origin_ok(rhs)) || (involves_url(rhs) && origin_ok(lhs)) {
                    return true;
                }
            }
            NodeKind::CallExpression => {
                // sender.url.startsWith("https://...")
                let Some(callee) = tree.get_one(node, "callee") else {
                    continue;
                };
                if tree.kind(callee) != NodeKind::MemberExpression {
                    continue;
                }
                let Some(method) = tree.get_one(callee, "property") else {
                    continue;
                };
                if !tree.is_identifier_named(method, "startsWith") {
                    continue;
                }
                let Some(receiver) = tree.get_one(callee, "object") else {
                    continue;
                };
                let Some(&arg) = calls::call_arguments(tree, node).first() else {
                    continue;
                };
                if involves_url(receiver) && origin_ok(arg) {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::estree;

    fn listener_with_body(body: Vec<serde_json::Value>) -> Tree {
        let doc = b::program(vec![b::expr_stmt(b::call(
            b::member_path(&["chrome", "runtime", "onMessage", "addListener"]),
            vec![b::arrow(
                vec![b::ident("msg"), b::ident("sender"), b::ident("sendResponse")],
                body,
            )],
        ))]);
        estree::load_document(&doc, "bp.js", None).unwrap()
    }

    fn verified(tree: &Tree, http_safe: bool) -> bool {
        let listeners = MessageListener::find_all(tree);
        listener_is_sender_verified(tree, &listeners[0], http_safe, &Deadline::unlimited())
    }

    #[test]
    fn test_https_equality_check_authenticates() {
        // if (sender.url === "https://admin.com/") { ... }
        let t = listener_with_body(vec![b::if_stmt(
            b::bin(
                "===",
                b::member(b::ident("sender"), b::ident("url")),
                b::lit_str("https://admin.com/"),
            ),
            b::block(vec![]),
            None,
        )]);
        assert!(verified(&t, false));
    }

    #[test]
    fn test_http_origin_needs_the_flag() {
        let t = listener_with_body(vec![b::if_stmt(
            b::bin(
                "===",
                b::member(b::ident("sender"), b::ident("url")),
                b::lit_str("http://admin.com/"),
            ),
            b::block(vec![]),
            None,
        )]);
        assert!(!verified(&t, false));
        assert!(verified(&t, true));
    }

    #[test]
    fn test_starts_with_check_authenticates() {
        // if (sender.tab.url.startsWith("https://admin.com/")) { ... }
        let t = listener_with_body(vec![b::if_stmt(
            b::call(
                b::member(
                    b::member_path(&["sender", "tab", "url"]),
                    b::ident("startsWith"),
                ),
                vec![b::lit_str("https://admin.com/")],
            ),
            b::block(vec![]),
            None,
        )]);
        assert!(verified(&t, false));
    }

    #[test]
    fn test_unrelated_check_does_not_authenticate() {
        // if (msg.cmd === "ping") { ... }
        let t = listener_with_body(vec![b::if_stmt(
            b::bin(
                "===",
                b::member(b::ident("msg"), b::ident("cmd")),
                b::lit_str("ping"),
            ),
            b::block(vec![]),
            None,
        )]);
        assert!(!verified(&t, false));
    }

    #[test]
    fn test_no_check_is_unverified() {
        let t = listener_with_body(vec![]);
        assert!(!verified(&t, false));
    }

    #[test]
    fn test_early_return_guard_counts_as_verification() {
        // if (sender.url !== "https://admin.com/") return;
        let t = listener_with_body(vec![b::if_stmt(
            b::bin(
                "!==",
                b::member(b::ident("sender"), b::ident("url")),
                b::lit_str("https://admin.com/"),
            ),
            b::ret(None),
            None,
        )]);
        assert!(verified(&t, false));
    }
}
