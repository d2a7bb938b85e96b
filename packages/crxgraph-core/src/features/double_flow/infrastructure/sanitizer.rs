/*
 * UXSS sanitization recognition.
 *
 * A from-flow is sanitized by a replace()/replaceAll() whose regex strips
 * every dangerous character, or by parseInt()/parseFloat() laundering.
 * A rendezvous is sanitized when it is a setAttribute() with a harmless
 * attribute name, a querySelector()/getElementById() lookup, or a
 * `.dataset.` assignment.
 *
 * When in doubt a pattern is NOT sufficient: false positives are
 * preferred over false negatives here.
 */

use regex::Regex;

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::flow_graph::DataFlow;
use crate::features::pdg::calls;
use crate::features::pdg::patterns::{self, MatchOptions, NodePattern};
use crate::shared::models::NodeId;

/// Characters that must all be stripped for a replace() pattern to be
/// sanitizing.
const DANGEROUS_CHARS: &str = r##"!"#$%&'()*+,-./:;<=>?[\]^`{|}~"##;

/// A regex pattern is UXSS-sanitizing iff removing every match from the
/// dangerous-character set leaves nothing. Patterns the regex engine
/// rejects (lookarounds, backreferences) count as not sanitizing.
pub fn is_uxss_sanitizing_regex_pattern(pattern: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(DANGEROUS_CHARS, "").is_empty(),
        Err(_) => false,
    }
}

/// Whether any node of the from-flow passes through a correct sanitizer.
pub fn from_flow_is_correctly_uxss_sanitized(tree: &Tree, flow: &DataFlow) -> bool {
    for &node in flow.nodes() {
        if replace_call_sanitizes(tree, node) {
            return true;
        }
        // parseInt(<source>) / parseFloat(<source>): the result is a
        // number, safe in any sink context (even when the source is a
        // nested expression of the argument)
        for call in tree.all_ancestors_of_kinds(node, &[NodeKind::CallExpression]) {
            let Some(callee) = tree.get_one(call, "callee") else {
                continue;
            };
            if tree.is_inside_or_is(node, callee) {
                continue;
            }
            if tree.is_identifier_named(callee, "parseInt")
                || tree.is_identifier_named(callee, "parseFloat")
            {
                tracing::info!(
                    file = tree.filename(),
                    line = tree.line_number(node),
                    "correct UXSS sanitization using parseInt()/parseFloat()"
                );
                return true;
            }
        }
    }
    false
}

/// `<source>.replace(/pattern/g, ...)` or `.replaceAll(/pattern/, ...)`
/// with a sufficient pattern, anywhere up the member chain
/// (`msg.payload.replace(...)` sanitizes a flow through `msg`). The `g`
/// flag is crucial for replace(): without it only the first occurrence
/// is stripped.
fn replace_call_sanitizes(tree: &Tree, node: NodeId) -> bool {
    let mut current = node;
    loop {
        let Some(member) = tree.parent(current) else {
            return false;
        };
        if tree.kind(member) != NodeKind::MemberExpression || !tree.is_nth_child(current, 0) {
            return false;
        }
        let Some(method) = tree.sibling(current, 1) else {
            return false;
        };
        let is_replace_all = tree.is_identifier_named(method, "replaceAll");
        if !is_replace_all && !tree.is_identifier_named(method, "replace") {
            // not a replace at this level; climb the member chain
            current = member;
            continue;
        }
        if !calls::is_callee_of_call(tree, member) {
            return false;
        }
        let Some(call) = tree.parent(member) else {
            return false;
        };
        let args = calls::call_arguments(tree, call);
        let Some(&first) = args.first() else {
            return false;
        };
        let Some(regex_lit) = tree.attrs(first).regex.as_ref() else {
            return false;
        };
        if !is_replace_all && !regex_lit.flags.contains('g') {
            return false;
        }
        if is_uxss_sanitizing_regex_pattern(&regex_lit.pattern) {
            tracing::info!(
                file = tree.filename(),
                line = tree.line_number(node),
                "correct UXSS sanitization using replace()/replaceAll()"
            );
            return true;
        }
        return false;
    }
}

/// Sink-side flows carry no sanitizers of their own.
pub fn to_flow_is_correctly_uxss_sanitized(_tree: &Tree, _flow: &DataFlow) -> bool {
    false
}

/// Whether the rendezvous itself neutralizes the flow.
pub fn rendezvous_is_correctly_uxss_sanitized(tree: &Tree, rendezvous: NodeId) -> bool {
    match tree.kind(rendezvous) {
        NodeKind::CallExpression => {
            let opts = MatchOptions {
                match_identifier_names: true,
                match_literals: true,
                match_operators: false,
                allow_additional_children: true,
                allow_different_child_order: false,
            };
            // <sink>.setAttribute("data-...", <source>): harmless unless
            // the attribute is src, srcdoc or an on* handler
            let set_attribute = NodePattern::of_kind(NodeKind::CallExpression)
                .child(
                    NodePattern::of_kind(NodeKind::MemberExpression)
                        .child(NodePattern::wildcard())
                        .child(NodePattern::identifier("setAttribute")),
                )
                .child(NodePattern::string_literal_regex("src(doc)?|on.*", true))
                .child(NodePattern::wildcard());
            if patterns::matches(tree, rendezvous, &set_attribute, opts) {
                tracing::info!(
                    file = tree.filename(),
                    line = tree.line_number(rendezvous),
                    "correct UXSS sanitization using .setAttribute()"
                );
                return true;
            }
            // <sink>.querySelector(<source>) / getElementById(<source>):
            // the source is only queried with, never inserted
            let query = NodePattern::of_kind(NodeKind::CallExpression)
                .child(
                    NodePattern::of_kind(NodeKind::MemberExpression)
                        .child(NodePattern::wildcard())
                        .child(NodePattern::identifier_regex(
                            "querySelector|getElementById",
                        )),
                )
                .child(NodePattern::wildcard());
            let query_opts = MatchOptions {
                match_literals: false,
                ..opts
            };
            if patterns::matches(tree, rendezvous, &query, query_opts) {
                tracing::info!(
                    file = tree.filename(),
                    line = tree.line_number(rendezvous),
                    "correct UXSS sanitization using .querySelector()/.getElementById()"
                );
                return true;
            }
            false
        }
        NodeKind::AssignmentExpression => {
            // <sink>.dataset.foo = <source>: data attributes are inert.
            // BEWARE: innerText/textContent are NOT safe here, they do
            // inject when assigned on a <script> element.
            let Ok(lhs) = tree.lhs(rendezvous) else {
                return false;
            };
            if tree.kind(lhs) == NodeKind::MemberExpression
                && calls::member_expression_to_string(tree, lhs).contains(".dataset.")
            {
                tracing::info!(
                    file = tree.filename(),
                    line = tree.line_number(rendezvous),
                    "correct UXSS sanitization using .dataset"
                );
                return true;
            }
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sufficient_patterns() {
        for p in [r"\W", r"[^\w]", r"\D", r"[^\d]", r"[^a-zA-Z0-9_]", r"[^a-z]"] {
            assert!(is_uxss_sanitizing_regex_pattern(p), "{} should sanitize", p);
        }
    }

    #[test]
    fn test_insufficient_patterns() {
        for p in [r"\d", r"[a-z]", r"<", r"<|>", r#"[<>"']"#] {
            assert!(!is_uxss_sanitizing_regex_pattern(p), "{} should not", p);
        }
    }

    #[test]
    fn test_unparseable_pattern_is_not_sanitizing() {
        assert!(!is_uxss_sanitizing_regex_pattern(r"(?<=x)\W"));
    }

    #[test]
    fn test_predicate_equivalence_with_reference_substitution() {
        // property: is_uxss_sanitizing(p) iff re.sub(p, "", S) == ""
        for p in [r"\W", r"\D", r"[^x]", r"x", r"."] {
            let expected = Regex::new(p)
                .map(|re| re.replace_all(DANGEROUS_CHARS, "").is_empty())
                .unwrap_or(false);
            assert_eq!(is_uxss_sanitizing_regex_pattern(p), expected);
        }
    }
}
