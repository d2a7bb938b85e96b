/*
 * Structural pattern matching over AST subtrees.
 *
 * Patterns are little trees with toggles: match identifier names (exact
 * or regex), match literals (exact, regex, negated regex), match
 * operators, allow additional children, allow different child order. A
 * wildcard matches any subtree.
 *
 * Combinatorics are bounded by the *pattern* arity: unordered matching
 * backtracks over assignments of the pattern's non-wildcard children
 * (small in every realistic rule), never over the node's children.
 */

use regex::Regex;

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::shared::models::{JsVal, NodeId};

use super::reachability;

#[derive(Debug, Clone)]
enum TextMatcher {
    Exact(String),
    Regex(String),
}

impl TextMatcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            TextMatcher::Exact(s) => s == text,
            TextMatcher::Regex(pattern) => {
                // full match, like the sanitizer rules expect
                Regex::new(&format!("^(?:{})$", pattern))
                    .map(|re| re.is_match(text))
                    .unwrap_or(false)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodePattern {
    /// `None` is the wildcard: matches anything, children ignored.
    kind: Option<NodeKind>,
    children: Vec<NodePattern>,
    name: Option<TextMatcher>,
    literal_value: Option<JsVal>,
    literal_regex: Option<TextMatcher>,
    negate_literal: bool,
    operator: Option<String>,
}

impl NodePattern {
    pub fn of_kind(kind: NodeKind) -> Self {
        Self {
            kind: Some(kind),
            children: Vec::new(),
            name: None,
            literal_value: None,
            literal_regex: None,
            negate_literal: false,
            operator: None,
        }
    }

    pub fn wildcard() -> Self {
        Self {
            kind: None,
            children: Vec::new(),
            name: None,
            literal_value: None,
            literal_regex: None,
            negate_literal: false,
            operator: None,
        }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        let mut p = Self::of_kind(NodeKind::Identifier);
        p.name = Some(TextMatcher::Exact(name.into()));
        p
    }

    pub fn identifier_regex(pattern: impl Into<String>) -> Self {
        let mut p = Self::of_kind(NodeKind::Identifier);
        p.name = Some(TextMatcher::Regex(pattern.into()));
        p
    }

    pub fn literal(value: JsVal) -> Self {
        let mut p = Self::of_kind(NodeKind::Literal);
        p.literal_value = Some(value);
        p
    }

    /// Matches string literals whose value fully matches `pattern`;
    /// with `negate` the literal must NOT match (non-string literals
    /// count as not matching).
    pub fn string_literal_regex(pattern: impl Into<String>, negate: bool) -> Self {
        let mut p = Self::of_kind(NodeKind::Literal);
        p.literal_regex = Some(TextMatcher::Regex(pattern.into()));
        p.negate_literal = negate;
        p
    }

    pub fn with_operator(mut self, op: impl Into<String>) -> Self {
        self.operator = Some(op.into());
        self
    }

    pub fn child(mut self, child: NodePattern) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.kind.is_none()
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.kind
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    pub match_identifier_names: bool,
    pub match_literals: bool,
    pub match_operators: bool,
    pub allow_additional_children: bool,
    pub allow_different_child_order: bool,
}

const OPERATOR_KINDS: &[NodeKind] = &[
    NodeKind::UpdateExpression,
    NodeKind::UnaryExpression,
    NodeKind::BinaryExpression,
    NodeKind::LogicalExpression,
    NodeKind::AssignmentExpression,
];

/// Does the subtree at `node` match `pattern`?
pub fn matches(tree: &Tree, node: NodeId, pattern: &NodePattern, opts: MatchOptions) -> bool {
    if pattern.is_wildcard() {
        return true;
    }
    let kind = tree.kind(node);
    if Some(kind) != pattern.kind {
        return false;
    }
    if opts.match_identifier_names && kind == NodeKind::Identifier {
        if let Some(matcher) = &pattern.name {
            let Some(name) = tree.name(node) else {
                return false;
            };
            if !matcher.matches(name) {
                return false;
            }
        }
    }
    if opts.match_literals && kind == NodeKind::Literal {
        if let Some(expected) = &pattern.literal_value {
            match tree.literal_value(node) {
                Some(actual) if actual == expected => {}
                _ => return false,
            }
        }
        if let Some(matcher) = &pattern.literal_regex {
            let is_match = match tree.literal_value(node) {
                Some(JsVal::Str(s)) => matcher.matches(s),
                _ => false,
            };
            if is_match == pattern.negate_literal {
                return false;
            }
        }
    }
    if opts.match_operators && OPERATOR_KINDS.contains(&kind) {
        if let Some(op) = &pattern.operator {
            if tree.operator(node) != Some(op.as_str()) {
                return false;
            }
        }
    }

    let node_children = tree.children(node);
    let pattern_children = &pattern.children;
    if !opts.allow_additional_children && node_children.len() != pattern_children.len() {
        return false;
    }
    if opts.allow_additional_children && node_children.len() < pattern_children.len() {
        return false;
    }

    let non_wildcards: Vec<&NodePattern> =
        pattern_children.iter().filter(|p| !p.is_wildcard()).collect();

    match (opts.allow_additional_children, opts.allow_different_child_order) {
        (false, false) => node_children
            .iter()
            .zip(pattern_children.iter())
            .all(|(c, p)| matches(tree, *c, p, opts)),
        (false, true) => {
            // every node child must be consumed by some pattern child;
            // backtrack over the (small) pattern arity
            let mut used = vec![false; pattern_children.len()];
            assign_any_order(tree, node_children, pattern_children, &mut used, 0, opts)
        }
        (true, false) => {
            // non-wildcard pattern children match a subsequence of the
            // node children, in order; the rest is implicitly wildcarded
            subsequence_match(tree, node_children, &non_wildcards, 0, 0, opts)
        }
        (true, true) => {
            // non-wildcard pattern children match distinct node
            // children, any order
            let mut used = vec![false; node_children.len()];
            assign_distinct(tree, node_children, &non_wildcards, &mut used, 0, opts)
        }
    }
}

fn assign_any_order(
    tree: &Tree,
    node_children: &[NodeId],
    pattern_children: &[NodePattern],
    used: &mut [bool],
    idx: usize,
    opts: MatchOptions,
) -> bool {
    if idx == node_children.len() {
        return true;
    }
    for (pi, p) in pattern_children.iter().enumerate() {
        if used[pi] {
            continue;
        }
        if matches(tree, node_children[idx], p, opts) {
            used[pi] = true;
            if assign_any_order(tree, node_children, pattern_children, used, idx + 1, opts) {
                return true;
            }
            used[pi] = false;
        }
    }
    false
}

fn subsequence_match(
    tree: &Tree,
    node_children: &[NodeId],
    patterns: &[&NodePattern],
    ni: usize,
    pi: usize,
    opts: MatchOptions,
) -> bool {
    if pi == patterns.len() {
        return true;
    }
    if node_children.len() - ni < patterns.len() - pi {
        return false;
    }
    for candidate in ni..node_children.len() {
        if matches(tree, node_children[candidate], patterns[pi], opts)
            && subsequence_match(tree, node_children, patterns, candidate + 1, pi + 1, opts)
        {
            return true;
        }
    }
    false
}

fn assign_distinct(
    tree: &Tree,
    node_children: &[NodeId],
    patterns: &[&NodePattern],
    used: &mut [bool],
    pi: usize,
    opts: MatchOptions,
) -> bool {
    if pi == patterns.len() {
        return true;
    }
    for (ni, c) in node_children.iter().enumerate() {
        if used[ni] {
            continue;
        }
        if matches(tree, *c, patterns[pi], opts) {
            used[ni] = true;
            if assign_distinct(tree, node_children, patterns, used, pi + 1, opts) {
                return true;
            }
            used[ni] = false;
        }
    }
    false
}

/// All subtrees under `root` matching `pattern`. Unreachable matches are
/// skipped unless `allow_unreachable`.
pub fn find_pattern(
    tree: &Tree,
    root: NodeId,
    pattern: &NodePattern,
    opts: MatchOptions,
    allow_unreachable: bool,
) -> Vec<NodeId> {
    let Some(kind) = pattern.kind() else {
        return tree.preorder(root).collect();
    };
    tree.preorder(root)
        .filter(|n| tree.kind(*n) == kind)
        .filter(|n| matches(tree, *n, pattern, opts))
        .filter(|n| allow_unreachable || !reachability::is_unreachable(tree, *n))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::estree;

    fn load(doc: serde_json::Value) -> Tree {
        estree::load_document(&doc, "t.js", None).unwrap()
    }

    const STRICT: MatchOptions = MatchOptions {
        match_identifier_names: true,
        match_literals: true,
        match_operators: false,
        allow_additional_children: false,
        allow_different_child_order: false,
    };

    #[test]
    fn test_set_attribute_pattern() {
        // el.setAttribute("data-x", v) -- the canonical sanitizer shape
        let t = load(b::program(vec![b::expr_stmt(b::call(
            b::member(b::ident("el"), b::ident("setAttribute")),
            vec![b::lit_str("data-x"), b::ident("v")],
        ))]));
        let pattern = NodePattern::of_kind(NodeKind::CallExpression)
            .child(
                NodePattern::of_kind(NodeKind::MemberExpression)
                    .child(NodePattern::wildcard())
                    .child(NodePattern::identifier("setAttribute")),
            )
            .child(NodePattern::string_literal_regex("src(doc)?|on.*", true))
            .child(NodePattern::wildcard());
        let call = t.nodes_of_kind(NodeKind::CallExpression).next().unwrap();
        let opts = MatchOptions {
            allow_additional_children: true,
            ..STRICT
        };
        assert!(matches(&t, call, &pattern, opts));

        // el.setAttribute("onclick", v) must NOT match (negated regex)
        let t2 = load(b::program(vec![b::expr_stmt(b::call(
            b::member(b::ident("el"), b::ident("setAttribute")),
            vec![b::lit_str("onclick"), b::ident("v")],
        ))]));
        let call2 = t2.nodes_of_kind(NodeKind::CallExpression).next().unwrap();
        assert!(!matches(&t2, call2, &pattern, opts));
    }

    #[test]
    fn test_wildcard_matches_anything() {
        let t = load(b::program(vec![b::expr_stmt(b::lit_int(1))]));
        let lit = t.nodes_of_kind(NodeKind::Literal).next().unwrap();
        assert!(matches(&t, lit, &NodePattern::wildcard(), STRICT));
        assert!(matches(&t, t.root(), &NodePattern::wildcard(), STRICT));
    }

    #[test]
    fn test_identifier_regex() {
        let t = load(b::program(vec![b::expr_stmt(b::ident("querySelector"))]));
        let id = t.nodes_of_kind(NodeKind::Identifier).next().unwrap();
        let p = NodePattern::identifier_regex("querySelector|getElementById");
        assert!(matches(&t, id, &p, STRICT));
        let p2 = NodePattern::identifier_regex("getElementById");
        assert!(!matches(&t, id, &p2, STRICT));
    }

    #[test]
    fn test_child_count_strictness() {
        let t = load(b::program(vec![b::expr_stmt(b::call(
            b::ident("f"),
            vec![b::lit_int(1), b::lit_int(2)],
        ))]));
        let call = t.nodes_of_kind(NodeKind::CallExpression).next().unwrap();
        let one_arg = NodePattern::of_kind(NodeKind::CallExpression)
            .child(NodePattern::identifier("f"))
            .child(NodePattern::literal(JsVal::Int(1)));
        assert!(!matches(&t, call, &one_arg, STRICT));
        let opts = MatchOptions {
            allow_additional_children: true,
            ..STRICT
        };
        assert!(matches(&t, call, &one_arg, opts));
    }

    #[test]
    fn test_different_child_order() {
        let t = load(b::program(vec![b::expr_stmt(b::call(
            b::ident("f"),
            vec![b::lit_int(1)],
        ))]));
        let call = t.nodes_of_kind(NodeKind::CallExpression).next().unwrap();
        // pattern lists the argument before the callee
        let reordered = NodePattern::of_kind(NodeKind::CallExpression)
            .child(NodePattern::literal(JsVal::Int(1)))
            .child(NodePattern::identifier("f"));
        assert!(!matches(&t, call, &reordered, STRICT));
        let opts = MatchOptions {
            allow_different_child_order: true,
            ..STRICT
        };
        assert!(matches(&t, call, &reordered, opts));
    }

    #[test]
    fn test_find_pattern() {
        let t = load(b::program(vec![
            b::expr_stmt(b::call(b::ident("f"), vec![])),
            b::expr_stmt(b::call(b::ident("g"), vec![])),
            b::expr_stmt(b::call(b::ident("f"), vec![b::lit_int(1)])),
        ]));
        let p = NodePattern::of_kind(NodeKind::CallExpression)
            .child(NodePattern::identifier("f"));
        let opts = MatchOptions {
            allow_additional_children: true,
            ..STRICT
        };
        assert_eq!(find_pattern(&t, t.root(), &p, opts, true).len(), 2);
    }
}
