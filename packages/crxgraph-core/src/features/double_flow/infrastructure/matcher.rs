/*
 * Rendezvous matcher: pairs of (from-flow, to-flow) whose last nodes
 * share a common ancestor of an admissible kind (a call or an
 * assignment).
 *
 * Example:
 *   chrome.runtime.onMessage.addListener((msg, sender, sendResponse) => {
 *       chrome.cookies.getAll({}, function(cookies) {
 *           sendResponse(cookies);
 *       });
 *       return true;
 *   });
 * from-flow: cookies -> cookies, to-flow: sendResponse -> sendResponse,
 * rendezvous: the sendResponse(cookies) call.
 */

use crate::errors::Result;
use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::flow_graph::infrastructure::dfg;
use crate::features::flow_graph::{DataFlow, FlowStrategy};
use crate::features::pdg::{calls, reachability};
use crate::shared::deadline::Deadline;
use crate::shared::models::NodeId;

use super::sanitizer;

#[derive(Debug, Clone)]
pub struct DoubleDataFlow {
    pub from_flow: DataFlow,
    pub to_flow: DataFlow,
    pub rendezvous: NodeId,
    pub rendezvous_kind: NodeKind,
    /// "k/N" ordinal among the matches of one query ("1/1+" when the
    /// query short-circuited at the first match).
    pub data_flow_number: Option<String>,
}

/// Per-call-site filter profile.
#[derive(Debug, Clone)]
pub struct MatchProfile {
    pub rendezvous_kinds: Vec<NodeKind>,
    /// The rendezvous must not contain any of these kinds (nested
    /// function bodies inside a rendezvous are false positives in
    /// practice).
    pub forbidden_descendants: Vec<NodeKind>,
    /// Return every match instead of short-circuiting at the first.
    pub return_multiple: bool,
    pub allow_unreachable_rendezvous: bool,
    /// IIFE rendezvous call expressions had a high false-positive rate;
    /// off by default.
    pub allow_iife_rendezvous: bool,
    pub check_for_uxss_sanitization: bool,
    pub strategy: FlowStrategy,
}

impl Default for MatchProfile {
    fn default() -> Self {
        MatchProfile {
            rendezvous_kinds: vec![NodeKind::CallExpression, NodeKind::AssignmentExpression],
            forbidden_descendants: vec![
                NodeKind::FunctionExpression,
                NodeKind::ArrowFunctionExpression,
                NodeKind::BlockStatement,
                NodeKind::FunctionDeclaration,
            ],
            return_multiple: true,
            allow_unreachable_rendezvous: false,
            allow_iife_rendezvous: false,
            check_for_uxss_sanitization: false,
            strategy: FlowStrategy::default(),
        }
    }
}

/// Find all double flows from `from_node` (an Identifier or an
/// ObjectPattern, expanded per property) into `to_node` (an Identifier,
/// or a MemberExpression which becomes a single pseudo flow).
/// Returns the empty vector when no data flow exists.
pub fn data_flows_into_sink(
    tree: &Tree,
    from_node: NodeId,
    to_node: NodeId,
    profile: &MatchProfile,
    deadline: &Deadline,
) -> Result<Vec<DoubleDataFlow>> {
    debug_assert!(matches!(
        tree.kind(to_node),
        NodeKind::Identifier | NodeKind::MemberExpression
    ));

    let from_flows = dfg::all_continued_beginning_at(tree, from_node, profile.strategy, deadline)?;
    let to_flows: Vec<DataFlow> = if tree.is_identifier(to_node) {
        dfg::all_continued_beginning_at(tree, to_node, profile.strategy, deadline)?
    } else {
        // no actual data flow may begin at a MemberExpression
        vec![DataFlow::pseudo(to_node)]
    };

    let mut results: Vec<DoubleDataFlow> = Vec::new();
    for from_flow in &from_flows {
        deadline.check()?;
        let from_rendezvous =
            tree.get_ancestor(from_flow.last_node(), &profile.rendezvous_kinds);
        let Some(rendezvous) = from_rendezvous else {
            continue;
        };
        for to_flow in &to_flows {
            let to_rendezvous = tree.get_ancestor(to_flow.last_node(), &profile.rendezvous_kinds);
            if to_rendezvous != Some(rendezvous) {
                continue;
            }
            if !passes_filters(tree, from_flow, to_flow, rendezvous, profile) {
                continue;
            }
            let double = DoubleDataFlow {
                from_flow: from_flow.clone(),
                to_flow: to_flow.clone(),
                rendezvous,
                rendezvous_kind: tree.kind(rendezvous),
                data_flow_number: None,
            };
            if profile.return_multiple {
                results.push(double);
            } else {
                // 1st data flow of 1 (or more) total data flows
                let mut single = double;
                single.data_flow_number = Some("1/1+".to_string());
                return Ok(vec![single]);
            }
        }
    }

    let total = results.len();
    for (i, r) in results.iter_mut().enumerate() {
        r.data_flow_number = Some(format!("{}/{}", i + 1, total));
    }
    Ok(results)
}

/// All filters are conjunctive and independent, so the result set does
/// not depend on any application order.
fn passes_filters(
    tree: &Tree,
    from_flow: &DataFlow,
    to_flow: &DataFlow,
    rendezvous: NodeId,
    profile: &MatchProfile,
) -> bool {
    if !profile.allow_unreachable_rendezvous && reachability::is_unreachable(tree, rendezvous) {
        return false;
    }
    if !profile.allow_iife_rendezvous
        && tree.kind(rendezvous) == NodeKind::CallExpression
        && calls::is_iife(tree, rendezvous)
    {
        return false;
    }
    if tree.has_descendant_of_kinds(rendezvous, &profile.forbidden_descendants) {
        return false;
    }
    if profile.check_for_uxss_sanitization
        && (sanitizer::from_flow_is_correctly_uxss_sanitized(tree, from_flow)
            || sanitizer::to_flow_is_correctly_uxss_sanitized(tree, to_flow)
            || sanitizer::rendezvous_is_correctly_uxss_sanitized(tree, rendezvous))
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::builder as b;
    use crate::features::ast::estree;
    use pretty_assertions::assert_eq;

    fn load(doc: serde_json::Value) -> Tree {
        estree::load_document(&doc, "t.js", None).unwrap()
    }

    fn nth_named(tree: &Tree, name: &str, nth: usize) -> NodeId {
        tree.nodes_of_kind(NodeKind::Identifier)
            .filter(|i| tree.name(*i) == Some(name))
            .nth(nth)
            .unwrap()
    }

    /// let data = taint(); sink(data);  -- one call rendezvous
    fn simple_pair() -> Tree {
        load(b::program(vec![
            b::let_decl("data", b::call(b::ident("taint"), vec![])),
            b::let_decl("sink", b::arrow(vec![b::ident("p")], vec![])),
            b::expr_stmt(b::call(b::ident("sink"), vec![b::ident("data")])),
        ]))
    }

    #[test]
    fn test_simple_rendezvous_found() {
        let t = simple_pair();
        let from = nth_named(&t, "data", 0);
        let to = nth_named(&t, "sink", 1); // the callee occurrence
        let profile = MatchProfile::default();
        let flows =
            data_flows_into_sink(&t, from, to, &profile, &Deadline::unlimited()).unwrap();
        assert!(!flows.is_empty());
        assert_eq!(flows[0].rendezvous_kind, NodeKind::CallExpression);
        assert_eq!(flows[0].data_flow_number.as_deref(), Some("1/1"));
    }

    #[test]
    fn test_short_circuit_labels_first() {
        let t = simple_pair();
        let from = nth_named(&t, "data", 0);
        let to = nth_named(&t, "sink", 1);
        let profile = MatchProfile {
            return_multiple: false,
            ..MatchProfile::default()
        };
        let flows =
            data_flows_into_sink(&t, from, to, &profile, &Deadline::unlimited()).unwrap();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].data_flow_number.as_deref(), Some("1/1+"));
    }

    #[test]
    fn test_unreachable_rendezvous_filtered() {
        // if (1 === 2) { sink(data); }
        let t = load(b::program(vec![
            b::let_decl("data", b::call(b::ident("taint"), vec![])),
            b::let_decl("sink", b::arrow(vec![b::ident("p")], vec![])),
            b::if_stmt(
                b::bin("===", b::lit_int(1), b::lit_int(2)),
                b::block(vec![b::expr_stmt(b::call(
                    b::ident("sink"),
                    vec![b::ident("data")],
                ))]),
                None,
            ),
        ]));
        let from = nth_named(&t, "data", 0);
        let to = nth_named(&t, "sink", 1);
        let profile = MatchProfile::default();
        let flows =
            data_flows_into_sink(&t, from, to, &profile, &Deadline::unlimited()).unwrap();
        assert!(flows.is_empty());
        // allowing unreachable rendezvous brings it back
        let lax = MatchProfile {
            allow_unreachable_rendezvous: true,
            ..MatchProfile::default()
        };
        assert!(!data_flows_into_sink(&t, from, to, &lax, &Deadline::unlimited())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_member_expression_pseudo_sink() {
        // document.body.innerHTML = data;
        let t = load(b::program(vec![
            b::let_decl("data", b::call(b::ident("taint"), vec![])),
            b::expr_stmt(b::assign(
                "=",
                b::member_path(&["document", "body", "innerHTML"]),
                b::ident("data"),
            )),
        ]));
        let from = nth_named(&t, "data", 0);
        let sink_member = t
            .nodes_of_kind(NodeKind::MemberExpression)
            .next()
            .unwrap();
        let profile = MatchProfile {
            rendezvous_kinds: vec![NodeKind::AssignmentExpression],
            ..MatchProfile::default()
        };
        let flows = data_flows_into_sink(&t, from, sink_member, &profile, &Deadline::unlimited())
            .unwrap();
        assert_eq!(flows.len(), 1);
        assert!(flows[0].to_flow.is_pseudo());
        assert_eq!(flows[0].rendezvous_kind, NodeKind::AssignmentExpression);
    }

    #[test]
    fn test_filter_order_independence() {
        // the filter set is conjunctive; verify both "orders" (profiles
        // toggling filters) return identical sets
        let t = simple_pair();
        let from = nth_named(&t, "data", 0);
        let to = nth_named(&t, "sink", 1);
        let p1 = MatchProfile {
            check_for_uxss_sanitization: true,
            ..MatchProfile::default()
        };
        let a = data_flows_into_sink(&t, from, to, &p1, &Deadline::unlimited()).unwrap();
        let b2 = data_flows_into_sink(&t, from, to, &p1, &Deadline::unlimited()).unwrap();
        assert_eq!(a.len(), b2.len());
        for (x, y) in a.iter().zip(b2.iter()) {
            assert_eq!(x.rendezvous, y.rendezvous);
            assert_eq!(x.from_flow, y.from_flow);
        }
    }
}
