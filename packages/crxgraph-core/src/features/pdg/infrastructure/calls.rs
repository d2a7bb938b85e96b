/*
 * Call-expression and member-expression naming helpers.
 *
 * Full function names are normalized strings: "a['b'].c(x).d" becomes
 * "a.b.c().d". Placeholders like "<FunctionExpression>" are never valid
 * JS identifiers, so they cannot collide with real names.
 */

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::shared::models::{JsVal, NodeId};

use super::static_eval;

/// Normalized string form of a MemberExpression.
///
/// `a['b']` collapses to `a.b` whenever the computed key statically
/// evaluates to a string; call links collapse to `name()`.
pub fn member_expression_to_string(tree: &Tree, member: NodeId) -> String {
    debug_assert_eq!(tree.kind(member), NodeKind::MemberExpression);
    let rhs_part = match (tree.rhs(member), tree.attrs(member).computed) {
        (Ok(rhs), true) => match static_eval::static_eval(tree, rhs, false) {
            Ok(JsVal::Str(s)) => format!(".{}", s),
            Ok(v) => format!("[{}]", v.to_js_string()),
            Err(_) => format!("[<{}>]", tree.kind(rhs)),
        },
        (Ok(rhs), false) => {
            if tree.is_identifier(rhs) {
                format!(".{}", tree.name(rhs).unwrap_or_default())
            } else {
                format!(".<{}>", tree.kind(rhs))
            }
        }
        (Err(_), _) => ".<?>".to_string(),
    };
    let lhs = match tree.lhs(member) {
        Ok(l) => l,
        Err(_) => return format!("<?>{}", rhs_part),
    };
    let lhs_part = match tree.kind(lhs) {
        NodeKind::ThisExpression => "this".to_string(),
        NodeKind::Identifier => tree.name(lhs).unwrap_or_default().to_string(),
        NodeKind::MemberExpression => member_expression_to_string(tree, lhs),
        NodeKind::CallExpression => match tree.lhs(lhs).map(|callee| tree.kind(callee)) {
            Ok(NodeKind::ThisExpression) => "this()".to_string(),
            Ok(NodeKind::Identifier) => format!(
                "{}()",
                tree.lhs(lhs).ok().and_then(|c| tree.name(c)).unwrap_or_default()
            ),
            Ok(NodeKind::MemberExpression) => {
                format!(
                    "{}()",
                    member_expression_to_string(tree, tree.lhs(lhs).unwrap())
                )
            }
            _ => format!("<{}>", tree.kind(lhs)),
        },
        other => format!("<{}>", other),
    };
    format!("{}{}", lhs_part, rhs_part)
}

/// The leftmost node of a member/call chain ("foo" for `foo.bar().baz`).
/// Not necessarily an Identifier; callers must check.
pub fn member_leftmost(tree: &Tree, member: NodeId) -> Option<NodeId> {
    let mut current = *tree.children(member).first()?;
    while matches!(
        tree.kind(current),
        NodeKind::MemberExpression | NodeKind::CallExpression
    ) {
        current = *tree.children(current).first()?;
    }
    Some(current)
}

/// Full function name of a CallExpression: "foo.bar.baz" for
/// `foo.bar.baz(x)`; "<FunctionExpression>" for IIFEs; "x().y" for
/// chained calls.
pub fn call_full_name(tree: &Tree, call: NodeId) -> String {
    debug_assert!(matches!(
        tree.kind(call),
        NodeKind::CallExpression | NodeKind::NewExpression
    ));
    let Ok(callee) = tree.lhs(call) else {
        return "<?>".to_string();
    };
    match tree.kind(callee) {
        NodeKind::Identifier => tree.name(callee).unwrap_or_default().to_string(),
        NodeKind::ThisExpression => "this".to_string(),
        NodeKind::MemberExpression => member_expression_to_string(tree, callee),
        NodeKind::CallExpression => format!("{}()", call_full_name(tree, callee)),
        other => format!("<{}>", other),
    }
}

pub fn call_arguments(tree: &Tree, call: NodeId) -> Vec<NodeId> {
    tree.get(call, "arguments")
}

/// Whether the CallExpression directly invokes an (arrow) function
/// expression (an IIFE).
pub fn is_iife(tree: &Tree, call: NodeId) -> bool {
    tree.kind(call) == NodeKind::CallExpression
        && tree
            .lhs(call)
            .map(|callee| {
                matches!(
                    tree.kind(callee),
                    NodeKind::FunctionExpression | NodeKind::ArrowFunctionExpression
                )
            })
            .unwrap_or(false)
}

/// Whether `node` fills the callee position of a CallExpression.
pub fn is_callee_of_call(tree: &Tree, node: NodeId) -> bool {
    tree.parent(node)
        .map(|p| {
            tree.kind(p) == NodeKind::CallExpression && tree.get_one(p, "callee") == Some(node)
        })
        .unwrap_or(false)
}

/// Follow a promise chain upward: for `f(...).then(cb1).then(cb2)`,
/// called on the `f(...)` CallExpression, returns the `.then(...)`
/// CallExpressions in chain order.
pub fn then_chain_calls(tree: &Tree, call: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut current = call;
    loop {
        // current must be the object of a `.then` member expression that
        // is itself the callee of a call
        let Some(member) = tree.parent(current) else {
            break;
        };
        if tree.kind(member) != NodeKind::MemberExpression
            || tree.get_one(member, "object") != Some(current)
        {
            break;
        }
        let Some(prop) = tree.get_one(member, "property") else {
            break;
        };
        if !tree.is_identifier_named(prop, "then") || tree.attrs(member).computed {
            break;
        }
        let Some(then_call) = tree.parent(member) else {
            break;
        };
        if tree.kind(then_call) != NodeKind::CallExpression
            || tree.get_one(then_call, "callee") != Some(member)
        {
            break;
        }
        result.push(then_call);
        current = then_call;
    }
    result
}

/// (api prefix, actual call name) pairs for every sensitive API accessed
/// in the subtree. "chrome.cookies" catches "chrome.cookies.getAll";
/// complex names containing "()" are never considered.
pub fn sensitive_apis_accessed(
    tree: &Tree,
    subtree: NodeId,
    apis: &[&str],
) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();
    for call in tree.preorder(subtree) {
        if tree.kind(call) != NodeKind::CallExpression {
            continue;
        }
        let full_name = call_full_name(tree, call);
        if full_name.contains("()") {
            continue;
        }
        for api in apis {
            if full_name.starts_with(api) {
                let pair = (api.to_string(), full_name.clone());
                if !result.contains(&pair) {
                    result.push(pair);
                }
            }
        }
    }
    result
}

/// All MemberExpressions in the subtree whose normalized form ends in
/// `suffix`.
pub fn member_expressions_ending_in(tree: &Tree, root: NodeId, suffix: &str) -> Vec<NodeId> {
    tree.preorder(root)
        .filter(|n| tree.kind(*n) == NodeKind::MemberExpression)
        .filter(|m| member_expression_to_string(tree, *m).ends_with(suffix))
        .collect()
}
