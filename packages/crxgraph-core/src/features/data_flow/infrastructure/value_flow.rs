/*
 * Identifier occurrences through which a value flows.
 *
 * Used for the RHS of declarations/assignments and for call arguments:
 * the *result* of a nested call is not a basic flow of its callee or
 * arguments (that is what the return-value layer is for), and a function
 * expression does not leak the variables its body mentions.
 */

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::shared::models::NodeId;

/// Identifiers in `expr` whose values feed the expression's own value.
/// Skips call/new results, function and class expression bodies,
/// non-computed member properties and non-computed object keys.
pub fn value_flow_identifiers(tree: &Tree, expr: NodeId) -> Vec<NodeId> {
    let mut result = Vec::new();
    let mut stack = vec![expr];
    while let Some(node) = stack.pop() {
        match tree.kind(node) {
            NodeKind::Identifier => result.push(node),
            NodeKind::CallExpression => {
                // a method call's result carries its receiver's data
                // (`y = x.replace(...)` flows x -> y); plain calls and
                // arguments resolve through the return-value layer
                if let Some(callee) = tree.get_one(node, "callee") {
                    if tree.kind(callee) == NodeKind::MemberExpression {
                        if let Some(object) = tree.get_one(callee, "object") {
                            stack.push(object);
                        }
                    }
                }
            }
            NodeKind::NewExpression
            | NodeKind::FunctionExpression
            | NodeKind::ArrowFunctionExpression
            | NodeKind::ClassExpression => {}
            NodeKind::MemberExpression => {
                if let Some(object) = tree.get_one(node, "object") {
                    stack.push(object);
                }
                if tree.attrs(node).computed {
                    if let Some(property) = tree.get_one(node, "property") {
                        stack.push(property);
                    }
                }
            }
            NodeKind::Property => {
                if tree.attrs(node).computed {
                    if let Some(key) = tree.get_one(node, "key") {
                        stack.push(key);
                    }
                }
                if let Some(value) = tree.get_one(node, "value") {
                    stack.push(value);
                }
            }
            NodeKind::TaggedTemplateExpression => {
                if let Some(quasi) = tree.get_one(node, "quasi") {
                    stack.push(quasi);
                }
            }
            _ => {
                for &c in tree.children(node).iter().rev() {
                    stack.push(c);
                }
            }
        }
    }
    result
}
