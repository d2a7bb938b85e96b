/*
 * Static unreachability: a node is definitely unreachable when it sits
 * in the dead branch of an if whose test evaluates statically. A false
 * result never means "reachable" (the analysis overapproximates
 * reachability to reduce false negatives).
 */

use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::shared::models::NodeId;

use super::static_eval;

pub fn is_unreachable(tree: &Tree, node: NodeId) -> bool {
    for if_stmt in tree.all_ancestors_of_kinds(node, &[NodeKind::IfStatement]) {
        let Some(test) = tree.get_one(if_stmt, "test") else {
            continue;
        };
        // being inside the test itself proves nothing
        if tree.is_inside_or_is(node, test) {
            continue;
        }
        let Ok(value) = static_eval::static_eval(tree, test, false) else {
            continue;
        };
        let Some(consequent) = tree.get_one(if_stmt, "consequent") else {
            continue;
        };
        let alternate = tree.get_one(if_stmt, "alternate");
        if value.is_truthy() {
            if let Some(alt) = alternate {
                if tree.is_inside_or_is(node, alt) {
                    return true;
                }
            }
        } else if tree.is_inside_or_is(node, consequent) {
            return true;
        }
    }
    false
}
