/*
 * Pre-analysis correction pass.
 *
 * An eager edge-generation stage may conservatively over-add same-name
 * edges between occurrences that belong to unrelated declarations.
 * Removal is only legal *before* the lazy flags are examined for
 * analysis; the driver runs this right after eager generation.
 */

use crate::features::ast::Tree;
use crate::features::pdg::scoping;

/// Remove same-name edges whose endpoints resolve to different
/// declarations. Returns the number of removed edges.
pub fn prune_incorrect_edges(tree: &Tree) -> usize {
    let mut removed = 0;
    for edge in tree.all_data_edges() {
        let (from, to) = (edge.from, edge.to);
        if tree.name(from) != tree.name(to) {
            // cross-name edges come from declarations/assignments and
            // are never speculative
            continue;
        }
        let (Some(d1), Some(d2)) = (
            scoping::resolve_identifier(tree, from),
            scoping::resolve_identifier(tree, to),
        ) else {
            continue;
        };
        if d1 != d2 {
            removed += tree.remove_data_edge(from, to);
        }
    }
    if removed > 0 {
        tracing::debug!(removed, "pruned incorrect data-flow edges");
    }
    removed
}
