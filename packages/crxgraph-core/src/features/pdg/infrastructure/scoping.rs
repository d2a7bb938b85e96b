/*
 * Scoping and identifier resolution.
 *
 * Declarations considered: let/const (block scope), var (function scope),
 * function declarations (function scope, value-hoisted), classes (block
 * scope), named function-expression self-names (the expression itself),
 * function parameters (the function itself), and implicit globals from
 * assignments to undeclared names (non-strict mode).
 *
 * Shadowing is resolved by picking the declaration whose scope has the
 * smallest subtree height (the innermost enclosing scope).
 */

use rustc_hash::FxHashSet;

use crate::features::ast::domain::{DeclKind, NodeKind};
use crate::features::ast::Tree;
use crate::shared::models::NodeId;

/// How a name was introduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Variable(DeclKind),
    FunctionName,
    ClassName,
    Param,
    FuncExprSelfName,
    ImplicitGlobal,
}

/// One declared name: the identifier at its point of declaration and the
/// subtree it is visible in.
#[derive(Debug, Clone, Copy)]
pub struct Declaration {
    pub ident: NodeId,
    pub scope: NodeId,
    pub kind: DeclarationKind,
}

impl Declaration {
    /// Value-hoisted declarations are usable anywhere in their scope;
    /// everything else only provides a value at and after its site.
    pub fn is_value_hoisted(&self) -> bool {
        matches!(
            self.kind,
            DeclarationKind::FunctionName
                | DeclarationKind::Param
                | DeclarationKind::FuncExprSelfName
        )
    }
}

/// Nearest enclosing function carrier or Program, starting at the parent.
pub fn function_scope_of(tree: &Tree, node: NodeId) -> NodeId {
    tree.ancestors(node)
        .find(|a| tree.kind(*a).is_function_scope_boundary())
        .unwrap_or(tree.root())
}

/// Nearest enclosing block or Program, starting at the parent.
pub fn block_scope_of(tree: &Tree, node: NodeId) -> NodeId {
    tree.ancestors(node)
        .find(|a| tree.kind(*a).is_block_scope_boundary())
        .unwrap_or(tree.root())
}

/// Scope of a VariableDeclaration (depends on its kind).
pub fn variable_declaration_scope(tree: &Tree, decl: NodeId) -> NodeId {
    match tree.attrs(decl).decl_kind {
        Some(DeclKind::Var) => function_scope_of(tree, decl),
        _ => block_scope_of(tree, decl),
    }
}

/// Scope of any declaration-acting node.
pub fn declaration_scope(tree: &Tree, decl: NodeId) -> NodeId {
    match tree.kind(decl) {
        NodeKind::FunctionDeclaration => function_scope_of(tree, decl),
        NodeKind::VariableDeclaration => variable_declaration_scope(tree, decl),
        NodeKind::ClassDeclaration => block_scope_of(tree, decl),
        NodeKind::FunctionExpression | NodeKind::ArrowFunctionExpression => decl,
        // An AssignmentExpression acting as a declaration implicitly
        // declares a global.
        NodeKind::AssignmentExpression => tree.root(),
        _ => tree.root(),
    }
}

/// Binding identifiers of a function parameter: the identifier itself,
/// the LHS of a default, pattern element/property-value identifiers.
pub fn param_binding_identifiers(tree: &Tree, param: NodeId) -> Vec<NodeId> {
    pattern_binding_identifiers(tree, param)
}

/// Binding identifiers of a declaration/assignment target subtree.
pub fn pattern_binding_identifiers(tree: &Tree, target: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect_bindings(tree, target, &mut out);
    out
}

fn collect_bindings(tree: &Tree, node: NodeId, out: &mut Vec<NodeId>) {
    match tree.kind(node) {
        NodeKind::Identifier => out.push(node),
        NodeKind::AssignmentPattern => {
            if let Ok(lhs) = tree.lhs(node) {
                collect_bindings(tree, lhs, out);
            }
        }
        NodeKind::ArrayPattern => {
            for &el in tree.children(node) {
                collect_bindings(tree, el, out);
            }
        }
        NodeKind::ObjectPattern => {
            for &prop in tree.children(node) {
                // the property value is the binding; the key only names
                // the accessed member
                if let Some(value) = tree.children(prop).get(1) {
                    collect_bindings(tree, *value, out);
                } else if let Some(key) = tree.children(prop).first() {
                    collect_bindings(tree, *key, out);
                }
            }
        }
        NodeKind::RestElement => {
            if let Ok(arg) = tree.lhs(node) {
                collect_bindings(tree, arg, out);
            }
        }
        _ => {}
    }
}

/// Whether an `=` AssignmentExpression writes a property
/// (`x.y = ...`, `x[y] = ...`); those never (re)bind a variable.
pub fn assignment_accesses_property(tree: &Tree, assign: NodeId) -> bool {
    tree.lhs(assign)
        .map(|lhs| tree.kind(lhs) == NodeKind::MemberExpression)
        .unwrap_or(false)
}

pub fn assignment_is_destructuring(tree: &Tree, assign: NodeId) -> bool {
    tree.lhs(assign)
        .map(|lhs| {
            matches!(
                tree.kind(lhs),
                NodeKind::ArrayPattern | NodeKind::ObjectPattern
            )
        })
        .unwrap_or(false)
}

/// All declarations whose scope contains `at` (one whole-tree pre-order
/// pass; even deep in the tree, names from far up may be in scope).
/// With `return_overshadowed=false`, only the innermost declaration per
/// name survives. With `return_reassigned=false`, declarations that were
/// assigned to between their site and `at` are dropped.
pub fn declarations_in_scope(
    tree: &Tree,
    at: NodeId,
    return_overshadowed: bool,
    return_reassigned: bool,
) -> Vec<Declaration> {
    let all = collect_declarations(tree, Some(at));
    let mut picked: Vec<Declaration> = if return_overshadowed {
        all
    } else {
        // group by name, keep the declaration with the innermost
        // (smallest-height) scope
        let mut by_name: Vec<(String, Declaration)> = Vec::new();
        for decl in all {
            let Some(name) = tree.name(decl.ident) else {
                continue;
            };
            match by_name.iter_mut().find(|(n, _)| n.as_str() == name) {
                Some((_, best)) => {
                    if tree.height(decl.scope) < tree.height(best.scope) {
                        *best = decl;
                    }
                }
                None => by_name.push((name.to_string(), decl)),
            }
        }
        by_name.into_iter().map(|(_, d)| d).collect()
    };
    if !return_reassigned {
        picked.retain(|d| !identifier_is_assigned_to_before(tree, d.ident, at, d.scope));
    }
    picked
}

/// Every declaration in the tree (optionally only those whose scope
/// contains `at`). Pre-order; used both for resolution and by the basic
/// data-flow layer.
pub fn collect_declarations(tree: &Tree, at: Option<NodeId>) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut implicit_seen: FxHashSet<String> = FxHashSet::default();
    let in_scope = |tree: &Tree, scope: NodeId| match at {
        Some(a) => tree.is_inside_or_is(a, scope),
        None => true,
    };
    for node in tree.preorder(tree.root()) {
        match tree.kind(node) {
            NodeKind::VariableDeclaration => {
                let scope = variable_declaration_scope(tree, node);
                if !in_scope(tree, scope) {
                    continue;
                }
                let kind = DeclarationKind::Variable(
                    tree.attrs(node).decl_kind.unwrap_or(DeclKind::Var),
                );
                for &declarator in tree.children(node) {
                    if tree.kind(declarator) != NodeKind::VariableDeclarator {
                        continue;
                    }
                    if let Some(&target) = tree.children(declarator).first() {
                        for ident in pattern_binding_identifiers(tree, target) {
                            out.push(Declaration { ident, scope, kind });
                        }
                    }
                }
            }
            NodeKind::FunctionDeclaration => {
                let name_scope = function_scope_of(tree, node);
                if in_scope(tree, name_scope) {
                    if let Some(id) = tree.get_one(node, "id") {
                        out.push(Declaration {
                            ident: id,
                            scope: name_scope,
                            kind: DeclarationKind::FunctionName,
                        });
                    }
                }
                if in_scope(tree, node) {
                    for param in tree.get(node, "params") {
                        for ident in param_binding_identifiers(tree, param) {
                            out.push(Declaration {
                                ident,
                                scope: node,
                                kind: DeclarationKind::Param,
                            });
                        }
                    }
                }
            }
            NodeKind::ClassDeclaration => {
                let scope = block_scope_of(tree, node);
                if in_scope(tree, scope) {
                    if let Some(id) = tree.get_one(node, "id") {
                        out.push(Declaration {
                            ident: id,
                            scope,
                            kind: DeclarationKind::ClassName,
                        });
                    }
                }
            }
            NodeKind::FunctionExpression => {
                if in_scope(tree, node) {
                    if let Some(id) = tree.get_one(node, "id") {
                        out.push(Declaration {
                            ident: id,
                            scope: node,
                            kind: DeclarationKind::FuncExprSelfName,
                        });
                    }
                    for param in tree.get(node, "params") {
                        for ident in param_binding_identifiers(tree, param) {
                            out.push(Declaration {
                                ident,
                                scope: node,
                                kind: DeclarationKind::Param,
                            });
                        }
                    }
                }
            }
            NodeKind::ArrowFunctionExpression => {
                if in_scope(tree, node) {
                    for param in tree.get(node, "params") {
                        for ident in param_binding_identifiers(tree, param) {
                            out.push(Declaration {
                                ident,
                                scope: node,
                                kind: DeclarationKind::Param,
                            });
                        }
                    }
                }
            }
            NodeKind::AssignmentExpression => {
                // assignment to an undeclared name implicitly declares a
                // global (non-strict mode); the pre-order pass guarantees
                // earlier declarations of the name have been seen
                if tree.operator(node) != Some("=") || assignment_accesses_property(tree, node) {
                    continue;
                }
                let Ok(lhs) = tree.lhs(node) else { continue };
                for ident in pattern_binding_identifiers(tree, lhs) {
                    let Some(name) = tree.name(ident) else {
                        continue;
                    };
                    let already_declared = out
                        .iter()
                        .any(|d: &Declaration| tree.name(d.ident) == Some(name))
                        || implicit_seen.contains(name);
                    if !already_declared {
                        implicit_seen.insert(name.to_string());
                        out.push(Declaration {
                            ident,
                            scope: tree.root(),
                            kind: DeclarationKind::ImplicitGlobal,
                        });
                    }
                }
            }
            _ => {}
        }
    }
    out
}

/// Resolve an identifier occurrence to its point of declaration.
/// Returns the occurrence itself when it *is* the declaration.
/// `None` when the name has no visible declaration.
pub fn resolve_identifier(tree: &Tree, ident: NodeId) -> Option<NodeId> {
    debug_assert!(tree.is_identifier(ident));
    let name = tree.name(ident)?;
    declarations_in_scope(tree, ident, false, true)
        .into_iter()
        .find(|d| tree.name(d.ident) == Some(name))
        .map(|d| d.ident)
}

/// Like [`resolve_identifier`] but also returns the declaration record.
pub fn resolve_declaration(tree: &Tree, ident: NodeId) -> Option<Declaration> {
    let name = tree.name(ident)?;
    declarations_in_scope(tree, ident, false, true)
        .into_iter()
        .find(|d| tree.name(d.ident) == Some(name))
}

/// Whether `ident`'s name is (re)assigned between `ident` and `other` in
/// a pre-order walk of `scope`. Only plain `=` assignments count
/// (destructuring included, property writes and compound assignments
/// excluded: `x += y` updates rather than overrides, data may flow on).
///
/// Returns true when `other` itself is part of such an assignment;
/// returns false when `other` is never reached (it precedes `ident`).
pub fn identifier_is_assigned_to_before(
    tree: &Tree,
    ident: NodeId,
    other: NodeId,
    scope: NodeId,
) -> bool {
    debug_assert!(tree.is_identifier(ident));
    let Some(name) = tree.name(ident) else {
        return false;
    };
    let mut encountered_self = false;
    for node in tree.preorder(scope) {
        if node == ident {
            encountered_self = true;
        } else if !encountered_self {
            continue;
        } else if node == other {
            // must be checked before the assignment check so that an
            // `other` that is itself an AssignmentExpression terminates
            return false;
        } else if tree.kind(node) == NodeKind::AssignmentExpression
            && tree.operator(node) == Some("=")
            && !assignment_accesses_property(tree, node)
        {
            if let Ok(lhs) = tree.lhs(node) {
                if tree
                    .identifiers_in(lhs)
                    .iter()
                    .any(|i| tree.name(*i) == Some(name))
                {
                    return true;
                }
            }
        }
    }
    false
}

/// Is `ident` in scope at `other`? Composes resolution, overshadowing and
/// the two reassignment windows (declaration..other, ident..other).
pub fn identifier_is_in_scope_at(
    tree: &Tree,
    ident: NodeId,
    other: NodeId,
    allow_overshadowing: bool,
    allow_reassignment_after_decl: bool,
    allow_reassignment_after_self: bool,
) -> bool {
    debug_assert!(tree.is_identifier(ident));
    let Some(decl) = resolve_declaration(tree, ident) else {
        return false;
    };
    if !tree.is_inside_or_is(other, decl.scope) {
        return false;
    }
    if allow_overshadowing && allow_reassignment_after_decl && allow_reassignment_after_self {
        return true;
    }
    let visible = declarations_in_scope(tree, other, allow_overshadowing, true);
    if !visible.iter().any(|d| d.ident == decl.ident) {
        return false;
    }
    if !allow_reassignment_after_decl
        && identifier_is_assigned_to_before(tree, decl.ident, other, decl.scope)
    {
        return false;
    }
    if !allow_reassignment_after_self
        && identifier_is_assigned_to_before(tree, ident, other, decl.scope)
    {
        return false;
    }
    true
}
