/*
 * Function and class models.
 *
 * `Func` unifies the three function carriers and also accepts an
 * Identifier (resolved through data-flow parents or, as a fallback,
 * declaration lookup) and a `.bind(...)` call expression (unwrapped).
 */

use crate::errors::{CrxError, Result};
use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::data_flow;
use crate::shared::models::NodeId;

use super::calls;
use super::scoping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Func {
    node: NodeId,
}

impl Func {
    /// Resolve `node` to a function carrier.
    ///
    /// With `use_df_edges`, identifiers are chased along their data-flow
    /// parent chain; without, a name-based declaration lookup is used
    /// instead (may produce false positives when a declared function is
    /// overridden, only use before data flows exist).
    pub fn from_node(tree: &Tree, node: NodeId, use_df_edges: bool) -> Result<Func> {
        let mut node = node;

        // unwrap `f.bind(this)` down to `f`
        if tree.kind(node) == NodeKind::CallExpression {
            let callee = tree
                .get_one(node, "callee")
                .ok_or_else(|| CrxError::func_resolution("call without callee"))?;
            if tree.kind(callee) == NodeKind::MemberExpression
                && tree
                    .get_one(callee, "property")
                    .map(|p| tree.is_identifier_named(p, "bind"))
                    .unwrap_or(false)
            {
                node = tree
                    .get_one(callee, "object")
                    .ok_or_else(|| CrxError::func_resolution("bind without receiver"))?;
            } else {
                return Err(CrxError::func_resolution(format!(
                    "CallExpression {} isn't a .bind(...) call",
                    node
                )));
            }
        }

        if tree.is_identifier(node) {
            node = if use_df_edges {
                resolve_identifier_to_function(tree, node)?
            } else {
                function_declaration_for_name(tree, node).ok_or_else(|| {
                    CrxError::func_resolution(format!(
                        "identifier '{}' cannot be resolved to a declared function",
                        tree.name(node).unwrap_or_default()
                    ))
                })?
            };
        }

        if tree.kind(node).is_function() {
            Ok(Func { node })
        } else {
            Err(CrxError::func_resolution(format!(
                "node {} is a {}, which is not a function",
                node,
                tree.kind(node)
            )))
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn is_function_declaration(&self, tree: &Tree) -> bool {
        tree.kind(self.node) == NodeKind::FunctionDeclaration
    }

    pub fn is_function_expression(&self, tree: &Tree) -> bool {
        tree.kind(self.node) == NodeKind::FunctionExpression
    }

    pub fn is_arrow_function_expression(&self, tree: &Tree) -> bool {
        tree.kind(self.node) == NodeKind::ArrowFunctionExpression
    }

    /// Parameters in order; simple ones are Identifiers, the rest are
    /// Assignment/Array/Object patterns.
    pub fn params(&self, tree: &Tree) -> Vec<NodeId> {
        tree.get(self.node, "params")
    }

    pub fn nth_param(&self, tree: &Tree, n: usize) -> Option<NodeId> {
        self.params(tree).get(n).copied()
    }

    /// The parameter's identifier when it is simple or has a default;
    /// `None` for destructuring patterns.
    pub fn nth_param_identifier(&self, tree: &Tree, n: usize) -> Option<NodeId> {
        let param = self.nth_param(tree, n)?;
        match tree.kind(param) {
            NodeKind::Identifier => Some(param),
            NodeKind::AssignmentPattern => {
                let lhs = tree.lhs(param).ok()?;
                tree.is_identifier(lhs).then_some(lhs)
            }
            _ => None,
        }
    }

    /// A BlockStatement for declarations/expressions; possibly a bare
    /// expression for arrow functions.
    pub fn body(&self, tree: &Tree) -> Option<NodeId> {
        tree.get_one(self.node, "body")
    }

    pub fn id_node(&self, tree: &Tree) -> Option<NodeId> {
        tree.get_one(self.node, "id")
    }

    pub fn name<'t>(&self, tree: &'t Tree) -> Option<&'t str> {
        self.id_node(tree).and_then(|id| tree.name(id))
    }

    /// Whether the function calls itself recursively, by its own name,
    /// by `arguments.callee`, or by the variable it was assigned to.
    ///
    /// `arguments.callee` inside nested arrow functions is attributed to
    /// this function whenever this function is the nearest non-arrow
    /// carrier; the full rebinding semantics of `arguments` are not
    /// modelled.
    pub fn calls_itself_recursively(&self, tree: &Tree) -> bool {
        let Some(body) = self.body(tree) else {
            return false;
        };
        if self.is_function_declaration(tree) || self.is_function_expression(tree) {
            let own_name = self.name(tree);
            for call in tree.descendants_of_kind(body, NodeKind::CallExpression) {
                let full = calls::call_full_name(tree, call);
                if Some(full.as_str()) == own_name || full == "arguments.callee" {
                    return true;
                }
            }
        }
        if self.is_function_expression(tree) || self.is_arrow_function_expression(tree) {
            // [var/let/const] f = function(n) { ... f(n-1) ... };
            let assigned_name = tree.parent(self.node).and_then(|p| {
                let is_declarator = tree.kind(p) == NodeKind::VariableDeclarator
                    && tree.rhs(p).ok() == Some(self.node);
                let is_assignment = tree.kind(p) == NodeKind::AssignmentExpression
                    && tree.operator(p) == Some("=")
                    && tree.rhs(p).ok() == Some(self.node);
                if !is_declarator && !is_assignment {
                    return None;
                }
                let lhs = tree.lhs(p).ok()?;
                tree.is_identifier(lhs)
                    .then(|| tree.name(lhs).map(|s| s.to_string()))
                    .flatten()
            });
            if let Some(name) = assigned_name {
                for call in tree.descendants_of_kind(body, NodeKind::CallExpression) {
                    if calls::call_full_name(tree, call) == name {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Chase an identifier up its data-flow parent chain (stopping at splits
/// and cycles) and interpret where the chain ends.
fn resolve_identifier_to_function(tree: &Tree, ident: NodeId) -> Result<NodeId> {
    let chain = data_flow_parents_no_split(tree, ident);
    let def = *chain.last().unwrap_or(&ident);
    let Some(parent) = tree.parent(def) else {
        return Err(CrxError::func_resolution("identifier without parent"));
    };
    match tree.kind(parent) {
        NodeKind::FunctionDeclaration if tree.role(def) == "id" => Ok(parent),
        NodeKind::FunctionExpression | NodeKind::ArrowFunctionExpression
            if tree.role(def) == "id" =>
        {
            Ok(parent)
        }
        NodeKind::VariableDeclarator | NodeKind::AssignmentExpression
            if tree.lhs(parent).ok() == Some(def) =>
        {
            let rhs = tree.rhs(parent).map_err(|_| {
                CrxError::func_resolution("definition has no right-hand side")
            })?;
            if matches!(
                tree.kind(rhs),
                NodeKind::FunctionExpression | NodeKind::ArrowFunctionExpression
            ) {
                Ok(rhs)
            } else {
                Err(CrxError::func_resolution(format!(
                    "identifier '{}' points to a {}, not a function expression",
                    tree.name(ident).unwrap_or_default(),
                    tree.kind(rhs)
                )))
            }
        }
        other => Err(CrxError::func_resolution(format!(
            "identifier '{}' resolved into a {}",
            tree.name(ident).unwrap_or_default(),
            other
        ))),
    }
}

/// Follow single data-flow parents until a split, a cycle, or a node
/// without parents. The returned chain starts at `ident`.
pub fn data_flow_parents_no_split(tree: &Tree, ident: NodeId) -> Vec<NodeId> {
    let mut chain = vec![ident];
    loop {
        let last = *chain.last().unwrap();
        let parents = data_flow::flow_parents(tree, last);
        if parents.len() != 1 {
            return chain;
        }
        let next = parents[0];
        if chain.contains(&next) {
            return chain;
        }
        chain.push(next);
    }
}

/// Declaration-lookup fallback: the innermost FunctionDeclaration with
/// this name whose scope contains the identifier.
fn function_declaration_for_name(tree: &Tree, ident: NodeId) -> Option<NodeId> {
    let name = tree.name(ident)?;
    scoping::declarations_in_scope(tree, ident, false, true)
        .into_iter()
        .filter(|d| tree.name(d.ident) == Some(name))
        .filter_map(|d| {
            let p = tree.parent(d.ident)?;
            (tree.kind(p) == NodeKind::FunctionDeclaration && tree.role(d.ident) == "id")
                .then_some(p)
        })
        .next()
}

/// Resolve the target function of a call expression: IIFEs, identifier
/// callees, `.bind(...)` callees, and class-method dispatch. `None` when
/// resolution is impossible (the call stays unresolved).
pub fn resolve_call_target(tree: &Tree, call: NodeId) -> Option<Func> {
    let callee = tree.get_one(call, "callee")?;
    match tree.kind(callee) {
        NodeKind::FunctionExpression
        | NodeKind::ArrowFunctionExpression
        | NodeKind::Identifier
        | NodeKind::CallExpression => match Func::from_node(tree, callee, true) {
            Ok(func) => Some(func),
            Err(e) => {
                tracing::trace!(
                    line = tree.line_number(call),
                    error = %e,
                    "call target stays unresolved"
                );
                None
            }
        },
        NodeKind::MemberExpression => resolve_method_call(tree, callee),
        _ => None,
    }
}

/// `obj.foo(x)` resolves `foo` against the class of `obj`'s constructor
/// (non-static methods); `ClassName.foo(x)` resolves against the static
/// methods. Ambiguous receivers stay unresolved.
fn resolve_method_call(tree: &Tree, callee: NodeId) -> Option<Func> {
    if tree.attrs(callee).computed {
        return None;
    }
    let object = tree.get_one(callee, "object")?;
    let property = tree.get_one(callee, "property")?;
    if !tree.is_identifier(object) || !tree.is_identifier(property) {
        return None;
    }
    let method_name = tree.name(property)?;
    let decl_ident = scoping::resolve_identifier(tree, object)?;
    let decl_parent = tree.parent(decl_ident)?;
    if tree.kind(decl_parent) == NodeKind::ClassDeclaration && tree.role(decl_ident) == "id" {
        // static dispatch via the class name
        return JsClass::new(tree, decl_parent)?.method_func(tree, true, method_name);
    }
    // instance dispatch: the receiver must be initialized with
    // `new ClassName(...)`
    if tree.kind(decl_parent) == NodeKind::VariableDeclarator {
        let init = tree.get_one(decl_parent, "init")?;
        if tree.kind(init) == NodeKind::NewExpression {
            let class_name_ident = tree.get_one(init, "callee")?;
            if tree.is_identifier(class_name_ident) {
                let class_ident = scoping::resolve_identifier(tree, class_name_ident)?;
                let class_decl = tree.parent(class_ident)?;
                if tree.kind(class_decl) == NodeKind::ClassDeclaration {
                    return JsClass::new(tree, class_decl)?.method_func(tree, false, method_name);
                }
            }
        }
    }
    None
}

/// A ClassDeclaration wrapper with method lookup.
#[derive(Debug, Clone, Copy)]
pub struct JsClass {
    node: NodeId,
}

impl JsClass {
    pub fn new(tree: &Tree, node: NodeId) -> Option<JsClass> {
        (tree.kind(node) == NodeKind::ClassDeclaration).then_some(JsClass { node })
    }

    pub fn name<'t>(&self, tree: &'t Tree) -> Option<&'t str> {
        tree.get_one(self.node, "id").and_then(|id| tree.name(id))
    }

    pub fn body(&self, tree: &Tree) -> Option<NodeId> {
        tree.get_one(self.node, "body")
    }

    /// Method lookup by name. Two methods with the same name may exist
    /// (one static, one not); within one staticness the later definition
    /// overrides the earlier, so the scan must not stop at the first hit.
    pub fn method(&self, tree: &Tree, is_static: bool, name: &str) -> Option<NodeId> {
        let body = self.body(tree)?;
        let mut found = None;
        for def in tree.descendants_of_kind(body, NodeKind::MethodDefinition) {
            let attrs = tree.attrs(def);
            if attrs.prop_kind.as_deref() != Some("method") || attrs.is_static != is_static {
                continue;
            }
            let Some(key) = tree.get_one(def, "key") else {
                continue;
            };
            if tree.is_identifier_named(key, name) {
                found = Some(def);
            }
        }
        found
    }

    pub fn method_func(&self, tree: &Tree, is_static: bool, name: &str) -> Option<Func> {
        let def = self.method(tree, is_static, name)?;
        let value = tree.get_one(def, "value")?;
        (tree.kind(value) == NodeKind::FunctionExpression).then_some(Func { node: value })
    }
}
