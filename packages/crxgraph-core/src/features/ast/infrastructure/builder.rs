/*
 * Programmatic ESTree document builder.
 *
 * Produces the same JSON documents the external parser emits, without
 * positions (the loader synthesizes pre-order positions). Used by the
 * test suites and for the built-in empty scripts; the node constructors
 * mirror the ESTree interfaces one to one.
 */

use serde_json::{json, Value};

pub fn program(body: Vec<Value>) -> Value {
    json!({"type": "Program", "body": body})
}

pub fn parsing_error(message: &str) -> Value {
    json!({"type": "ParsingError", "message": message})
}

// ── statements ────────────────────────────────────────────────────────

pub fn expr_stmt(expression: Value) -> Value {
    json!({"type": "ExpressionStatement", "expression": expression})
}

pub fn block(body: Vec<Value>) -> Value {
    json!({"type": "BlockStatement", "body": body})
}

pub fn ret(argument: Option<Value>) -> Value {
    match argument {
        Some(a) => json!({"type": "ReturnStatement", "argument": a}),
        None => json!({"type": "ReturnStatement"}),
    }
}

pub fn if_stmt(test: Value, consequent: Value, alternate: Option<Value>) -> Value {
    match alternate {
        Some(alt) => json!({
            "type": "IfStatement", "test": test,
            "consequent": consequent, "alternate": alt
        }),
        None => json!({"type": "IfStatement", "test": test, "consequent": consequent}),
    }
}

pub fn while_stmt(test: Value, body: Value) -> Value {
    json!({"type": "WhileStatement", "test": test, "body": body})
}

pub fn var_decl(kind: &str, declarations: Vec<Value>) -> Value {
    json!({"type": "VariableDeclaration", "kind": kind, "declarations": declarations})
}

pub fn declarator(id: Value, init: Option<Value>) -> Value {
    match init {
        Some(i) => json!({"type": "VariableDeclarator", "id": id, "init": i}),
        None => json!({"type": "VariableDeclarator", "id": id}),
    }
}

/// `let name = init;`
pub fn let_decl(name: &str, init: Value) -> Value {
    var_decl("let", vec![declarator(ident(name), Some(init))])
}

pub fn const_decl(name: &str, init: Value) -> Value {
    var_decl("const", vec![declarator(ident(name), Some(init))])
}

// ── expressions ───────────────────────────────────────────────────────

pub fn ident(name: &str) -> Value {
    json!({"type": "Identifier", "name": name})
}

pub fn this_expr() -> Value {
    json!({"type": "ThisExpression"})
}

pub fn lit_str(s: &str) -> Value {
    json!({"type": "Literal", "value": s, "raw": format!("\"{}\"", s)})
}

pub fn lit_int(i: i64) -> Value {
    json!({"type": "Literal", "value": i, "raw": i.to_string()})
}

pub fn lit_float(f: f64) -> Value {
    json!({"type": "Literal", "value": f, "raw": f.to_string()})
}

pub fn lit_bool(b: bool) -> Value {
    json!({"type": "Literal", "value": b, "raw": b.to_string()})
}

pub fn lit_null() -> Value {
    json!({"type": "Literal", "value": null, "raw": "null"})
}

pub fn lit_regex(pattern: &str, flags: &str) -> Value {
    json!({
        "type": "Literal",
        "raw": format!("/{}/{}", pattern, flags),
        "regex": {"pattern": pattern, "flags": flags}
    })
}

pub fn call(callee: Value, arguments: Vec<Value>) -> Value {
    json!({"type": "CallExpression", "callee": callee, "arguments": arguments})
}

pub fn new_expr(callee: Value, arguments: Vec<Value>) -> Value {
    json!({"type": "NewExpression", "callee": callee, "arguments": arguments})
}

pub fn member(object: Value, property: Value) -> Value {
    json!({
        "type": "MemberExpression", "computed": false,
        "object": object, "property": property
    })
}

pub fn member_computed(object: Value, property: Value) -> Value {
    json!({
        "type": "MemberExpression", "computed": true,
        "object": object, "property": property
    })
}

/// `member_path(&["chrome", "runtime", "onMessage", "addListener"])`
/// builds the nested MemberExpression for a dotted path.
pub fn member_path(parts: &[&str]) -> Value {
    let mut it = parts.iter();
    let mut node = ident(it.next().expect("member_path needs at least one part"));
    for part in it {
        node = member(node, ident(part));
    }
    node
}

pub fn assign(operator: &str, left: Value, right: Value) -> Value {
    json!({
        "type": "AssignmentExpression", "operator": operator,
        "left": left, "right": right
    })
}

pub fn bin(operator: &str, left: Value, right: Value) -> Value {
    json!({
        "type": "BinaryExpression", "operator": operator,
        "left": left, "right": right
    })
}

pub fn logical(operator: &str, left: Value, right: Value) -> Value {
    json!({
        "type": "LogicalExpression", "operator": operator,
        "left": left, "right": right
    })
}

pub fn unary(operator: &str, argument: Value) -> Value {
    json!({
        "type": "UnaryExpression", "operator": operator,
        "prefix": true, "argument": argument
    })
}

pub fn cond(test: Value, consequent: Value, alternate: Value) -> Value {
    json!({
        "type": "ConditionalExpression", "test": test,
        "consequent": consequent, "alternate": alternate
    })
}

pub fn seq(expressions: Vec<Value>) -> Value {
    json!({"type": "SequenceExpression", "expressions": expressions})
}

pub fn array(elements: Vec<Value>) -> Value {
    json!({"type": "ArrayExpression", "elements": elements})
}

pub fn object(properties: Vec<Value>) -> Value {
    json!({"type": "ObjectExpression", "properties": properties})
}

pub fn property(key: Value, value: Value) -> Value {
    json!({
        "type": "Property", "kind": "init", "computed": false,
        "method": false, "shorthand": false, "key": key, "value": value
    })
}

// ── patterns ──────────────────────────────────────────────────────────

pub fn obj_pattern(properties: Vec<Value>) -> Value {
    json!({"type": "ObjectPattern", "properties": properties})
}

/// `{key: binding}` inside an ObjectPattern.
pub fn pattern_property(key: &str, binding: Value) -> Value {
    json!({
        "type": "Property", "kind": "init", "computed": false,
        "method": false, "shorthand": false,
        "key": ident(key), "value": binding
    })
}

/// Shorthand `{name}` inside an ObjectPattern (same PDG as `{name: name}`).
pub fn pattern_shorthand(name: &str) -> Value {
    json!({
        "type": "Property", "kind": "init", "computed": false,
        "method": false, "shorthand": true,
        "key": ident(name), "value": ident(name)
    })
}

pub fn array_pattern(elements: Vec<Value>) -> Value {
    json!({"type": "ArrayPattern", "elements": elements})
}

pub fn assign_pattern(left: Value, right: Value) -> Value {
    json!({"type": "AssignmentPattern", "left": left, "right": right})
}

// ── functions and classes ─────────────────────────────────────────────

pub fn func_decl(name: &str, params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "FunctionDeclaration", "id": ident(name), "params": params,
        "body": block(body), "generator": false, "async": false
    })
}

pub fn func_expr(name: Option<&str>, params: Vec<Value>, body: Vec<Value>) -> Value {
    match name {
        Some(n) => json!({
            "type": "FunctionExpression", "id": ident(n), "params": params,
            "body": block(body), "generator": false, "async": false
        }),
        None => json!({
            "type": "FunctionExpression", "params": params,
            "body": block(body), "generator": false, "async": false
        }),
    }
}

pub fn arrow(params: Vec<Value>, body: Vec<Value>) -> Value {
    json!({
        "type": "ArrowFunctionExpression", "params": params,
        "body": block(body), "generator": false, "async": false
    })
}

/// Arrow function with an expression body: `(params) => expr`.
pub fn arrow_expr(params: Vec<Value>, body: Value) -> Value {
    json!({
        "type": "ArrowFunctionExpression", "params": params,
        "body": body, "generator": false, "async": false
    })
}

pub fn class_decl(name: &str, methods: Vec<Value>) -> Value {
    json!({
        "type": "ClassDeclaration", "id": ident(name),
        "body": {"type": "ClassBody", "body": methods}
    })
}

pub fn method_def(name: &str, is_static: bool, value: Value) -> Value {
    json!({
        "type": "MethodDefinition", "kind": "method", "computed": false,
        "static": is_static, "key": ident(name), "value": value
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::domain::NodeKind;
    use crate::features::ast::estree;

    #[test]
    fn test_builder_round_trips_through_loader() {
        let doc = program(vec![
            let_decl("x", lit_int(1)),
            expr_stmt(call(member_path(&["console", "log"]), vec![ident("x")])),
        ]);
        let t = estree::load_document(&doc, "t.js", None).unwrap();
        assert_eq!(t.nodes_of_kind(NodeKind::Identifier).count(), 4);
        assert_eq!(t.nodes_of_kind(NodeKind::MemberExpression).count(), 1);
    }

    #[test]
    fn test_member_path_shape() {
        let doc = program(vec![expr_stmt(member_path(&["a", "b", "c"]))]);
        let t = estree::load_document(&doc, "t.js", None).unwrap();
        let outer = t.nodes_of_kind(NodeKind::MemberExpression).next().unwrap();
        // outermost member expression is (a.b).c
        let prop = t.get_one(outer, "property").unwrap();
        assert!(t.is_identifier_named(prop, "c"));
    }
}
