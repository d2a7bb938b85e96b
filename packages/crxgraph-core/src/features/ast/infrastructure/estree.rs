/*
 * ESTree JSON document -> arena Tree.
 *
 * The external parser hands us a standard ESTree document (espree
 * output). Children are attached in source order per the ESTree field
 * order of each node type; each child remembers the field it filled as
 * its role. Documents without "loc" information (builder-produced test
 * documents) get synthetic positions in Tree::finish().
 */

use serde_json::Value;

use crate::errors::{CrxError, Result};
use crate::shared::models::{JsVal, NodeId, Span};

use super::super::domain::{Attrs, DeclKind, NodeKind, RegexLit};
use super::tree::Tree;

/// ESTree child-field order per node type. Unknown types fall back to a
/// generic scan over every object/array field carrying "type" markers.
fn role_order(kind: NodeKind) -> &'static [&'static str] {
    use NodeKind::*;
    match kind {
        Program | BlockStatement | ClassBody => &["body"],
        ExpressionStatement | ChainExpression => &["expression"],
        ReturnStatement | ThrowStatement | AwaitExpression | YieldExpression
        | UnaryExpression | UpdateExpression | SpreadElement | RestElement => &["argument"],
        IfStatement | ConditionalExpression => &["test", "consequent", "alternate"],
        SwitchStatement => &["discriminant", "cases"],
        SwitchCase => &["test", "consequent"],
        TryStatement => &["block", "handler", "finalizer"],
        CatchClause => &["param", "body"],
        WhileStatement => &["test", "body"],
        DoWhileStatement => &["body", "test"],
        ForStatement => &["init", "test", "update", "body"],
        ForInStatement | ForOfStatement => &["left", "right", "body"],
        FunctionDeclaration | FunctionExpression | ArrowFunctionExpression => {
            &["id", "params", "body"]
        }
        VariableDeclaration => &["declarations"],
        VariableDeclarator => &["id", "init"],
        ClassDeclaration | ClassExpression => &["id", "superClass", "body"],
        MethodDefinition | PropertyDefinition | Property => &["key", "value"],
        CallExpression | NewExpression => &["callee", "arguments"],
        MemberExpression => &["object", "property"],
        BinaryExpression | LogicalExpression | AssignmentExpression | AssignmentPattern => {
            &["left", "right"]
        }
        SequenceExpression => &["expressions"],
        ArrayExpression | ArrayPattern => &["elements"],
        ObjectExpression | ObjectPattern => &["properties"],
        TemplateLiteral => &["quasis", "expressions"],
        TaggedTemplateExpression => &["tag", "quasi"],
        LabeledStatement => &["label", "body"],
        BreakStatement | ContinueStatement => &["label"],
        WithStatement => &["object", "body"],
        ExportNamedDeclaration => &["declaration", "specifiers", "source"],
        ExportDefaultDeclaration => &["declaration"],
        ExportAllDeclaration => &["source"],
        ImportDeclaration => &["specifiers", "source"],
        ImportSpecifier => &["imported", "local"],
        ImportDefaultSpecifier | ImportNamespaceSpecifier => &["local"],
        ExportSpecifier => &["local", "exported"],
        ImportExpression => &["source"],
        MetaProperty => &["meta", "property"],
        _ => &[],
    }
}

fn span_of(obj: &Value) -> Span {
    let loc = &obj["loc"];
    if loc.is_object() {
        Span::new(
            loc["start"]["line"].as_u64().unwrap_or(0) as u32,
            loc["start"]["column"].as_u64().unwrap_or(0) as u32,
            loc["end"]["line"].as_u64().unwrap_or(0) as u32,
            loc["end"]["column"].as_u64().unwrap_or(0) as u32,
        )
    } else {
        Span::zero()
    }
}

fn js_val_of(v: &Value) -> JsVal {
    match v {
        Value::Null => JsVal::Null,
        Value::Bool(b) => JsVal::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsVal::Int(i)
            } else {
                JsVal::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => JsVal::Str(s.clone()),
        _ => JsVal::Null,
    }
}

fn attrs_of(kind: NodeKind, obj: &Value) -> Attrs {
    let mut attrs = Attrs::default();
    match kind {
        NodeKind::Identifier | NodeKind::PrivateIdentifier => {
            attrs.name = obj["name"].as_str().map(|s| s.to_string());
        }
        NodeKind::Literal => {
            attrs.raw = obj["raw"].as_str().map(|s| s.to_string());
            if let Some(regex) = obj["regex"].as_object() {
                attrs.regex = Some(RegexLit {
                    pattern: regex
                        .get("pattern")
                        .and_then(|p| p.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    flags: regex
                        .get("flags")
                        .and_then(|f| f.as_str())
                        .unwrap_or_default()
                        .to_string(),
                });
            } else {
                attrs.value = Some(js_val_of(&obj["value"]));
            }
        }
        NodeKind::VariableDeclaration => {
            attrs.decl_kind = obj["kind"].as_str().and_then(DeclKind::from_str_opt);
        }
        NodeKind::Property => {
            attrs.prop_kind = obj["kind"].as_str().map(|s| s.to_string());
            attrs.computed = obj["computed"].as_bool().unwrap_or(false);
            attrs.method = obj["method"].as_bool().unwrap_or(false);
            attrs.shorthand = obj["shorthand"].as_bool().unwrap_or(false);
        }
        NodeKind::MethodDefinition | NodeKind::PropertyDefinition => {
            attrs.prop_kind = obj["kind"].as_str().map(|s| s.to_string());
            attrs.computed = obj["computed"].as_bool().unwrap_or(false);
            attrs.is_static = obj["static"].as_bool().unwrap_or(false);
        }
        NodeKind::MemberExpression => {
            attrs.computed = obj["computed"].as_bool().unwrap_or(false);
        }
        NodeKind::UnaryExpression
        | NodeKind::UpdateExpression
        | NodeKind::BinaryExpression
        | NodeKind::LogicalExpression
        | NodeKind::AssignmentExpression => {
            attrs.operator = obj["operator"].as_str().map(|s| s.to_string());
        }
        NodeKind::FunctionDeclaration
        | NodeKind::FunctionExpression
        | NodeKind::ArrowFunctionExpression => {
            attrs.generator = obj["generator"].as_bool().unwrap_or(false);
            attrs.is_async = obj["async"].as_bool().unwrap_or(false);
        }
        _ => {}
    }
    attrs
}

fn looks_like_node(v: &Value) -> bool {
    v.get("type").map(|t| t.is_string()).unwrap_or(false)
}

/// (role, value) pairs for every child, in source order.
fn children_of<'v>(kind: NodeKind, obj: &'v Value) -> Vec<(&'v str, &'v Value)> {
    let mut out = Vec::new();
    let order = role_order(kind);
    let push_field = |out: &mut Vec<(&'v str, &'v Value)>, role: &'v str, v: &'v Value| match v {
        Value::Array(items) => {
            for item in items {
                if looks_like_node(item) {
                    out.push((role, item));
                }
            }
        }
        _ if looks_like_node(v) => out.push((role, v)),
        _ => {}
    };
    if order.is_empty() {
        // Generic scan for kinds without a fixed table entry.
        if let Some(map) = obj.as_object() {
            for (key, v) in map {
                if key == "loc" || key == "range" {
                    continue;
                }
                push_field(&mut out, key.as_str(), v);
            }
        }
    } else {
        for role in order {
            if let Some(v) = obj.get(*role) {
                push_field(&mut out, *role, v);
            }
        }
    }
    out
}

/// Load an ESTree document into an arena tree. `source` (when available)
/// supplies the line-of-code strings used by finding documents.
pub fn load_document(doc: &Value, filename: &str, source: Option<&str>) -> Result<Tree> {
    if doc.get("type").and_then(|t| t.as_str()).is_none() {
        return Err(CrxError::parse(format!(
            "{}: document root has no type",
            filename
        )));
    }

    let mut tree = Tree::new(filename);
    // Explicit work stack, pre-order id assignment (children pushed in
    // reverse so they pop in source order).
    let mut stack: Vec<(&Value, String, Option<NodeId>)> =
        vec![(doc, String::new(), None)];
    while let Some((value, role, parent)) = stack.pop() {
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .map(NodeKind::from_type_str)
            .unwrap_or(NodeKind::Unknown);
        let id = tree.add_node(kind, role, parent, span_of(value), attrs_of(kind, value));
        let children = children_of(kind, value);
        for (child_role, child) in children.into_iter().rev() {
            stack.push((child, child_role.to_string(), Some(id)));
        }
    }
    tree.finish(source);
    Ok(tree)
}

/// Parse a JSON string and load it.
pub fn load_str(json: &str, filename: &str, source: Option<&str>) -> Result<Tree> {
    let doc: Value = serde_json::from_str(json)
        .map_err(|e| CrxError::parse(format!("{}: invalid AST document: {}", filename, e)))?;
    load_document(&doc, filename, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ast::domain::NodeKind;

    #[test]
    fn test_load_simple_document() {
        let json = r#"{
            "type": "Program",
            "body": [{
                "type": "ExpressionStatement",
                "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "Identifier", "name": "foo"},
                    "arguments": [{"type": "Literal", "value": 42, "raw": "42"}]
                }
            }]
        }"#;
        let t = load_str(json, "a.js", None).unwrap();
        assert_eq!(t.kind(t.root()), NodeKind::Program);
        let call = t.nodes_of_kind(NodeKind::CallExpression).next().unwrap();
        let callee = t.get_one(call, "callee").unwrap();
        assert!(t.is_identifier_named(callee, "foo"));
        let args = t.get(call, "arguments");
        assert_eq!(args.len(), 1);
        assert_eq!(
            t.literal_value(args[0]),
            Some(&crate::shared::models::JsVal::Int(42))
        );
    }

    #[test]
    fn test_load_with_locations() {
        let json = r#"{
            "type": "Program",
            "loc": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 10}},
            "body": [{
                "type": "ExpressionStatement",
                "loc": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 10}},
                "expression": {
                    "type": "Identifier", "name": "x",
                    "loc": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 1}}
                }
            }]
        }"#;
        let t = load_str(json, "a.js", Some("x;")).unwrap();
        let x = t.nodes_of_kind(NodeKind::Identifier).next().unwrap();
        assert_eq!(t.span(x).start_line, 1);
        assert_eq!(t.line_of_code(x), "x;");
    }

    #[test]
    fn test_regex_literal_keeps_pattern() {
        let json = r#"{
            "type": "Program",
            "body": [{
                "type": "ExpressionStatement",
                "expression": {
                    "type": "Literal",
                    "raw": "/\\W/g",
                    "regex": {"pattern": "\\W", "flags": "g"}
                }
            }]
        }"#;
        let t = load_str(json, "a.js", None).unwrap();
        let lit = t.nodes_of_kind(NodeKind::Literal).next().unwrap();
        let regex = t.attrs(lit).regex.as_ref().unwrap();
        assert_eq!(regex.pattern, "\\W");
        assert_eq!(regex.flags, "g");
        assert!(t.literal_value(lit).is_none());
    }

    #[test]
    fn test_missing_type_is_parse_error() {
        assert!(load_str(r#"{"body": []}"#, "a.js", None).is_err());
        assert!(load_str("not json", "a.js", None).is_err());
    }
}
