/*
 * Static evaluator: a bounded, pure interpreter for purely-static
 * JavaScript expressions.
 *
 * Supported: literals (except regex), unary/binary/logical/conditional/
 * sequence expressions with JS coercion rules, array and object
 * expressions (with a partial mode that maps unevaluable parts to null),
 * member access over arrays and objects, const-identifier resolution,
 * calls to single-return user lambdas and to a table of built-ins.
 *
 * Everything else raises a StaticEval error kind; callers recover with
 * try_static_eval or treat the check as inconclusive.
 */

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::engine::Engine;

use crate::errors::{CrxError, Result};
use crate::features::ast::domain::{DeclKind, NodeKind};
use crate::features::ast::Tree;
use crate::shared::models::{JsVal, NodeId};

use super::calls;
use super::scoping;

/// Guard against pathological recursion (`const x = x;` style cycles).
const MAX_DEPTH: usize = 200;

pub fn static_eval(tree: &Tree, node: NodeId, allow_partial: bool) -> Result<JsVal> {
    eval(tree, node, allow_partial, 0)
}

/// Non-throwing wrapper: any failure yields `default`.
pub fn try_static_eval(tree: &Tree, node: NodeId, allow_partial: bool, default: JsVal) -> JsVal {
    static_eval(tree, node, allow_partial).unwrap_or(default)
}

fn err(msg: impl Into<String>) -> CrxError {
    CrxError::static_eval(msg)
}

fn eval(tree: &Tree, node: NodeId, partial: bool, depth: usize) -> Result<JsVal> {
    if depth > MAX_DEPTH {
        return Err(err("expression nesting too deep"));
    }
    match tree.kind(node) {
        NodeKind::Literal => {
            if tree.attrs(node).regex.is_some() {
                return Err(err("cannot statically evaluate regex literals"));
            }
            tree.literal_value(node)
                .cloned()
                .ok_or_else(|| err("literal without value"))
        }

        NodeKind::SequenceExpression => {
            // the comma operator yields the last operand
            let exprs = tree.get(node, "expressions");
            let last = exprs.last().ok_or_else(|| err("empty SequenceExpression"))?;
            eval(tree, *last, partial, depth + 1)
        }

        NodeKind::ObjectExpression => {
            let mut entries: Vec<(String, JsVal)> = Vec::new();
            for prop in tree.get(node, "properties") {
                if tree.kind(prop) != NodeKind::Property || tree.attrs(prop).method {
                    return Err(err("object expressions with methods are not supported"));
                }
                let key = tree
                    .get_one(prop, "key")
                    .ok_or_else(|| err("property without key"))?;
                let value = tree
                    .get_one(prop, "value")
                    .ok_or_else(|| err("property without value"))?;
                let key_str = match tree.kind(key) {
                    NodeKind::Identifier if !tree.attrs(prop).computed => {
                        tree.name(key).unwrap_or_default().to_string()
                    }
                    NodeKind::Literal => tree
                        .literal_value(key)
                        .map(|v| v.key_string())
                        .ok_or_else(|| err("unsupported property key"))?,
                    _ => return Err(err("unsupported property key")),
                };
                match eval(tree, value, partial, depth + 1) {
                    Ok(v) => match entries.iter_mut().find(|(k, _)| *k == key_str) {
                        Some(entry) => entry.1 = v,
                        None => entries.push((key_str, v)),
                    },
                    Err(_) if partial => continue,
                    Err(e) => return Err(e),
                }
            }
            Ok(JsVal::Object(entries))
        }

        NodeKind::ArrayExpression => {
            let mut items = Vec::new();
            for el in tree.get(node, "elements") {
                if tree.kind(el) == NodeKind::SpreadElement {
                    return Err(err("spread syntax is not supported"));
                }
                match eval(tree, el, partial, depth + 1) {
                    Ok(v) => items.push(v),
                    Err(_) if partial => items.push(JsVal::Null),
                    Err(e) => return Err(e),
                }
            }
            Ok(JsVal::Array(items))
        }

        NodeKind::BinaryExpression => eval_binary(tree, node, partial, depth),

        NodeKind::LogicalExpression => {
            let left = tree.lhs(node)?;
            let right = tree.rhs(node)?;
            let l = eval(tree, left, partial, depth + 1)?;
            match tree.operator(node) {
                // short-circuiting, operand-returning (like JS || and &&)
                Some("||") => {
                    if l.is_truthy() {
                        Ok(l)
                    } else {
                        eval(tree, right, partial, depth + 1)
                    }
                }
                Some("&&") => {
                    if l.is_truthy() {
                        eval(tree, right, partial, depth + 1)
                    } else {
                        Ok(l)
                    }
                }
                op => Err(err(format!("unsupported logical operator: {:?}", op))),
            }
        }

        NodeKind::ConditionalExpression => {
            let test = tree.get_one(node, "test").ok_or_else(|| err("no test"))?;
            let consequent = tree
                .get_one(node, "consequent")
                .ok_or_else(|| err("no consequent"))?;
            let alternate = tree
                .get_one(node, "alternate")
                .ok_or_else(|| err("no alternate"))?;
            match eval(tree, test, partial, depth + 1) {
                Ok(t) => {
                    if t.is_truthy() {
                        eval(tree, consequent, partial, depth + 1)
                    } else {
                        eval(tree, alternate, partial, depth + 1)
                    }
                }
                Err(_) => {
                    // the test is opaque, but if both branches agree the
                    // value is known anyway
                    let c = eval(tree, consequent, partial, depth + 1)?;
                    let a = eval(tree, alternate, partial, depth + 1)?;
                    if c == a {
                        Ok(c)
                    } else {
                        Err(err("conditional branches differ and test is not static"))
                    }
                }
            }
        }

        NodeKind::UnaryExpression => eval_unary(tree, node, partial, depth),

        NodeKind::Identifier => eval_const_identifier(tree, node, partial, depth),

        NodeKind::AssignmentExpression => {
            // an assignment expression's value is the assigned value
            let rhs = tree.rhs(node)?;
            eval(tree, rhs, partial, depth + 1)
        }

        NodeKind::MemberExpression => eval_member(tree, node, partial, depth),

        NodeKind::CallExpression => eval_call(tree, node, partial, depth),

        NodeKind::FunctionExpression | NodeKind::ArrowFunctionExpression => {
            lambda_of(tree, node)
        }

        other => Err(err(format!("unsupported expression kind: {}", other))),
    }
}

/// A function expression is evaluable only when its body is a single
/// ReturnStatement; the lambda wraps the returned expression.
fn lambda_of(tree: &Tree, func: NodeId) -> Result<JsVal> {
    let body = tree
        .get_one(func, "body")
        .ok_or_else(|| err("function without body"))?;
    if tree.kind(body) == NodeKind::BlockStatement && tree.children(body).len() == 1 {
        let only = tree.children(body)[0];
        if tree.kind(only) == NodeKind::ReturnStatement {
            if let Some(arg) = tree.get_one(only, "argument") {
                return Ok(JsVal::Lambda(arg));
            }
            return Err(err("return statement must return something"));
        }
    }
    Err(err(
        "only function expressions consisting of a single return statement are supported",
    ))
}

// ── numbers ───────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Num {
    I(i64),
    F(f64),
}

fn as_num(v: &JsVal) -> Result<Num> {
    match v {
        JsVal::Int(i) => Ok(Num::I(*i)),
        JsVal::Float(f) => Ok(Num::F(*f)),
        JsVal::Bool(b) => Ok(Num::I(if *b { 1 } else { 0 })),
        other => Err(err(format!(
            "operand is not a number: {}",
            other.to_js_string()
        ))),
    }
}

fn as_f64(n: Num) -> f64 {
    match n {
        Num::I(i) => i as f64,
        Num::F(f) => f,
    }
}

fn as_int(v: &JsVal) -> Result<i64> {
    match v {
        JsVal::Int(i) => Ok(*i),
        JsVal::Bool(b) => Ok(if *b { 1 } else { 0 }),
        _ => Err(err("bitwise operand is not an integer")),
    }
}

fn int_or_float(i: Option<i64>, fallback: f64) -> JsVal {
    match i {
        Some(v) => JsVal::Int(v),
        None => JsVal::Float(fallback),
    }
}

fn eval_binary(tree: &Tree, node: NodeId, partial: bool, depth: usize) -> Result<JsVal> {
    let left = tree.lhs(node)?;
    let right = tree.rhs(node)?;
    let op = tree
        .operator(node)
        .ok_or_else(|| err("binary expression without operator"))?
        .to_string();
    match op.as_str() {
        "instanceof" => Err(err("cannot handle 'instanceof' statically")),
        "in" => {
            let r = eval(tree, right, partial, depth + 1)?;
            match r {
                JsVal::Object(entries) => {
                    let l = eval(tree, left, partial, depth + 1)?;
                    let key = l.key_string();
                    Ok(JsVal::Bool(entries.iter().any(|(k, _)| *k == key)))
                }
                // 'in' never finds array *values*, only indices; treated
                // as false like the original
                JsVal::Array(_) => Ok(JsVal::Bool(false)),
                _ => Err(err("right-hand side of 'in' should be an object")),
            }
        }
        "+" => {
            let l = eval(tree, left, partial, depth + 1)?;
            let r = eval(tree, right, partial, depth + 1)?;
            if l.is_numeric_for_addition() && r.is_numeric_for_addition() {
                // numeric addition, null counts as 0
                let ln = as_num(if l == JsVal::Null { &JsVal::Int(0) } else { &l })
                    .unwrap_or(Num::I(0));
                let rn = as_num(if r == JsVal::Null { &JsVal::Int(0) } else { &r })
                    .unwrap_or(Num::I(0));
                match (ln, rn) {
                    (Num::I(a), Num::I(b)) => {
                        Ok(int_or_float(a.checked_add(b), a as f64 + b as f64))
                    }
                    _ => Ok(JsVal::Float(as_f64(ln) + as_f64(rn))),
                }
            } else {
                Ok(JsVal::Str(l.to_js_string() + &r.to_js_string()))
            }
        }
        "-" | "*" | "%" | "**" => {
            let l = as_num(&eval(tree, left, partial, depth + 1)?)?;
            let r = as_num(&eval(tree, right, partial, depth + 1)?)?;
            match (op.as_str(), l, r) {
                ("-", Num::I(a), Num::I(b)) => {
                    Ok(int_or_float(a.checked_sub(b), a as f64 - b as f64))
                }
                ("*", Num::I(a), Num::I(b)) => {
                    Ok(int_or_float(a.checked_mul(b), a as f64 * b as f64))
                }
                ("%", Num::I(a), Num::I(b)) => {
                    if b == 0 {
                        Ok(JsVal::nan())
                    } else {
                        Ok(JsVal::Int(a % b))
                    }
                }
                ("**", Num::I(a), Num::I(b)) if (0..=u32::MAX as i64).contains(&b) => Ok(
                    int_or_float(a.checked_pow(b as u32), (a as f64).powf(b as f64)),
                ),
                ("-", _, _) => Ok(JsVal::Float(as_f64(l) - as_f64(r))),
                ("*", _, _) => Ok(JsVal::Float(as_f64(l) * as_f64(r))),
                ("%", _, _) => Ok(JsVal::Float(as_f64(l) % as_f64(r))),
                _ => Ok(JsVal::Float(as_f64(l).powf(as_f64(r)))),
            }
        }
        "/" => {
            let l = as_f64(as_num(&eval(tree, left, partial, depth + 1)?)?);
            let r = as_f64(as_num(&eval(tree, right, partial, depth + 1)?)?);
            if r == 0.0 {
                // JS: 1/0 == Infinity, -1/0 == -Infinity, 0/0 == NaN
                Ok(JsVal::Float(if l > 0.0 {
                    f64::INFINITY
                } else if l < 0.0 {
                    f64::NEG_INFINITY
                } else {
                    f64::NAN
                }))
            } else {
                Ok(JsVal::Float(l / r))
            }
        }
        "|" | "^" | "&" | "<<" | ">>" => {
            let a = as_int(&eval(tree, left, partial, depth + 1)?)?;
            let b = as_int(&eval(tree, right, partial, depth + 1)?)?;
            let v = match op.as_str() {
                "|" => a | b,
                "^" => a ^ b,
                "&" => a & b,
                "<<" => a.checked_shl(b.try_into().unwrap_or(u32::MAX)).unwrap_or(0),
                _ => a.checked_shr(b.try_into().unwrap_or(u32::MAX)).unwrap_or(0),
            };
            Ok(JsVal::Int(v))
        }
        ">>>" => Err(err(">>> operator not supported")),
        "==" | "===" => {
            let l = eval(tree, left, partial, depth + 1)?;
            let r = eval(tree, right, partial, depth + 1)?;
            Ok(JsVal::Bool(l == r))
        }
        "!=" | "!==" => {
            let l = eval(tree, left, partial, depth + 1)?;
            let r = eval(tree, right, partial, depth + 1)?;
            Ok(JsVal::Bool(l != r))
        }
        "<" | ">" | "<=" | ">=" => {
            let l = eval(tree, left, partial, depth + 1)?;
            let r = eval(tree, right, partial, depth + 1)?;
            if l.is_nan() || r.is_nan() {
                return Ok(JsVal::Bool(false));
            }
            let ord = l
                .compare(&r)
                .ok_or_else(|| err("operands do not compare"))?;
            let result = match op.as_str() {
                "<" => ord.is_lt(),
                ">" => ord.is_gt(),
                "<=" => ord.is_le(),
                _ => ord.is_ge(),
            };
            Ok(JsVal::Bool(result))
        }
        other => Err(err(format!("unsupported binary operator: {}", other))),
    }
}

fn eval_unary(tree: &Tree, node: NodeId, partial: bool, depth: usize) -> Result<JsVal> {
    let op = tree
        .operator(node)
        .ok_or_else(|| err("unary expression without operator"))?
        .to_string();
    let arg_node = tree
        .get_one(node, "argument")
        .ok_or_else(|| err("unary expression without argument"))?;
    let arg = eval(tree, arg_node, partial, depth + 1)?;
    match op.as_str() {
        "+" | "-" => {
            let neg = op == "-";
            let numeric = |v: f64| -> JsVal {
                if neg {
                    JsVal::Float(-v)
                } else {
                    JsVal::Float(v)
                }
            };
            match &arg {
                // "+''" and "-''" are 0 in JS
                JsVal::Str(s) if s.is_empty() => Ok(JsVal::Int(0)),
                JsVal::Str(_) | JsVal::Object(_) => Ok(JsVal::nan()),
                JsVal::Array(items) => match items.as_slice() {
                    [] => Ok(JsVal::Int(0)),
                    [JsVal::Str(s)] if s.is_empty() => Ok(JsVal::Int(0)),
                    [JsVal::Int(i)] => Ok(JsVal::Int(if neg { -i } else { *i })),
                    [JsVal::Float(f)] => Ok(numeric(*f)),
                    _ => Ok(JsVal::nan()),
                },
                JsVal::Int(i) => Ok(JsVal::Int(if neg { -i } else { *i })),
                JsVal::Float(f) => Ok(numeric(*f)),
                JsVal::Bool(b) => {
                    let v = if *b { 1 } else { 0 };
                    Ok(JsVal::Int(if neg { -v } else { v }))
                }
                JsVal::Null => Ok(JsVal::Int(0)),
                JsVal::Lambda(_) => Ok(JsVal::nan()),
            }
        }
        "~" => match &arg {
            JsVal::Int(i) => Ok(JsVal::Int(!i)),
            JsVal::Bool(b) => Ok(JsVal::Int(!(if *b { 1 } else { 0 }))),
            JsVal::Float(f) => Ok(JsVal::Int(!(f.floor() as i64))),
            _ => Ok(JsVal::Int(-1)),
        },
        "!" => Ok(JsVal::Bool(!arg.is_truthy())),
        // removing a property succeeds in all static cases
        "delete" => Ok(JsVal::Bool(true)),
        "void" => Err(err("void expressions evaluate to undefined")),
        "typeof" => {
            let type_name = match &arg {
                JsVal::Int(_) | JsVal::Float(_) => "number",
                JsVal::Str(_) => "string",
                JsVal::Bool(_) => "boolean",
                JsVal::Array(_) | JsVal::Object(_) | JsVal::Null => "object",
                JsVal::Lambda(_) => "function",
            };
            Ok(JsVal::str(type_name))
        }
        other => Err(err(format!("unsupported unary operator: {}", other))),
    }
}

/// Identifier resolution honors `const` only.
fn eval_const_identifier(tree: &Tree, node: NodeId, partial: bool, depth: usize) -> Result<JsVal> {
    let name = tree.name(node).unwrap_or_default();
    let decl_ident = scoping::resolve_identifier(tree, node)
        .ok_or_else(|| err(format!("couldn't resolve identifier '{}'", name)))?;
    let declarator = tree
        .parent(decl_ident)
        .filter(|p| {
            tree.kind(*p) == NodeKind::VariableDeclarator
                && tree.get_one(*p, "id") == Some(decl_ident)
        })
        .ok_or_else(|| {
            err(format!(
                "identifier '{}' is not the id of a VariableDeclarator",
                name
            ))
        })?;
    let declaration = tree
        .parent(declarator)
        .ok_or_else(|| err("declarator without declaration"))?;
    if tree.attrs(declaration).decl_kind != Some(DeclKind::Const) {
        return Err(err(format!(
            "identifier '{}' doesn't refer to a constant",
            name
        )));
    }
    let init = tree
        .get_one(declarator, "init")
        .ok_or_else(|| err("missing = in const declaration"))?;
    eval(tree, init, partial, depth + 1)
}

fn eval_member(tree: &Tree, node: NodeId, partial: bool, depth: usize) -> Result<JsVal> {
    let object = tree
        .get_one(node, "object")
        .ok_or_else(|| err("member expression without object"))?;
    let property = tree
        .get_one(node, "property")
        .ok_or_else(|| err("member expression without property"))?;
    let computed = tree.attrs(node).computed;
    let obj = eval(tree, object, partial, depth + 1)?;
    match obj {
        JsVal::Array(items) => {
            if computed {
                let p = eval(tree, property, partial, depth + 1)?;
                match p {
                    JsVal::Int(i) if i >= 0 && (i as usize) < items.len() => {
                        Ok(items[i as usize].clone())
                    }
                    JsVal::Float(f) if f.fract() == 0.0 && f >= 0.0 => {
                        let i = f as usize;
                        items
                            .get(i)
                            .cloned()
                            .ok_or_else(|| err("array index out of bounds"))
                    }
                    JsVal::Str(s) if s == "length" => Ok(JsVal::Int(items.len() as i64)),
                    _ => Err(err("only integer and 'length' array accesses are supported")),
                }
            } else if tree.is_identifier_named(property, "length") {
                Ok(JsVal::Int(items.len() as i64))
            } else {
                Err(err("only .length is supported on arrays"))
            }
        }
        JsVal::Object(entries) => {
            let key = if computed {
                eval(tree, property, partial, depth + 1)?.key_string()
            } else if tree.is_identifier(property) {
                tree.name(property).unwrap_or_default().to_string()
            } else {
                return Err(err("unsupported non-computed member access"));
            };
            entries
                .iter()
                .rev()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| err(format!("no such key: {}", key)))
        }
        _ => Err(err("member access is only supported on arrays and objects")),
    }
}

fn eval_call(tree: &Tree, node: NodeId, partial: bool, depth: usize) -> Result<JsVal> {
    let callee = tree
        .get_one(node, "callee")
        .ok_or_else(|| err("call without callee"))?;
    let args = calls::call_arguments(tree, node);

    // calls to single-return user lambdas (no parameters supported)
    if let Ok(JsVal::Lambda(body)) = eval(tree, callee, partial, depth + 1) {
        if args.is_empty() {
            return eval(tree, body, partial, depth + 1);
        }
    }

    if tree.is_identifier(callee) {
        // only built-ins: a name with a visible user definition or any
        // incoming data flow is not statically evaluable
        if !tree.dd_parents_raw(callee).is_empty()
            || scoping::resolve_identifier(tree, callee).is_some()
        {
            return Err(err(
                "can only statically evaluate calls to built-in functions",
            ));
        }
        return match tree.name(callee).unwrap_or_default() {
            "isFinite" => builtin_is_finite(tree, &args, partial, depth),
            "isNaN" => builtin_is_nan(tree, &args, partial, depth),
            "parseFloat" => builtin_parse_float(tree, &args, partial, depth),
            "parseInt" => builtin_parse_int(tree, &args, partial, depth),
            "btoa" => builtin_btoa(tree, &args, partial, depth),
            "atob" => builtin_atob(tree, &args, partial, depth),
            other => Err(err(format!("'{}' built-in not supported", other))),
        };
    }

    if tree.kind(callee) == NodeKind::MemberExpression {
        let name = calls::member_expression_to_string(tree, callee);
        if name == "Object.defineProperty" {
            return builtin_define_property(tree, &args, partial, depth);
        }
        return Err(err(format!("'{}' built-in not supported", name)));
    }

    Err(err("unsupported callee kind"))
}

// ── built-ins ─────────────────────────────────────────────────────────

/// Python-like string-to-number coercion used by isFinite/isNaN
/// ("" is 0, "Infinity"/"inf" parse, anything else fails).
fn str_to_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return Some(0.0);
    }
    t.parse::<f64>().ok()
}

/// Coercion result for isFinite/isNaN: either a verdict or a nested
/// single-element array to descend into.
enum Coerced {
    Verdict(bool),
    Descend(JsVal),
}

fn builtin_is_finite(tree: &Tree, args: &[NodeId], partial: bool, depth: usize) -> Result<JsVal> {
    if args.is_empty() {
        return Ok(JsVal::Bool(false));
    }
    let mut v = eval(tree, args[0], partial, depth + 1)?;
    loop {
        let step = match &v {
            // isFinite(true) == true; only the array-wrapped bool
            // coerces via "true" and becomes NaN (handled below)
            JsVal::Int(_) | JsVal::Bool(_) | JsVal::Null => Coerced::Verdict(true),
            JsVal::Float(f) => Coerced::Verdict(f.is_finite()),
            JsVal::Object(_) | JsVal::Lambda(_) => Coerced::Verdict(false),
            JsVal::Str(s) => {
                Coerced::Verdict(str_to_number(s).map(|f| f.is_finite()).unwrap_or(false))
            }
            JsVal::Array(items) => match items.as_slice() {
                [] => Coerced::Verdict(true),
                [one] => match one {
                    JsVal::Null => Coerced::Verdict(true),
                    JsVal::Bool(_) => Coerced::Verdict(false),
                    JsVal::Object(_) | JsVal::Lambda(_) => Coerced::Verdict(false),
                    JsVal::Str(s) => {
                        Coerced::Verdict(str_to_number(s).map(|f| f.is_finite()).unwrap_or(false))
                    }
                    JsVal::Int(_) => Coerced::Verdict(true),
                    JsVal::Float(f) => Coerced::Verdict(f.is_finite()),
                    JsVal::Array(_) => Coerced::Descend(one.clone()),
                },
                _ => Coerced::Verdict(false),
            },
        };
        match step {
            Coerced::Verdict(b) => return Ok(JsVal::Bool(b)),
            Coerced::Descend(next) => v = next,
        }
    }
}

fn builtin_is_nan(tree: &Tree, args: &[NodeId], partial: bool, depth: usize) -> Result<JsVal> {
    if args.is_empty() {
        return Ok(JsVal::Bool(true));
    }
    let mut v = eval(tree, args[0], partial, depth + 1)?;
    loop {
        let step = match &v {
            JsVal::Int(_) | JsVal::Bool(_) | JsVal::Null => Coerced::Verdict(false),
            JsVal::Float(f) => Coerced::Verdict(f.is_nan()),
            JsVal::Object(_) | JsVal::Lambda(_) => Coerced::Verdict(true),
            JsVal::Str(s) => Coerced::Verdict(str_to_number(s).map(|f| f.is_nan()).unwrap_or(true)),
            JsVal::Array(items) => match items.as_slice() {
                [] => Coerced::Verdict(false),
                [one] => match one {
                    JsVal::Null => Coerced::Verdict(false),
                    // [true] coerces via "true" and is NaN
                    JsVal::Bool(_) => Coerced::Verdict(true),
                    JsVal::Object(_) | JsVal::Lambda(_) => Coerced::Verdict(true),
                    JsVal::Str(s) => {
                        Coerced::Verdict(str_to_number(s).map(|f| f.is_nan()).unwrap_or(true))
                    }
                    JsVal::Int(_) => Coerced::Verdict(false),
                    JsVal::Float(f) => Coerced::Verdict(f.is_nan()),
                    JsVal::Array(_) => Coerced::Descend(one.clone()),
                },
                _ => Coerced::Verdict(true),
            },
        };
        match step {
            Coerced::Verdict(b) => return Ok(JsVal::Bool(b)),
            Coerced::Descend(next) => v = next,
        }
    }
}

fn builtin_parse_float(tree: &Tree, args: &[NodeId], partial: bool, depth: usize) -> Result<JsVal> {
    if args.is_empty() {
        return Ok(JsVal::nan());
    }
    let mut v = eval(tree, args[0], partial, depth + 1)?;
    // parseFloat([[[3.14, 1], 2], 3]) == 3.14: descend head-first
    loop {
        let next = match &v {
            JsVal::Array(items) => match items.first() {
                Some(first) => Some(first.clone()),
                None => return Ok(JsVal::nan()),
            },
            _ => None,
        };
        match next {
            Some(n) => v = n,
            None => break,
        }
    }
    match v {
        JsVal::Bool(_) | JsVal::Object(_) | JsVal::Null | JsVal::Lambda(_) => Ok(JsVal::nan()),
        JsVal::Int(i) => Ok(JsVal::Int(i)),
        JsVal::Float(f) => Ok(JsVal::Float(f)),
        JsVal::Str(s) => {
            // longest prefix that parses as a number literal
            let t = s.trim_start();
            let mut boundaries: Vec<usize> = t.char_indices().map(|(i, _)| i).collect();
            boundaries.push(t.len());
            for &end in boundaries.iter().rev() {
                if end == 0 {
                    break;
                }
                if let Ok(f) = t[..end].parse::<f64>() {
                    return Ok(JsVal::Float(f));
                }
            }
            Ok(JsVal::nan())
        }
        JsVal::Array(_) => Ok(JsVal::nan()),
    }
}

fn builtin_parse_int(tree: &Tree, args: &[NodeId], partial: bool, depth: usize) -> Result<JsVal> {
    if args.is_empty() {
        return Ok(JsVal::nan());
    }
    let string_val = eval(tree, args[0], partial, depth + 1)?;
    let mut radix: u32 = 0;
    if args.len() >= 2 {
        let r = eval(tree, args[1], partial, depth + 1)?;
        let r = r.as_number().unwrap_or(f64::NAN);
        if r.is_nan() {
            radix = 0;
        } else {
            let r = r as i64;
            if r != 0 && !(2..=36).contains(&r) {
                return Ok(JsVal::nan());
            }
            radix = r.max(0) as u32;
        }
    }
    // null stringifies to "null" (parseInt(null, 36) == 1112745)
    let s = string_val.to_js_string();
    // JS stops at '_': parseInt("123_456") == 123
    let s = s.split('_').next().unwrap_or("");
    let s = s.trim();
    let mut chars = s.chars().peekable();
    let mut negative = false;
    if let Some(&c) = chars.peek() {
        if c == '+' || c == '-' {
            negative = c == '-';
            chars.next();
        }
    }
    let rest: String = chars.collect();
    let mut digits = rest.as_str();
    if radix == 0 {
        if digits.len() >= 2 && (digits.starts_with("0x") || digits.starts_with("0X")) {
            radix = 16;
            digits = &digits[2..];
        } else {
            radix = 10;
        }
    } else if radix == 16 && (digits.starts_with("0x") || digits.starts_with("0X")) {
        digits = &digits[2..];
    }
    let mut value: i128 = 0;
    let mut consumed = 0usize;
    for c in digits.chars() {
        match c.to_digit(36) {
            Some(d) if d < radix => {
                value = value.saturating_mul(radix as i128).saturating_add(d as i128);
                consumed += 1;
            }
            _ => break,
        }
    }
    if consumed == 0 {
        return Ok(JsVal::nan());
    }
    if negative {
        value = -value;
    }
    match i64::try_from(value) {
        Ok(i) => Ok(JsVal::Int(i)),
        Err(_) => Ok(JsVal::Float(value as f64)),
    }
}

fn builtin_btoa(tree: &Tree, args: &[NodeId], partial: bool, depth: usize) -> Result<JsVal> {
    let arg = args
        .first()
        .ok_or_else(|| err("btoa requires at least 1 argument"))?;
    let v = eval(tree, *arg, partial, depth + 1)?;
    let s = match v {
        JsVal::Array(_) | JsVal::Object(_) | JsVal::Lambda(_) => {
            return Err(err("btoa of containers is not supported"))
        }
        other => other.to_js_string(),
    };
    if !s.is_ascii() {
        return Err(err("btoa cannot handle non-ASCII input"));
    }
    Ok(JsVal::Str(BASE64.encode(s.as_bytes())))
}

fn builtin_atob(tree: &Tree, args: &[NodeId], partial: bool, depth: usize) -> Result<JsVal> {
    let arg = args
        .first()
        .ok_or_else(|| err("atob requires at least 1 argument"))?;
    let v = eval(tree, *arg, partial, depth + 1)?;
    let JsVal::Str(s) = v else {
        return Err(err("atob of non-strings is not supported"));
    };
    let bytes = BASE64
        .decode(s.as_bytes())
        .map_err(|e| err(format!("atob: invalid base64: {}", e)))?;
    let decoded = String::from_utf8(bytes).map_err(|_| err("atob cannot handle non-ASCII"))?;
    if !decoded.is_ascii() {
        return Err(err("atob cannot handle non-ASCII"));
    }
    Ok(JsVal::Str(decoded))
}

/// `Object.defineProperty(obj, prop, descriptor)` returns the augmented
/// object; in partial mode an unevaluable target degrades to `{}`.
fn builtin_define_property(
    tree: &Tree,
    args: &[NodeId],
    partial: bool,
    depth: usize,
) -> Result<JsVal> {
    if args.len() < 3 {
        return Err(err("Object.defineProperty() must take >= 3 args"));
    }
    let mut obj = match eval(tree, args[0], partial, depth + 1) {
        Ok(o) => o,
        Err(_) if partial => JsVal::Object(vec![]),
        Err(e) => return Err(e),
    };
    if !matches!(obj, JsVal::Object(_)) {
        if partial {
            obj = JsVal::Object(vec![]);
        } else {
            return Err(err("Object.defineProperty() target is not an object"));
        }
    }
    let prop = eval(tree, args[1], partial, depth + 1)?.key_string();
    let descriptor = eval(tree, args[2], partial, depth + 1)?;
    if !matches!(descriptor, JsVal::Object(_)) {
        return Err(err("invalid descriptor in Object.defineProperty()"));
    }
    let has = |k: &str| descriptor.object_get(k).is_some();
    if (has("value") || has("writable")) && (has("get") || has("set")) {
        return Err(err("invalid descriptor in Object.defineProperty()"));
    }
    let value = if has("get") || has("set") {
        match descriptor.object_get("get") {
            Some(JsVal::Lambda(body)) => eval(tree, *body, partial, depth + 1)?,
            Some(_) => return Err(err("'get' of accessor descriptor is not a function")),
            None => return Err(err("accessor descriptor without 'get' is not supported")),
        }
    } else {
        descriptor
            .object_get("value")
            .cloned()
            .ok_or_else(|| err("data descriptor without 'value' is not supported"))?
    };
    obj.object_set(prop, value);
    Ok(obj)
}
