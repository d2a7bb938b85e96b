/*
 * Message-listener models.
 *
 * Two kinds:
 *   1. chrome|browser.runtime.onMessage.addListener(
 *          (message, sender, sendResponse) => ...)
 *   2. <port>.onMessage.addListener((message, port) => ...)
 *      where the port's `sender` property carries the MessageSender
 *      (present for ports inside onConnect handlers as well).
 */

use crate::errors::Result;
use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::flow_graph::infrastructure::dfg;
use crate::features::flow_graph::{DataFlow, FlowStrategy};
use crate::shared::deadline::Deadline;
use crate::shared::models::NodeId;

use super::calls;
use super::func::Func;
use super::scoping::param_binding_identifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    RuntimeOnMessage,
    PortOnMessage,
}

const RUNTIME_LISTENER_NAMES: &[&str] = &[
    "chrome.runtime.onMessage.addListener",
    "browser.runtime.onMessage.addListener",
    "chrome.runtime.onMessageExternal.addListener",
    "browser.runtime.onMessageExternal.addListener",
];

#[derive(Debug, Clone, Copy)]
pub struct MessageListener {
    pub kind: ListenerKind,
    /// the addListener(...) call
    pub call: NodeId,
    pub func: Func,
}

impl MessageListener {
    /// Discover every message listener in the script, in source order.
    pub fn find_all(tree: &Tree) -> Vec<MessageListener> {
        let mut out = Vec::new();
        for call in tree.nodes_of_kind(NodeKind::CallExpression) {
            let full_name = calls::call_full_name(tree, call);
            let kind = if RUNTIME_LISTENER_NAMES.contains(&full_name.as_str()) {
                ListenerKind::RuntimeOnMessage
            } else if full_name.ends_with(".onMessage.addListener") {
                ListenerKind::PortOnMessage
            } else {
                continue;
            };
            let Some(&handler_arg) = calls::call_arguments(tree, call).first() else {
                continue;
            };
            let func = Func::from_node(tree, handler_arg, true)
                .or_else(|_| Func::from_node(tree, handler_arg, false));
            match func {
                Ok(func) => out.push(MessageListener { kind, call, func }),
                Err(e) => {
                    tracing::debug!(
                        file = tree.filename(),
                        line = tree.line_number(call),
                        error = %e,
                        "message listener handler could not be resolved"
                    );
                }
            }
        }
        out
    }

    pub fn body(&self, tree: &Tree) -> Option<NodeId> {
        self.func.body(tree)
    }

    /// The raw message parameter (Identifier or destructuring pattern).
    pub fn message_param(&self, tree: &Tree) -> Option<NodeId> {
        self.func.nth_param(tree, 0)
    }

    pub fn message_identifiers(&self, tree: &Tree) -> Vec<NodeId> {
        self.message_param(tree)
            .map(|p| param_binding_identifiers(tree, p))
            .unwrap_or_default()
    }

    /// Identifiers through which the MessageSender is reachable.
    pub fn sender_identifiers(&self, tree: &Tree, deadline: &Deadline) -> Result<Vec<NodeId>> {
        let Some(param) = self.func.nth_param(tree, 1) else {
            return Ok(Vec::new());
        };
        match self.kind {
            ListenerKind::RuntimeOnMessage => Ok(param_binding_identifiers(tree, param)),
            ListenerKind::PortOnMessage => {
                // the sender hides behind the port: follow flows out of
                // the port parameter that access exactly `.sender`
                match tree.kind(param) {
                    NodeKind::Identifier | NodeKind::AssignmentPattern => {
                        let Some(ident) = self.func.nth_param_identifier(tree, 1) else {
                            return Ok(Vec::new());
                        };
                        let flows: Vec<DataFlow> = dfg::all_continued_beginning_at(
                            tree,
                            ident,
                            FlowStrategy::OnePerNodeShortest,
                            deadline,
                        )?;
                        Ok(flows
                            .into_iter()
                            .filter(|f| f.accessed_members(tree, false, false) == ["sender"])
                            .map(|f| f.last_node())
                            .collect())
                    }
                    NodeKind::ObjectPattern => {
                        // ({sender}) or ({sender: s}) destructuring
                        for prop in tree.children(param) {
                            let Some(&key) = tree.children(*prop).first() else {
                                continue;
                            };
                            if tree.is_identifier_named(key, "sender") {
                                if let Some(&value) = tree.children(*prop).get(1) {
                                    if tree.is_identifier(value) {
                                        return Ok(vec![value]);
                                    }
                                }
                            }
                        }
                        Ok(Vec::new())
                    }
                    other => {
                        tracing::warn!(
                            file = tree.filename(),
                            line = tree.line_number(param),
                            "port parameter destructured into a {}",
                            other
                        );
                        Ok(Vec::new())
                    }
                }
            }
        }
    }

    /// The sendResponse parameter (runtime listeners only).
    pub fn send_response_identifier(&self, tree: &Tree) -> Option<NodeId> {
        match self.kind {
            ListenerKind::RuntimeOnMessage => self.func.nth_param_identifier(tree, 2),
            ListenerKind::PortOnMessage => None,
        }
    }

    /// Member expressions inside the listener body carrying the sender's
    /// url or origin (`sender.url`, `sender.tab.url`, `s.origin` after
    /// `let s = port.sender` ...).
    pub fn sender_url_expressions(&self, tree: &Tree, deadline: &Deadline) -> Result<Vec<NodeId>> {
        let Some(body) = self.body(tree) else {
            return Ok(Vec::new());
        };
        let sender_idents = self.sender_identifiers(tree, deadline)?;
        if sender_idents.is_empty() {
            return Ok(Vec::new());
        }
        Ok(tree
            .descendants_of_kind(body, NodeKind::MemberExpression)
            .into_iter()
            .filter(|m| {
                let as_string = calls::member_expression_to_string(tree, *m);
                as_string.ends_with(".url") || as_string.ends_with(".origin")
            })
            .filter(|m| {
                calls::member_leftmost(tree, *m)
                    .map(|base| {
                        tree.is_identifier(base)
                            && derives_from_any(tree, base, &sender_idents)
                    })
                    .unwrap_or(false)
            })
            .collect())
    }
}

/// Whether `ident` is one of `origins` or has a data-flow path from one.
fn derives_from_any(tree: &Tree, ident: NodeId, origins: &[NodeId]) -> bool {
    if origins.contains(&ident) {
        return true;
    }
    let mut seen = vec![ident];
    let mut queue = vec![ident];
    while let Some(node) = queue.pop() {
        for parent in crate::features::data_flow::flow_parents(tree, node) {
            if origins.contains(&parent) {
                return true;
            }
            if !seen.contains(&parent) {
                seen.push(parent);
                queue.push(parent);
            }
        }
    }
    false
}
