/*
 * Per-class vulnerability rules.
 *
 * Each rule wires a (sources, sinks, rendezvous kinds, filters) triple
 * into the flow-pair matcher. Sides differ in what counts as privileged
 * and what counts as an exit:
 *
 *   BP exfiltration:  sensitive-API results -> sendResponse /
 *                     port.postMessage / tabs.sendMessage
 *   BP infiltration:  listener message -> executeScript/insertCSS/eval
 *   CS exfiltration:  sendMessage response data -> window.postMessage
 *   CS infiltration:  listener message, window "message" events ->
 *                     DOM injection sinks
 *   plus 3.1 violations (unauthenticated listeners without privileged
 *   API use) and extension-storage accesses.
 */

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::features::ast::domain::NodeKind;
use crate::features::ast::Tree;
use crate::features::double_flow::{data_flows_into_sink, MatchProfile};
use crate::features::pdg::calls;
use crate::features::pdg::func::Func;
use crate::features::pdg::listeners::{ListenerKind, MessageListener};
use crate::shared::deadline::Deadline;
use crate::shared::models::NodeId;

use super::super::domain::{
    DangerRecord, SideFindings, ViolationRecord, BP_INJECTION_SINKS, BP_MESSAGE_EXIT_SINKS,
    CS_EXFILTRATION_SINK_SUFFIXES, DOM_INJECTION_SINK_CALLS, DOM_INJECTION_SINK_CALL_SUFFIXES,
    DOM_INJECTION_SINK_PROPERTIES,
};
use super::{auth, sources, storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bp,
    Cs,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Bp => "bp",
            Side::Cs => "cs",
        }
    }
}

/// Run every enabled rule family for one side.
pub fn analyze_side(
    tree: &Tree,
    side: Side,
    config: &AnalysisConfig,
    deadline: &Deadline,
) -> Result<SideFindings> {
    let mut findings = SideFindings::default();

    if !config.ignore_storage_related_vuln {
        findings.extension_storage_accesses = storage::extension_storage_accesses(tree, deadline)?;
    }
    if config.ext_storage_accesses_only || config.ignore_message_related_vuln {
        return Ok(findings);
    }

    let listeners = MessageListener::find_all(tree);
    // who *initiates* the connection decides which ignore flag applies:
    // a BP-side runtime listener answers CS-initiated messaging, a
    // CS-side one answers BP-initiated messaging
    let listeners_ignored = match side {
        Side::Bp => config.ignore_cs_initiated_messaging,
        Side::Cs => config.ignore_bp_initiated_messaging,
    };
    let verified: Vec<bool> = listeners
        .iter()
        .map(|l| {
            auth::listener_is_sender_verified(tree, l, config.consider_http_as_safe, deadline)
        })
        .collect();
    let skip_listener = |i: usize| verified[i] && !config.return_safe_flows_verified;

    let apis = config.sensitive_apis();
    let base_profile = MatchProfile {
        return_multiple: config.return_multiple_flow_variants,
        strategy: config.data_flows_considered,
        check_for_uxss_sanitization: false,
        ..MatchProfile::default()
    };
    let check_uxss =
        config.check_for_uxss_sanitization && !config.return_safe_flows_sanitized;
    // Per-sink rendezvous kinds: a property sink meets its source at the
    // assignment (a call on the way, like .replace(...), must not shadow
    // it as the nearest ancestor), a call sink meets it at the call.
    let uxss_assign_profile = MatchProfile {
        check_for_uxss_sanitization: check_uxss,
        rendezvous_kinds: vec![NodeKind::AssignmentExpression],
        ..base_profile.clone()
    };
    let uxss_call_profile = MatchProfile {
        check_for_uxss_sanitization: check_uxss,
        rendezvous_kinds: vec![NodeKind::CallExpression],
        ..base_profile.clone()
    };
    let call_profile = MatchProfile {
        rendezvous_kinds: vec![NodeKind::CallExpression],
        ..base_profile.clone()
    };

    match side {
        Side::Bp => {
            if !config.ignore_exfiltration_dangers {
                let srcs = sources::sensitive_source_params(tree, tree.root(), &apis);
                if !listeners_ignored {
                    for (i, listener) in listeners.iter().enumerate() {
                        deadline.check()?;
                        if skip_listener(i) {
                            tracing::debug!(
                                file = tree.filename(),
                                line = tree.line_number(listener.call),
                                "sender-verified listener skipped"
                            );
                            continue;
                        }
                        let sinks = listener_exit_sinks(tree, listener);
                        collect_dangers(
                            tree,
                            &srcs,
                            &sinks,
                            &call_profile,
                            deadline,
                            &mut findings.exfiltration_dangers,
                        )?;
                    }
                }
                // unprompted BP -> CS messaging carries data without any
                // listener involved
                let exits = members_with_full_names(tree, BP_MESSAGE_EXIT_SINKS);
                collect_dangers(
                    tree,
                    &srcs,
                    &exits,
                    &call_profile,
                    deadline,
                    &mut findings.exfiltration_dangers,
                )?;
            }
            if !config.ignore_infiltration_dangers && !listeners_ignored {
                let sinks = injection_sink_nodes(tree, BP_INJECTION_SINKS, &[]);
                for (i, listener) in listeners.iter().enumerate() {
                    deadline.check()?;
                    if skip_listener(i) {
                        continue;
                    }
                    let msg_sources = listener_message_sources(tree, listener);
                    collect_dangers(
                        tree,
                        &msg_sources,
                        &sinks,
                        &uxss_call_profile,
                        deadline,
                        &mut findings.infiltration_dangers,
                    )?;
                }
            }
            if config.include_31_violations_without_privileged_api_access {
                let api_accessed =
                    !calls::sensitive_apis_accessed(tree, tree.root(), &apis).is_empty();
                if !api_accessed {
                    for (i, listener) in listeners.iter().enumerate() {
                        if verified[i] {
                            continue;
                        }
                        findings
                            .violations_31_without_sensitive_api_access
                            .push(ViolationRecord {
                                location: tree.location_string(listener.call),
                                filename: tree.filename().to_string(),
                                line_of_code: tree.line_of_code(listener.call),
                                listener: match listener.kind {
                                    ListenerKind::RuntimeOnMessage => {
                                        "runtime.onMessage".to_string()
                                    }
                                    ListenerKind::PortOnMessage => "port.onMessage".to_string(),
                                },
                            });
                    }
                }
            }
        }
        Side::Cs => {
            if !config.ignore_exfiltration_dangers && !config.ignore_cs_initiated_messaging {
                // data the BP handed back through sendMessage response
                // callbacks, exfiltrated into the page
                let srcs = send_message_response_sources(tree);
                let sinks = members_with_suffixes(tree, CS_EXFILTRATION_SINK_SUFFIXES);
                collect_dangers(
                    tree,
                    &srcs,
                    &sinks,
                    &call_profile,
                    deadline,
                    &mut findings.exfiltration_dangers,
                )?;
            }
            if !config.ignore_infiltration_dangers {
                let mut srcs: Vec<(String, NodeId)> = Vec::new();
                if !listeners_ignored {
                    for (i, listener) in listeners.iter().enumerate() {
                        if skip_listener(i) {
                            continue;
                        }
                        srcs.extend(listener_message_sources(tree, listener));
                    }
                }
                srcs.extend(window_message_event_sources(tree));
                let property_sinks = members_with_suffixes_of(tree, DOM_INJECTION_SINK_PROPERTIES);
                collect_dangers(
                    tree,
                    &srcs,
                    &property_sinks,
                    &uxss_assign_profile,
                    deadline,
                    &mut findings.infiltration_dangers,
                )?;
                let call_sinks = injection_sink_nodes(
                    tree,
                    DOM_INJECTION_SINK_CALLS,
                    DOM_INJECTION_SINK_CALL_SUFFIXES,
                );
                collect_dangers(
                    tree,
                    &srcs,
                    &call_sinks,
                    &uxss_call_profile,
                    deadline,
                    &mut findings.infiltration_dangers,
                )?;
            }
        }
    }

    Ok(findings)
}

fn collect_dangers(
    tree: &Tree,
    sources: &[(String, NodeId)],
    sinks: &[NodeId],
    profile: &MatchProfile,
    deadline: &Deadline,
    out: &mut Vec<DangerRecord>,
) -> Result<()> {
    for (api, src) in sources {
        for &sink in sinks {
            deadline.check()?;
            for double in data_flows_into_sink(tree, *src, sink, profile, deadline)? {
                let record = DangerRecord::from_double(tree, &double, api);
                if !out.contains(&record) {
                    out.push(record);
                }
            }
        }
    }
    Ok(())
}

/// Message exits reachable from one listener: its sendResponse parameter
/// and any port.postMessage inside its body.
fn listener_exit_sinks(tree: &Tree, listener: &MessageListener) -> Vec<NodeId> {
    let mut sinks = Vec::new();
    if let Some(sr) = listener.send_response_identifier(tree) {
        sinks.push(sr);
    }
    if let Some(body) = listener.body(tree) {
        for m in calls::member_expressions_ending_in(tree, body, ".postMessage") {
            sinks.push(m);
        }
    }
    sinks
}

/// The listener's message as flow-start nodes (raw params: Identifier or
/// ObjectPattern, both accepted by the matcher).
fn listener_message_sources(tree: &Tree, listener: &MessageListener) -> Vec<(String, NodeId)> {
    listener
        .message_param(tree)
        .into_iter()
        .filter(|p| {
            matches!(
                tree.kind(*p),
                NodeKind::Identifier | NodeKind::ObjectPattern
            )
        })
        .map(|p| ("message".to_string(), p))
        .collect()
}

/// Response-callback parameters of chrome|browser.runtime.sendMessage.
fn send_message_response_sources(tree: &Tree) -> Vec<(String, NodeId)> {
    let mut out = Vec::new();
    for call in tree.nodes_of_kind(NodeKind::CallExpression) {
        let full_name = calls::call_full_name(tree, call);
        if full_name != "chrome.runtime.sendMessage" && full_name != "browser.runtime.sendMessage"
        {
            continue;
        }
        for arg in calls::call_arguments(tree, call) {
            if let Ok(func) = Func::from_node(tree, arg, true) {
                for param in func.params(tree) {
                    out.push(("runtime.sendMessage response".to_string(), param));
                }
            }
        }
    }
    out
}

/// Handler parameters of window.addEventListener("message", handler).
fn window_message_event_sources(tree: &Tree) -> Vec<(String, NodeId)> {
    let mut out = Vec::new();
    for call in tree.nodes_of_kind(NodeKind::CallExpression) {
        let full_name = calls::call_full_name(tree, call);
        if full_name != "addEventListener" && !full_name.ends_with(".addEventListener") {
            continue;
        }
        let args = calls::call_arguments(tree, call);
        let Some(&event_name) = args.first() else {
            continue;
        };
        if tree.literal_value(event_name) != Some(&crate::shared::models::JsVal::str("message")) {
            continue;
        }
        let Some(&handler) = args.get(1) else {
            continue;
        };
        if let Ok(func) = Func::from_node(tree, handler, true) {
            for param in func.params(tree) {
                out.push(("window message event".to_string(), param));
            }
        }
    }
    out
}

/// Callee nodes (Identifier or MemberExpression) of calls matching the
/// exact names or member suffixes; these are the matcher's to-nodes.
fn injection_sink_nodes(tree: &Tree, names: &[&str], suffixes: &[&str]) -> Vec<NodeId> {
    let mut out = Vec::new();
    for call in tree.nodes_of_kind(NodeKind::CallExpression) {
        let full_name = calls::call_full_name(tree, call);
        let hit = names.contains(&full_name.as_str())
            || suffixes.iter().any(|s| full_name.ends_with(s));
        if !hit {
            continue;
        }
        if let Some(callee) = tree.get_one(call, "callee") {
            if matches!(
                tree.kind(callee),
                NodeKind::Identifier | NodeKind::MemberExpression
            ) {
                out.push(callee);
            }
        }
    }
    out
}

/// Member expressions with one of the exact normalized names.
fn members_with_full_names(tree: &Tree, names: &[&str]) -> Vec<NodeId> {
    tree.nodes_of_kind(NodeKind::MemberExpression)
        .filter(|m| {
            let s = calls::member_expression_to_string(tree, *m);
            names.contains(&s.as_str())
        })
        .collect()
}

/// Member expressions ending in one of the suffixes (".postMessage").
fn members_with_suffixes(tree: &Tree, suffixes: &[&str]) -> Vec<NodeId> {
    tree.nodes_of_kind(NodeKind::MemberExpression)
        .filter(|m| {
            let s = calls::member_expression_to_string(tree, *m);
            suffixes.iter().any(|suffix| s.ends_with(suffix))
        })
        .collect()
}

/// Member expressions whose accessed property is one of the names
/// (".innerHTML" and friends).
fn members_with_suffixes_of(tree: &Tree, properties: &[&str]) -> Vec<NodeId> {
    tree.nodes_of_kind(NodeKind::MemberExpression)
        .filter(|m| {
            let s = calls::member_expression_to_string(tree, *m);
            properties.iter().any(|p| s.ends_with(&format!(".{}", p)))
        })
        .collect()
}
