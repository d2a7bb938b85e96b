//! End-to-end analysis scenarios over builder-constructed extension
//! scripts: the classic exfiltration/infiltration shapes a
//! renderer-attacker analysis must (and must not) flag.

use pretty_assertions::assert_eq;
use serde_json::Value;

use crxgraph_core::config::AnalysisConfig;
use crxgraph_core::features::ast::{builder as b, estree, Tree};
use crxgraph_core::features::vuln::{analyze_side, Side};
use crxgraph_core::shared::deadline::Deadline;

fn load(doc: Value, filename: &str) -> Tree {
    estree::load_document(&doc, filename, None).unwrap()
}

/// chrome.runtime.onMessage.addListener((msg, sender, sendResponse) => { <body>; return true; });
fn bp_listener(body: Vec<Value>) -> Value {
    let mut stmts = body;
    stmts.push(b::ret(Some(b::lit_bool(true))));
    b::expr_stmt(b::call(
        b::member_path(&["chrome", "runtime", "onMessage", "addListener"]),
        vec![b::arrow(
            vec![b::ident("msg"), b::ident("sender"), b::ident("sendResponse")],
            stmts,
        )],
    ))
}

/// chrome.cookies.getAll({}, function(cookies) { <body> });
fn get_all_cookies(body: Vec<Value>) -> Value {
    b::expr_stmt(b::call(
        b::member_path(&["chrome", "cookies", "getAll"]),
        vec![
            b::object(vec![]),
            b::func_expr(None, vec![b::ident("cookies")], body),
        ],
    ))
}

#[test]
fn s1_bp_exfiltration_of_cookies_via_send_response() {
    let tree = load(
        b::program(vec![bp_listener(vec![get_all_cookies(vec![b::expr_stmt(
            b::call(b::ident("sendResponse"), vec![b::ident("cookies")]),
        )])])]),
        "bp.js",
    );
    let findings = analyze_side(
        &tree,
        Side::Bp,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert_eq!(findings.exfiltration_dangers.len(), 1);
    let danger = &findings.exfiltration_dangers[0];
    assert_eq!(danger.source.as_deref(), Some("chrome.cookies"));
    assert_eq!(danger.rendezvous.kind, "CallExpression");
    assert_eq!(danger.from_flow.first().unwrap().identifier, "cookies");
    assert_eq!(danger.to_flow.first().unwrap().identifier, "sendResponse");
    assert!(findings.infiltration_dangers.is_empty());
}

#[test]
fn s2_sender_url_check_suppresses_the_danger() {
    // the whole handler body is guarded by
    // if (sender.url === "https://admin.com/") { ... }
    let tree = load(
        b::program(vec![bp_listener(vec![b::if_stmt(
            b::bin(
                "===",
                b::member(b::ident("sender"), b::ident("url")),
                b::lit_str("https://admin.com/"),
            ),
            b::block(vec![get_all_cookies(vec![b::expr_stmt(b::call(
                b::ident("sendResponse"),
                vec![b::ident("cookies")],
            ))])]),
            None,
        )])]),
        "bp.js",
    );

    // default: the verified flow is considered safe
    let findings = analyze_side(
        &tree,
        Side::Bp,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert!(findings.exfiltration_dangers.is_empty());

    // with return-safe-flows-verified the danger is retained
    let config = AnalysisConfig {
        return_safe_flows_verified: true,
        ..AnalysisConfig::default()
    };
    let findings = analyze_side(&tree, Side::Bp, &config, &Deadline::unlimited()).unwrap();
    assert_eq!(findings.exfiltration_dangers.len(), 1);
}

/// chrome.runtime.onMessage.addListener((msg) => { <body> });
fn cs_listener(body: Vec<Value>) -> Value {
    b::expr_stmt(b::call(
        b::member_path(&["chrome", "runtime", "onMessage", "addListener"]),
        vec![b::arrow(vec![b::ident("msg")], body)],
    ))
}

#[test]
fn s3_cs_uxss_via_inner_html() {
    // document.body.innerHTML = msg.payload;
    let tree = load(
        b::program(vec![cs_listener(vec![b::expr_stmt(b::assign(
            "=",
            b::member_path(&["document", "body", "innerHTML"]),
            b::member(b::ident("msg"), b::ident("payload")),
        ))])]),
        "cs.js",
    );
    let findings = analyze_side(
        &tree,
        Side::Cs,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert_eq!(findings.infiltration_dangers.len(), 1);
    let danger = &findings.infiltration_dangers[0];
    assert_eq!(danger.rendezvous.kind, "AssignmentExpression");
    assert_eq!(danger.from_flow.first().unwrap().identifier, "msg");
    assert!(findings.exfiltration_dangers.is_empty());
}

#[test]
fn s4_uxss_sanitized_by_replace_with_sufficient_regex() {
    // document.body.innerHTML = msg.payload.replace(/\W/g, "");
    let tree = load(
        b::program(vec![cs_listener(vec![b::expr_stmt(b::assign(
            "=",
            b::member_path(&["document", "body", "innerHTML"]),
            b::call(
                b::member(
                    b::member(b::ident("msg"), b::ident("payload")),
                    b::ident("replace"),
                ),
                vec![b::lit_regex("\\W", "g"), b::lit_str("")],
            ),
        ))])]),
        "cs.js",
    );
    let config = AnalysisConfig {
        check_for_uxss_sanitization: true,
        ..AnalysisConfig::default()
    };
    let findings = analyze_side(&tree, Side::Cs, &config, &Deadline::unlimited()).unwrap();
    assert!(findings.infiltration_dangers.is_empty());

    // without the sanitization check the flow is still reported
    let findings = analyze_side(
        &tree,
        Side::Cs,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert_eq!(findings.infiltration_dangers.len(), 1);
}

#[test]
fn s5_statically_unreachable_rendezvous_is_dropped() {
    // if (1 === 2) { sendResponse(cookies); }
    let tree = load(
        b::program(vec![bp_listener(vec![get_all_cookies(vec![b::if_stmt(
            b::bin("===", b::lit_int(1), b::lit_int(2)),
            b::block(vec![b::expr_stmt(b::call(
                b::ident("sendResponse"),
                vec![b::ident("cookies")],
            ))]),
            None,
        )])])]),
        "bp.js",
    );
    let findings = analyze_side(
        &tree,
        Side::Bp,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert!(findings.exfiltration_dangers.is_empty());
}

#[test]
fn s6_indexed_db_source_reaches_send_response() {
    // indexedDB.open("db").onsuccess = e => { sendResponse(e.target.result.pw); };
    let tree = load(
        b::program(vec![bp_listener(vec![b::expr_stmt(b::assign(
            "=",
            b::member(
                b::call(
                    b::member_path(&["indexedDB", "open"]),
                    vec![b::lit_str("db")],
                ),
                b::ident("onsuccess"),
            ),
            b::arrow(
                vec![b::ident("e")],
                vec![b::expr_stmt(b::call(
                    b::ident("sendResponse"),
                    vec![b::member_path(&["e", "target", "result", "pw"])],
                ))],
            ),
        ))])]),
        "bp.js",
    );
    let findings = analyze_side(
        &tree,
        Side::Bp,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert_eq!(findings.exfiltration_dangers.len(), 1);
    let danger = &findings.exfiltration_dangers[0];
    assert_eq!(danger.source.as_deref(), Some("indexedDB"));
    assert_eq!(danger.to_flow.first().unwrap().identifier, "sendResponse");
}

#[test]
fn ignored_source_drops_the_finding() {
    let tree = load(
        b::program(vec![bp_listener(vec![b::expr_stmt(b::assign(
            "=",
            b::member(
                b::call(
                    b::member_path(&["indexedDB", "open"]),
                    vec![b::lit_str("db")],
                ),
                b::ident("onsuccess"),
            ),
            b::arrow(
                vec![b::ident("e")],
                vec![b::expr_stmt(b::call(
                    b::ident("sendResponse"),
                    vec![b::member_path(&["e", "target", "result", "pw"])],
                ))],
            ),
        ))])]),
        "bp.js",
    );
    let config = AnalysisConfig {
        ignored_sources: vec!["indexedDB".to_string()],
        ..AnalysisConfig::default()
    };
    let findings = analyze_side(&tree, Side::Bp, &config, &Deadline::unlimited()).unwrap();
    assert!(findings.exfiltration_dangers.is_empty());
}

#[test]
fn violation_31_reported_only_without_privileged_api_access() {
    // an unauthenticated listener, no privileged API anywhere
    let tree = load(
        b::program(vec![bp_listener(vec![b::expr_stmt(b::call(
            b::ident("sendResponse"),
            vec![b::lit_str("pong")],
        ))])]),
        "bp.js",
    );
    let config = AnalysisConfig {
        include_31_violations_without_privileged_api_access: true,
        ..AnalysisConfig::default()
    };
    let findings = analyze_side(&tree, Side::Bp, &config, &Deadline::unlimited()).unwrap();
    assert_eq!(findings.violations_31_without_sensitive_api_access.len(), 1);

    // default config: the category stays empty
    let findings = analyze_side(
        &tree,
        Side::Bp,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert!(findings.violations_31_without_sensitive_api_access.is_empty());
}

#[test]
fn storage_accesses_are_collected_per_side() {
    let tree = load(
        b::program(vec![b::expr_stmt(b::call(
            b::member_path(&["chrome", "storage", "local", "get"]),
            vec![b::array(vec![b::lit_str("token")]), b::ident("cb")],
        ))]),
        "bp.js",
    );
    let findings = analyze_side(
        &tree,
        Side::Bp,
        &AnalysisConfig::default(),
        &Deadline::unlimited(),
    )
    .unwrap();
    assert_eq!(findings.extension_storage_accesses.len(), 1);
    assert_eq!(findings.extension_storage_accesses[0].call, "chrome.storage.local.get");

    // ext-storage-accesses-only disables the flow rules but keeps these
    let config = AnalysisConfig {
        ext_storage_accesses_only: true,
        ..AnalysisConfig::default()
    };
    let findings = analyze_side(&tree, Side::Bp, &config, &Deadline::unlimited()).unwrap();
    assert_eq!(findings.extension_storage_accesses.len(), 1);
}
