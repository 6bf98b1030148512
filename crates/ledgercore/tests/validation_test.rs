// crates/ledgercore/tests/validation_test.rs

use ledgercore::{validate, Branch, Connection, NodeSpec, NodeType, Workflow};
use serde_json::json;

fn audit(id: &str) -> NodeSpec {
    NodeSpec::new(id, NodeType::AuditLog)
}

fn chain(ids: &[&str]) -> Workflow {
    let mut wf = Workflow::new("chain");
    for id in ids {
        wf.add_node(audit(id));
    }
    for pair in ids.windows(2) {
        wf.connect(pair[0], pair[1]);
    }
    wf
}

fn condition(id: &str) -> NodeSpec {
    NodeSpec::new(id, NodeType::Condition)
        .with_config("fieldPath", "input.amount")
        .with_config("operator", "greater_than")
        .with_config("compareValue", 100)
}

#[test]
fn test_valid_chain_passes() {
    let report = validate(&chain(&["a", "b", "c"]));
    assert!(report.is_valid, "unexpected errors: {:?}", report.errors);
    assert!(report.errors.is_empty());
}

#[test]
fn test_unknown_target_is_named() {
    let mut wf = chain(&["a", "b"]);
    wf.connect("b", "ghost");

    let report = validate(&wf);
    assert!(!report.is_valid);
    assert!(
        report.errors.iter().any(|e| e == "unknown node reference: ghost"),
        "errors were {:?}",
        report.errors
    );
}

#[test]
fn test_empty_name_and_no_nodes() {
    let wf = Workflow::new("  ");
    let report = validate(&wf);
    assert!(!report.is_valid);
    assert!(report.errors.iter().any(|e| e.contains("name must not be empty")));
    assert!(report.errors.iter().any(|e| e.contains("at least one node")));
}

#[test]
fn test_duplicate_node_ids() {
    let mut wf = chain(&["a"]);
    wf.add_node(audit("a"));
    let report = validate(&wf);
    assert!(report.errors.contains(&"duplicate node id: a".to_string()));
}

#[test]
fn test_self_loop_rejected() {
    let mut wf = chain(&["a", "b"]);
    wf.connect("b", "b");
    let report = validate(&wf);
    assert!(report.errors.contains(&"self-loop on node: b".to_string()));
    assert!(
        !report.errors.iter().any(|e| e.starts_with("cycle detected")),
        "a self-loop is reported once, not as a cycle"
    );
}

#[test]
fn test_duplicate_connection_rejected() {
    let mut wf = chain(&["a", "b"]);
    wf.connect("a", "b");
    let report = validate(&wf);
    assert!(report.errors.iter().any(|e| e.starts_with("duplicate connection: a -> b")));
}

#[test]
fn test_cycle_reports_path() {
    let mut wf = chain(&["a", "b", "c"]);
    wf.connect("c", "a");

    let report = validate(&wf);
    assert!(!report.is_valid);
    let cycle = report
        .errors
        .iter()
        .find(|e| e.starts_with("cycle detected: "))
        .expect("cycle error");
    let path: Vec<&str> = cycle["cycle detected: ".len()..].split(" -> ").collect();
    assert_eq!(path.first(), path.last(), "path should close on itself");
    for id in ["a", "b", "c"] {
        assert!(path.contains(&id), "{} missing from {}", id, cycle);
    }
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let mut wf = chain(&["a", "b", "d"]);
    wf.add_node(audit("c"));
    wf.connect("a", "c");
    wf.connect("c", "d");
    assert!(validate(&wf).is_valid);
}

#[test]
fn test_tax_regime_required_and_checked() {
    let mut wf = Workflow::new("tax");
    wf.add_node(NodeSpec::new("missing", NodeType::TaxCalculator));
    wf.add_node(NodeSpec::new("bad", NodeType::TaxCalculator).with_config("taxRegime", "flat"));
    wf.add_node(NodeSpec::new("good", NodeType::TaxCalculator).with_config("taxRegime", "new"));

    let report = validate(&wf);
    assert_eq!(report.errors.len(), 2, "errors were {:?}", report.errors);
    assert!(report.errors[0].starts_with("node missing: taxRegime is required"));
    assert!(report.errors[1].starts_with("node bad: unknown tax regime 'flat'"));
}

#[test]
fn test_condition_config_shape() {
    let mut wf = Workflow::new("cond");
    wf.add_node(NodeSpec::new("c", NodeType::Condition).with_config("operator", "between"));

    let report = validate(&wf);
    assert!(report.errors.iter().any(|e| e.contains("fieldPath")));
    assert!(report.errors.iter().any(|e| e.contains("unknown operator 'between'")));
    assert!(report.errors.iter().any(|e| e.contains("compareValue")));
}

#[test]
fn test_branch_label_only_from_condition() {
    let mut wf = Workflow::new("branches");
    wf.add_node(condition("check"));
    wf.add_node(audit("yes"));
    wf.add_node(audit("after"));
    wf.connect_branch("check", "yes", Branch::True);
    wf.connect_branch("yes", "after", Branch::False);

    let report = validate(&wf);
    assert_eq!(report.errors.len(), 1, "errors were {:?}", report.errors);
    assert!(report.errors[0].contains("non-condition node: yes"));
}

#[test]
fn test_other_node_shapes() {
    let mut wf = Workflow::new("shapes");
    wf.add_node(NodeSpec::new("gst", NodeType::GstProcessor).with_config("gstRate", 18));
    wf.add_node(NodeSpec::new("wait", NodeType::Delay).with_config("delayMs", -5));
    wf.add_node(NodeSpec::new("mail", NodeType::EmailSender).with_config("recipients", "a@b.c"));
    wf.add_node(NodeSpec::new("sheet", NodeType::GoogleSheetsAction).with_config("operation", "upsert"));
    wf.add_node(
        NodeSpec::new("xf", NodeType::DataTransformer)
            .with_config("transformations", json!([{ "sourceField": "a", "operation": "copy" }])),
    );
    wf.add_node(audit("slow").with_timeout(0));

    let report = validate(&wf);
    let has = |needle: &str| report.errors.iter().any(|e| e.contains(needle));
    assert!(has("node gst: gstRate"));
    assert!(has("node wait: delayMs"));
    assert!(has("node mail: recipients"));
    assert!(has("node sheet: unknown sheet operation 'upsert'"));
    assert!(has("node xf: transformations[0].targetField is required"));
    assert!(has("node slow: timeout_ms must be positive"));
}

#[test]
fn test_validation_collects_every_error() {
    let mut wf = Workflow::new("");
    wf.add_node(audit("a"));
    wf.connections.push(Connection::new("a", "nowhere"));
    wf.connections.push(Connection::new("elsewhere", "a"));

    let report = validate(&wf);
    assert_eq!(report.errors.len(), 3, "errors were {:?}", report.errors);
    assert!(report.into_result().is_err());
}
