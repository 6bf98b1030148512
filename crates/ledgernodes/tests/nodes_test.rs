// crates/ledgernodes/tests/nodes_test.rs

use ledgercore::{
    Branch, Config, EventEmitter, NodeContext, NodeError, NodeExecutor, NodeType, SheetOperation,
    TaxRegime,
};
use ledgernodes::{
    calculate, format_inr, income_tax, is_valid_gstin, is_valid_pan, register_all, render,
    AuditLogNode, ClientIntakeNode, ComplianceCheckerNode, ConditionNode, DataTransformerNode,
    DelayNode, DocumentProcessorNode, EmailSenderNode, GoogleSheetsActionNode, GstProcessorNode,
    InMemorySpreadsheet, LogMailer, SampleExtractor, ScheduledTriggerNode, SheetRequest,
    SpreadsheetClient, TaxCalculatorNode, WebhookSpreadsheet,
};
use ledgerruntime::NodeRegistry;
use serde_json::{json, Value};
use std::sync::Arc;

fn config(value: Value) -> Config {
    match value {
        Value::Object(map) => map,
        other => panic!("config must be an object, got {}", other),
    }
}

fn ctx(cfg: Value) -> NodeContext {
    NodeContext::new("node_1", EventEmitter::detached("node_1")).with_config(config(cfg))
}

fn approx(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap_or_else(|| panic!("not a number: {}", value));
    assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
}

#[test]
fn test_tax_slabs() {
    assert_eq!(income_tax(250_000.0, TaxRegime::Old), 0.0);
    assert_eq!(income_tax(500_000.0, TaxRegime::Old), 12_500.0);
    assert_eq!(income_tax(1_200_000.0, TaxRegime::Old), 172_500.0);
    assert_eq!(income_tax(300_000.0, TaxRegime::New), 0.0);
    assert_eq!(income_tax(650_000.0, TaxRegime::New), 20_000.0);
    assert_eq!(income_tax(1_000_000.0, TaxRegime::New), 60_000.0);
    assert_eq!(income_tax(1_600_000.0, TaxRegime::New), 180_000.0);
}

#[tokio::test]
async fn test_tax_calculator_with_standard_deduction() {
    let node = TaxCalculatorNode;
    let out = node
        .execute(
            ctx(json!({ "taxRegime": "new", "includeDeductions": true }))
                .with_input("input", json!({ "grossIncome": 800_000 })),
        )
        .await
        .unwrap();

    approx(&out.data["deductions"], 150_000.0);
    approx(&out.data["taxableIncome"], 650_000.0);
    approx(&out.data["taxAmount"], 20_000.0);
    approx(&out.data["calculations"]["basicTax"], 16_000.0);
    approx(&out.data["calculations"]["surcharge"], 2_000.0);
    approx(&out.data["calculations"]["cess"], 800.0);
    assert_eq!(out.data["taxRegime"], "new");
    assert_eq!(out.data["assessmentYear"], "2024-25");
}

#[tokio::test]
async fn test_tax_calculator_reads_income_field_and_floors_at_zero() {
    let node = TaxCalculatorNode;
    let out = node
        .execute(
            ctx(json!({
                "taxRegime": "old",
                "incomeField": "extractedData.grossIncome",
                "includeDeductions": true,
                "deductions": 500_000
            }))
            .with_input("docs", json!({ "extractedData": { "grossIncome": "200000" } })),
        )
        .await
        .unwrap();

    approx(&out.data["grossIncome"], 200_000.0);
    approx(&out.data["taxableIncome"], 0.0);
    approx(&out.data["taxAmount"], 0.0);
}

#[tokio::test]
async fn test_tax_calculator_requires_income() {
    let err = TaxCalculatorNode
        .execute(ctx(json!({ "taxRegime": "new" })))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::MissingInput(ref f) if f == "grossIncome"));

    let err = TaxCalculatorNode
        .execute(ctx(json!({ "grossIncome": 100 })))
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Configuration(_)));
}

#[tokio::test]
async fn test_condition_selects_branch() {
    let node = ConditionNode;
    let out = node
        .execute(
            ctx(json!({ "fieldPath": "node_3.compliant", "operator": "equals", "compareValue": true }))
                .with_input("node_3", json!({ "compliant": true })),
        )
        .await
        .unwrap();

    assert_eq!(out.branch, Some(Branch::True));
    assert_eq!(out.data["result"], true);
    assert_eq!(out.data["nextPath"], "true");
    assert_eq!(out.data["inputValue"], true);
    assert_eq!(out.data["condition"], "node_3.compliant equals true");

    let out = node
        .execute(
            ctx(json!({ "fieldPath": "amount", "operator": "greater_than", "compareValue": 1000 }))
                .with_input("input", json!({ "amount": "950" })),
        )
        .await
        .unwrap();
    assert_eq!(out.branch, Some(Branch::False));
}

#[tokio::test]
async fn test_condition_operators() {
    use ledgercore::ConditionOperator::*;
    use ledgernodes::evaluate;

    assert!(evaluate(Equals, Some(&json!(5)), &json!(5.0)));
    assert!(evaluate(NotEquals, Some(&json!("a")), &json!("b")));
    assert!(evaluate(LessThan, Some(&json!(3)), &json!("4")));
    assert!(evaluate(Contains, Some(&json!(["pan", "gstin"])), &json!("gstin")));
    assert!(evaluate(Contains, Some(&json!("Form 16 received")), &json!("16")));
    assert!(!evaluate(Contains, Some(&json!(42)), &json!("4")));

    // a missing field behaves as null
    assert!(!evaluate(Equals, None, &json!(true)));
    assert!(evaluate(NotEquals, None, &json!(true)));
    assert!(!evaluate(GreaterThan, None, &json!(0)));
}

#[test]
fn test_pan_and_gstin_formats() {
    assert!(is_valid_pan("ABCDE1234F"));
    assert!(!is_valid_pan("ABCD1234F"));
    assert!(!is_valid_pan("abcde1234f"));
    assert!(!is_valid_pan("ABCDE12345"));

    assert!(is_valid_gstin("27ABCDE1234F1Z5"));
    assert!(!is_valid_gstin("27ABCDE1234F0Z5"));
    assert!(!is_valid_gstin("27ABCDE1234F1X5"));
    assert!(!is_valid_gstin("27ABCDE1234F1Z"));
}

#[tokio::test]
async fn test_compliance_checker_reports_issues() {
    let node = ComplianceCheckerNode;

    let out = node
        .execute(ctx(json!({})).with_input(
            "node_1",
            json!({ "client": { "pan": "ABCDE1234F", "gstin": "27ABCDE1234F1Z5" } }),
        ))
        .await
        .unwrap();
    assert_eq!(out.data["compliant"], true);
    assert_eq!(out.data["status"], "compliant");
    assert_eq!(out.data["issues"], json!([]));

    let out = node
        .execute(ctx(json!({})).with_input(
            "node_1",
            json!({ "client": { "pan": "BAD", "businessType": "Individual" } }),
        ))
        .await
        .unwrap();
    assert_eq!(out.data["compliant"], false);
    assert_eq!(out.data["status"], "non_compliant");
    assert_eq!(out.data["issues"][0]["type"], "PAN_INVALID");
    assert_eq!(out.data["issues"][0]["severity"], "error");

    let out = node
        .execute(ctx(json!({})).with_input(
            "node_1",
            json!({ "client": { "pan": "ABCDE1234F", "businessType": "Company" } }),
        ))
        .await
        .unwrap();
    assert_eq!(out.data["compliant"], true);
    assert_eq!(out.data["status"], "review");
    assert_eq!(out.data["issues"][0]["type"], "GST_REGISTRATION_REQUIRED");
}

#[tokio::test]
async fn test_compliance_checker_fail_on_error() {
    let err = ComplianceCheckerNode
        .execute(
            ctx(json!({ "failOnError": true }))
                .with_input("input", json!({ "pan": "ABCDE1234F", "gstin": "nope" })),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        NodeError::ExecutionFailed("compliance check failed: GSTIN_INVALID".to_string()).to_string()
    );
}

#[tokio::test]
async fn test_gst_split() {
    let out = GstProcessorNode
        .execute(ctx(json!({})).with_input("input", json!({ "revenue": 100_000 })))
        .await
        .unwrap();
    approx(&out.data["gstAmount"], 18_000.0);
    approx(&out.data["cgst"], 9_000.0);
    approx(&out.data["sgst"], 9_000.0);
    approx(&out.data["igst"], 0.0);

    let out = GstProcessorNode
        .execute(
            ctx(json!({ "turnoverField": "sales.total", "gstRate": 0.12, "interstate": true }))
                .with_input("input", json!({ "sales": { "total": 50_000 } })),
        )
        .await
        .unwrap();
    approx(&out.data["igst"], 6_000.0);
    approx(&out.data["cgst"], 0.0);
    approx(&out.data["totalWithGst"], 56_000.0);
}

#[tokio::test]
async fn test_client_intake_builds_record() {
    let out = ClientIntakeNode
        .execute(ctx(json!({})).with_input(
            "input",
            json!({ "name": "Asha Rao", "email": "asha@example.com", "pan": "ABCDE1234F" }),
        ))
        .await
        .unwrap();

    let client = &out.data["client"];
    assert_eq!(client["name"], "Asha Rao");
    assert_eq!(client["businessType"], "Individual");
    assert_eq!(client["financialYear"], "2024-25");
    assert!(client["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(client.get("gstin").is_none());
}

#[tokio::test]
async fn test_client_intake_names_missing_fields() {
    let err = ClientIntakeNode
        .execute(
            ctx(json!({ "requiredFields": ["name", "email", "pan"] }))
                .with_input("input", json!({ "name": "Asha Rao", "email": "  " })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::MissingInput(ref f) if f == "email, pan"));
}

#[tokio::test]
async fn test_document_processor_uses_extractor() {
    let node = DocumentProcessorNode::new(Arc::new(SampleExtractor));

    let out = node
        .execute(ctx(json!({ "documentTypes": ["form16", "sales_register"] })))
        .await
        .unwrap();
    assert_eq!(out.data["documentsProcessed"], 2);
    assert_eq!(out.data["extractedData"]["grossIncome"], 800_000);
    assert_eq!(out.data["extractedData"]["revenue"], 1_250_000);
    assert_eq!(out.data["status"], "completed");

    let out = node
        .execute(ctx(json!({})).with_input(
            "input",
            json!({ "documents": [
                { "type": "payslip", "fields": { "netPay": 61_000 }, "confidence": 0.7 },
                "mystery_scan"
            ]}),
        ))
        .await
        .unwrap();
    assert_eq!(out.data["extractedData"]["netPay"], 61_000);
    assert_eq!(out.data["lowConfidence"], json!(["payslip", "mystery_scan"]));
    assert_eq!(out.data["status"], "needs_review");
}

#[tokio::test]
async fn test_sheets_action_writes_mapped_row() {
    let sheets = Arc::new(InMemorySpreadsheet::new());
    let node = GoogleSheetsActionNode::new(sheets.clone());

    let out = node
        .execute(
            ctx(json!({
                "operation": "append",
                "sheetName": "Clients",
                "mapping": { "Name": "client.name", "GSTIN": "client.gstin" }
            }))
            .with_input("node_1", json!({ "client": { "name": "Asha Rao" } })),
        )
        .await
        .unwrap();

    assert_eq!(out.data["sheetName"], "Clients");
    assert_eq!(out.data["rowsAffected"], 1);
    assert_eq!(out.data["status"], "success");
    let rows = sheets.rows("Clients").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Name"], "Asha Rao");
    assert_eq!(rows[0]["GSTIN"], Value::Null);
}

#[tokio::test]
async fn test_in_memory_sheet_operations() {
    let sheets = InMemorySpreadsheet::new();
    let request = |operation, row: Value| SheetRequest {
        spreadsheet_id: None,
        sheet_name: "Dashboard".to_string(),
        operation,
        row: config(row),
        key_column: Some("Client".to_string()),
    };

    sheets
        .apply(&request(SheetOperation::Append, json!({ "Client": "A", "Status": "open" })))
        .await
        .unwrap();
    sheets
        .apply(&request(SheetOperation::Update, json!({ "Client": "A", "Status": "done" })))
        .await
        .unwrap();
    sheets
        .apply(&request(SheetOperation::Update, json!({ "Client": "B", "Status": "open" })))
        .await
        .unwrap();

    let read = sheets
        .apply(&request(SheetOperation::Read, json!({})))
        .await
        .unwrap();
    assert_eq!(
        read.rows,
        vec![
            json!({ "Client": "A", "Status": "done" }),
            json!({ "Client": "B", "Status": "open" }),
        ]
    );

    let cleared = sheets
        .apply(&request(SheetOperation::Clear, json!({})))
        .await
        .unwrap();
    assert_eq!(cleared.rows_affected, 2);
    assert!(sheets.rows("Dashboard").await.is_empty());
}

#[tokio::test]
async fn test_webhook_spreadsheet_reports_transport_errors() {
    let client = WebhookSpreadsheet::new("http://127.0.0.1:9/sheets").with_header("x-api-key", "test");
    let request = SheetRequest {
        spreadsheet_id: Some("sheet-1".to_string()),
        sheet_name: "Clients".to_string(),
        operation: SheetOperation::Append,
        row: config(json!({ "Name": "Asha Rao" })),
        key_column: None,
    };

    let err = client.apply(&request).await.unwrap_err();
    assert!(matches!(err, NodeError::ExecutionFailed(ref m) if m.starts_with("HTTP request failed")));
}

#[tokio::test]
async fn test_email_renders_template_and_uses_client_email() {
    let mailer = Arc::new(LogMailer::new());
    let node = EmailSenderNode::new(mailer.clone());

    let out = node
        .execute(
            ctx(json!({
                "subject": "Welcome {{client.name}}",
                "template": "Dear {{ client.name }}, your PAN {{client.pan}} is on file. {{unknown}}"
            }))
            .with_input(
                "node_1",
                json!({ "client": { "name": "Asha Rao", "email": "asha@example.com", "pan": "ABCDE1234F" } }),
            ),
        )
        .await
        .unwrap();

    assert_eq!(out.data["status"], "sent");
    assert_eq!(out.data["recipients"], json!(["asha@example.com"]));
    assert_eq!(out.data["subject"], "Welcome Asha Rao");
    assert_eq!(
        out.data["body"],
        "Dear Asha Rao, your PAN ABCDE1234F is on file. {{unknown}}"
    );

    let sent = mailer.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["asha@example.com".to_string()]);
}

#[tokio::test]
async fn test_email_without_recipient_fails() {
    let node = EmailSenderNode::new(Arc::new(LogMailer::new()));
    let err = node.execute(ctx(json!({}))).await.unwrap_err();
    assert!(matches!(err, NodeError::MissingInput(ref f) if f == "recipients"));
}

#[test]
fn test_render_numbers_and_unterminated_placeholders() {
    let c = ctx(json!({})).with_input("node_2", json!({ "taxAmount": 20000, "regime": "new" }));
    assert_eq!(render("Tax {{taxAmount}} ({{regime}})", &c), "Tax 20000 (new)");
    assert_eq!(render("open {{taxAmount", &c), "open {{taxAmount");
}

#[test]
fn test_indian_currency_and_calculations() {
    assert_eq!(format_inr(1_234_567.5), "₹12,34,567.50");
    assert_eq!(format_inr(999.0), "₹999.00");
    assert_eq!(format_inr(100_000.0), "₹1,00,000.00");
    assert_eq!(format_inr(-2_500.0), "-₹2,500.00");

    assert_eq!(calculate(100.0, "add 10").unwrap(), 110.0);
    assert_eq!(calculate(100.0, "subtract 30").unwrap(), 70.0);
    assert_eq!(calculate(100.0, "multiply 3").unwrap(), 300.0);
    assert_eq!(calculate(100.0, "divide 4").unwrap(), 25.0);
    assert_eq!(calculate(200.0, "percentage 18").unwrap(), 36.0);
    assert!(matches!(calculate(1.0, "divide 0"), Err(NodeError::ExecutionFailed(_))));
    assert!(matches!(calculate(1.0, "modulo 2"), Err(NodeError::Configuration(_))));
    assert!(matches!(calculate(1.0, "add"), Err(NodeError::Configuration(_))));
}

#[tokio::test]
async fn test_data_transformer_chains_steps() {
    let out = DataTransformerNode
        .execute(
            ctx(json!({ "transformations": [
                { "sourceField": "client.name", "targetField": "name", "operation": "format", "value": "uppercase" },
                { "sourceField": "fee", "targetField": "feeWithGst", "operation": "calculate", "value": "multiply 1.18" },
                { "sourceField": "feeWithGst", "targetField": "display", "operation": "format", "value": "currency" },
                { "sourceField": "client.pan", "targetField": "pan", "operation": "copy" }
            ]}))
            .with_input(
                "input",
                json!({ "fee": 10_000, "client": { "name": "Asha Rao", "pan": "ABCDE1234F" } }),
            ),
        )
        .await
        .unwrap();

    assert_eq!(out.data["name"], "ASHA RAO");
    approx(&out.data["feeWithGst"], 11_800.0);
    assert_eq!(out.data["display"], "₹11,800.00");
    assert_eq!(out.data["pan"], "ABCDE1234F");
}

#[tokio::test]
async fn test_data_transformer_rejects_non_numeric_calculation() {
    let err = DataTransformerNode
        .execute(
            ctx(json!({ "transformations": [
                { "sourceField": "name", "targetField": "x", "operation": "calculate", "value": "add 1" }
            ]}))
            .with_input("input", json!({ "name": "Asha" })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::InvalidInputType { .. }));
}

#[tokio::test]
async fn test_delay_passes_input_through() {
    let start = std::time::Instant::now();
    let out = DelayNode
        .execute(ctx(json!({ "delayMs": 20 })).with_input("node_1", json!({ "a": 1 })))
        .await
        .unwrap();
    assert!(start.elapsed() >= std::time::Duration::from_millis(20));
    assert_eq!(out.data["node_1"], json!({ "a": 1 }));
}

#[tokio::test]
async fn test_scheduled_trigger_reemits_seed() {
    let out = ScheduledTriggerNode
        .execute(
            ctx(json!({ "schedule": "0 9 1 * *" }))
                .with_input("input", json!({ "clientId": "c-17" })),
        )
        .await
        .unwrap();
    assert_eq!(out.data["clientId"], "c-17");
    assert_eq!(out.data["schedule"], "0 9 1 * *");
    assert!(out.data["triggeredAt"].is_string());
}

#[tokio::test]
async fn test_audit_log_entry() {
    let out = AuditLogNode
        .execute(
            ctx(json!({ "action": "itr_filed", "includeData": true }))
                .with_input("node_2", json!({ "taxAmount": 20000 })),
        )
        .await
        .unwrap();
    let entry = &out.data["auditLog"];
    assert_eq!(entry["action"], "itr_filed");
    assert_eq!(entry["details"], "Workflow executed");
    assert_eq!(entry["nodeId"], "node_1");
    assert_eq!(entry["data"]["node_2"]["taxAmount"], 20000);
}

#[test]
fn test_register_all_covers_builtin_types() {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry);

    for node_type in NodeType::BUILTIN.iter() {
        assert_eq!(
            registry.contains(node_type),
            *node_type != NodeType::DocumentUpload,
            "{}",
            node_type
        );
    }
    assert_eq!(registry.len(), 13);
    let meta = registry.get_metadata(&NodeType::TaxCalculator).unwrap();
    assert_eq!(meta.category, "tax");
}
