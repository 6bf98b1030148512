//! Built-in practice templates

use ledgercore::{
    Blueprint, Branch, Complexity, NodeSpec, NodeType, TemplateCategory, WorkflowTemplate,
};
use serde_json::json;

pub(crate) fn builtin() -> Vec<WorkflowTemplate> {
    vec![
        client_onboarding_basic(),
        tax_filing_individual(),
        gst_return_monthly(),
        audit_preparation(),
        compliance_monitoring(),
    ]
}

fn node(id: &str, node_type: NodeType, label: &str, x: f32) -> NodeSpec {
    NodeSpec::new(id, node_type)
        .with_label(label)
        .with_position(x, 100.0)
}

fn client_onboarding_basic() -> WorkflowTemplate {
    WorkflowTemplate {
        id: "client_onboarding_basic".to_string(),
        name: "Basic Client Onboarding".to_string(),
        description: "Onboard a new client with document collection, compliance checks and a welcome email"
            .to_string(),
        category: TemplateCategory::ClientOnboarding,
        complexity: Complexity::Beginner,
        preview: "Client Intake → Document Processing → Compliance Check → Google Sheets → Email Notification"
            .to_string(),
        estimated_minutes: 15,
        blueprint: Blueprint::default()
            .node(
                node("node_1", NodeType::ClientIntake, "New Client Details", 100.0)
                    .with_config("requiredFields", json!(["name", "email", "pan", "businessType"])),
            )
            .node(
                node("node_2", NodeType::DocumentProcessor, "Document Collection", 300.0)
                    .with_config(
                        "documentTypes",
                        json!(["pan_card", "address_proof", "bank_statement"]),
                    ),
            )
            .node(
                node("node_3", NodeType::ComplianceChecker, "Initial Compliance Check", 500.0)
                    .with_config("checkTypes", json!(["pan", "gstin", "basic_regulatory"])),
            )
            .node(
                node("node_4", NodeType::GoogleSheetsAction, "Add to Client Database", 700.0)
                    .with_config("operation", "append")
                    .with_config("sheetName", "Clients")
                    .with_config(
                        "mapping",
                        json!({
                            "Client ID": "client.id",
                            "Name": "client.name",
                            "Email": "client.email",
                            "PAN": "client.pan",
                            "Business Type": "client.businessType"
                        }),
                    ),
            )
            .node(
                node("node_5", NodeType::EmailSender, "Welcome Email", 900.0)
                    .with_config("subject", "Welcome to Our CA Services")
                    .with_config(
                        "template",
                        "Dear {{client.name}}, thank you for choosing us. We will review your documents and get back to you shortly.",
                    ),
            )
            .edge("node_1", "node_2")
            .edge("node_1", "node_3")
            .edge("node_1", "node_4")
            .edge("node_1", "node_5")
            .tags(&["onboarding", "client", "basic"]),
    }
}

fn tax_filing_individual() -> WorkflowTemplate {
    WorkflowTemplate {
        id: "tax_filing_individual".to_string(),
        name: "Individual Tax Filing Workflow".to_string(),
        description: "Tax filing for individual clients: document extraction, tax computation, ITR summary and notification"
            .to_string(),
        category: TemplateCategory::TaxFiling,
        complexity: Complexity::Intermediate,
        preview: "Document Processing → Tax Calculation → ITR Summary → Compliance Check → Notification"
            .to_string(),
        estimated_minutes: 45,
        blueprint: Blueprint::default()
            .node(
                node("node_1", NodeType::DocumentProcessor, "Process Tax Documents", 100.0)
                    .with_config(
                        "documentTypes",
                        json!(["form16", "bank_interest", "investment_proofs"]),
                    ),
            )
            .node(
                node("node_2", NodeType::TaxCalculator, "Calculate Income Tax", 300.0)
                    .with_config("taxRegime", "new")
                    .with_config("assessmentYear", "2024-25")
                    .with_config("incomeField", "extractedData.grossIncome")
                    .with_config("includeDeductions", true),
            )
            .node(
                node("node_3", NodeType::ReportGenerator, "ITR Summary", 500.0)
                    .with_config("reportType", "tax_summary")
                    .with_config("title", "ITR Summary"),
            )
            .node(
                node("node_4", NodeType::ComplianceChecker, "Pre-filing Compliance Check", 700.0)
                    .with_config("checkTypes", json!(["pan", "tax_computation"])),
            )
            .node(
                node("node_5", NodeType::GoogleSheetsAction, "Record Tax Computation", 500.0)
                    .with_config("operation", "append")
                    .with_config("sheetName", "Tax Filings")
                    .with_config(
                        "mapping",
                        json!({
                            "Gross Income": "grossIncome",
                            "Taxable Income": "taxableIncome",
                            "Tax": "taxAmount",
                            "Regime": "taxRegime"
                        }),
                    ),
            )
            .node(
                node("node_6", NodeType::EmailSender, "Tax Computation Ready", 700.0)
                    .with_config("recipients", json!(["client@example.com"]))
                    .with_config("subject", "Your tax computation is ready")
                    .with_config(
                        "template",
                        "Your tax computation has been recorded in sheet {{sheetName}}.",
                    ),
            )
            .edge("node_1", "node_2")
            .edge("node_1", "node_3")
            .edge("node_2", "node_3")
            .edge("node_3", "node_4")
            .edge("node_2", "node_5")
            .edge("node_5", "node_6")
            .tags(&["tax", "itr", "individual"]),
    }
}

fn gst_return_monthly() -> WorkflowTemplate {
    WorkflowTemplate {
        id: "gst_return_monthly".to_string(),
        name: "Monthly GST Return".to_string(),
        description: "Monthly GST computation from sales registers with a compliance gate before updating analytics"
            .to_string(),
        category: TemplateCategory::TaxFiling,
        complexity: Complexity::Intermediate,
        preview: "Statement Extraction → GST Calculation → Compliance Check → Analytics or Review Alert"
            .to_string(),
        estimated_minutes: 30,
        blueprint: Blueprint::default()
            .node(
                node("node_1", NodeType::DocumentProcessor, "Extract Statements", 100.0)
                    .with_config("documentTypes", json!(["sales_register", "purchase_register"])),
            )
            .node(
                node("node_2", NodeType::GstProcessor, "Compute GST", 300.0)
                    .with_config("turnoverField", "extractedData.revenue")
                    .with_config("gstRate", 0.18)
                    .with_config("interstate", false),
            )
            .node(
                node("node_3", NodeType::ComplianceChecker, "GST Compliance", 500.0)
                    .with_config("checkTypes", json!(["gstin"])),
            )
            .node(
                node("node_4", NodeType::Condition, "Compliant?", 700.0)
                    .with_config("fieldPath", "node_3.compliant")
                    .with_config("operator", "equals")
                    .with_config("compareValue", true),
            )
            .node(
                node("node_5", NodeType::GoogleSheetsAction, "Update GST Analytics", 900.0)
                    .with_config("operation", "update")
                    .with_config("sheetName", "GST Analytics"),
            )
            .node(
                node("node_6", NodeType::EmailSender, "Review Alert", 900.0)
                    .with_config("recipients", json!(["compliance@practice.example"]))
                    .with_config("subject", "GST return needs review")
                    .with_config(
                        "template",
                        "The monthly GST return failed its compliance gate ({{node_4.condition}}).",
                    ),
            )
            .edge("node_1", "node_2")
            .edge("node_2", "node_3")
            .edge("node_3", "node_4")
            .branch("node_4", "node_5", Branch::True)
            .branch("node_4", "node_6", Branch::False)
            .tags(&["gst", "monthly", "returns"]),
    }
}

fn audit_preparation() -> WorkflowTemplate {
    WorkflowTemplate {
        id: "audit_preparation".to_string(),
        name: "Audit Preparation".to_string(),
        description: "Scheduled audit preparation: gather books, check compliance, produce a report and plan audit tasks"
            .to_string(),
        category: TemplateCategory::AuditProcess,
        complexity: Complexity::Advanced,
        preview: "Scheduled Trigger → Document Processing → Compliance Check → Report → Email"
            .to_string(),
        estimated_minutes: 90,
        blueprint: Blueprint::default()
            .node(
                node("node_1", NodeType::ScheduledTrigger, "Monthly Audit Kickoff", 100.0)
                    .with_config("schedule", "0 9 1 * *"),
            )
            .node(
                node("node_2", NodeType::DocumentProcessor, "Collect Books", 300.0)
                    .with_config(
                        "documentTypes",
                        json!(["trial_balance", "general_ledger", "bank_statement"]),
                    ),
            )
            .node(
                node("node_3", NodeType::ComplianceChecker, "Audit Compliance Review", 500.0)
                    .with_config("checkTypes", json!(["pan", "gstin", "statutory"])),
            )
            .node(
                node("node_4", NodeType::ReportGenerator, "Audit Report", 700.0)
                    .with_config("reportType", "compliance_report")
                    .with_config("title", "Audit Preparation Report"),
            )
            .node(
                node("node_5", NodeType::EmailSender, "Send to Audit Team", 900.0)
                    .with_config("recipients", json!(["audit-team@practice.example"]))
                    .with_config("subject", "Audit preparation report")
                    .with_config(
                        "template",
                        "The audit preparation report is ready: {{report.summary}}",
                    ),
            )
            .node(
                node("node_6", NodeType::GoogleSheetsAction, "Plan Audit Tasks", 700.0)
                    .with_config("operation", "append")
                    .with_config("sheetName", "Audit Tasks")
                    .with_config(
                        "mapping",
                        json!({ "Status": "status", "Compliant": "compliant" }),
                    ),
            )
            .edge("node_1", "node_2")
            .edge("node_2", "node_3")
            .edge("node_3", "node_4")
            .edge("node_4", "node_5")
            .edge("node_3", "node_6")
            .tags(&["audit", "scheduled"]),
    }
}

fn compliance_monitoring() -> WorkflowTemplate {
    WorkflowTemplate {
        id: "compliance_monitoring".to_string(),
        name: "Compliance Monitoring".to_string(),
        description: "Weekly compliance sweep of a client record with alerts when issues are found"
            .to_string(),
        category: TemplateCategory::ComplianceCheck,
        complexity: Complexity::Intermediate,
        preview: "Scheduled Trigger → Client Intake → Compliance Check → Alert".to_string(),
        estimated_minutes: 20,
        blueprint: Blueprint::default()
            .node(
                node("node_1", NodeType::ScheduledTrigger, "Weekly Sweep", 100.0)
                    .with_config("schedule", "0 8 * * 1"),
            )
            .node(
                node("node_2", NodeType::ClientIntake, "Load Client", 300.0)
                    .with_config("requiredFields", json!(["name", "pan"])),
            )
            .node(
                node("node_3", NodeType::ComplianceChecker, "Compliance Sweep", 500.0)
                    .with_config("checkTypes", json!(["pan", "gstin"])),
            )
            .node(
                node("node_4", NodeType::Condition, "All Clear?", 700.0)
                    .with_config("fieldPath", "node_3.compliant")
                    .with_config("operator", "equals")
                    .with_config("compareValue", true),
            )
            .node(
                node("node_5", NodeType::EmailSender, "Compliance Alert", 900.0)
                    .with_config("recipients", json!(["compliance@practice.example"]))
                    .with_config("subject", "Compliance issues found")
                    .with_config(
                        "template",
                        "The weekly compliance sweep found issues ({{node_4.condition}}).",
                    ),
            )
            .node(
                node("node_6", NodeType::GoogleSheetsAction, "Update Compliance Dashboard", 700.0)
                    .with_config("operation", "update")
                    .with_config("sheetName", "Compliance Dashboard"),
            )
            .edge("node_1", "node_2")
            .edge("node_2", "node_3")
            .edge("node_3", "node_4")
            .branch("node_4", "node_5", Branch::False)
            .edge("node_3", "node_6")
            .tags(&["compliance", "monitoring", "scheduled"]),
    }
}
