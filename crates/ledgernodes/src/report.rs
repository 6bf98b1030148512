use async_trait::async_trait;
use chrono::Utc;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};
use serde_json::{json, Map, Value};

/// Summarises upstream results into a report
pub struct ReportGeneratorNode;

/// First upstream output carrying `key`
fn upstream<'a>(ctx: &'a NodeContext, key: &str) -> Option<&'a Value> {
    ctx.inputs.values().find(|v| v.get(key).is_some())
}

fn tax_summary(ctx: &NodeContext) -> Map<String, Value> {
    let tax = upstream(ctx, "taxAmount");
    let gst = upstream(ctx, "gstAmount");
    let summary = match tax {
        Some(calc) => format!(
            "Tax payable {} on taxable income {} under the {} regime",
            calc["taxAmount"], calc["taxableIncome"], calc["taxRegime"].as_str().unwrap_or("new")
        ),
        None => "No tax computation available".to_string(),
    };
    let mut report = Map::new();
    report.insert("type".into(), "Tax Summary Report".into());
    report.insert("client".into(), ctx.lookup("client").cloned().unwrap_or(Value::Null));
    report.insert("taxCalculation".into(), tax.cloned().unwrap_or(Value::Null));
    report.insert("gstCalculation".into(), gst.cloned().unwrap_or(Value::Null));
    report.insert("summary".into(), summary.into());
    report
}

fn compliance_report(ctx: &NodeContext) -> Map<String, Value> {
    let checks = upstream(ctx, "compliant");
    let issues = checks
        .and_then(|c| c.get("issues"))
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    let count = issues.as_array().map_or(0, Vec::len);
    let compliant = checks
        .and_then(|c| c.get("compliant"))
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let mut report = Map::new();
    report.insert("type".into(), "Compliance Report".into());
    report.insert("client".into(), ctx.lookup("client").cloned().unwrap_or(Value::Null));
    report.insert("complianceChecks".into(), issues);
    report.insert("compliant".into(), compliant.into());
    report.insert(
        "summary".into(),
        format!(
            "{} issue(s) found, {}",
            count,
            if compliant { "compliant" } else { "not compliant" }
        )
        .into(),
    );
    report
}

fn general(ctx: &NodeContext) -> Map<String, Value> {
    let mut report = Map::new();
    report.insert("type".into(), "General Report".into());
    report.insert("data".into(), Value::Object(ctx.inputs.clone()));
    report.insert(
        "summary".into(),
        format!("Report over {} upstream result(s)", ctx.inputs.len()).into(),
    );
    report
}

#[async_trait]
impl NodeExecutor for ReportGeneratorNode {
    fn node_type(&self) -> NodeType {
        NodeType::ReportGenerator
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let report_type = ctx.config.get_str("reportType").unwrap_or("general");
        let mut report = match report_type {
            "tax_summary" => tax_summary(&ctx),
            "compliance_report" => compliance_report(&ctx),
            _ => general(&ctx),
        };
        if let Some(title) = ctx.config.get_str("title") {
            report.insert("title".into(), title.into());
        }
        report.insert("generatedAt".into(), json!(Utc::now().to_rfc3339()));

        ctx.events.info(format!("Generated {} report", report_type));
        Ok(NodeOutput::new()
            .with_output("report", Value::Object(report))
            .with_output("reportType", report_type))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Generate a tax summary, compliance or general report".to_string(),
            category: "reporting".to_string(),
            inputs: vec![],
            outputs: vec![PortDefinition::required("report", "Report with a one-line summary")],
        }
    }
}
