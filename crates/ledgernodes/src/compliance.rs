use async_trait::async_trait;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceIssue {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// `AAAAA9999A`
pub fn is_valid_pan(pan: &str) -> bool {
    let b = pan.as_bytes();
    b.len() == 10
        && b[..5].iter().all(u8::is_ascii_uppercase)
        && b[5..9].iter().all(u8::is_ascii_digit)
        && b[9].is_ascii_uppercase()
}

/// `99AAAAA9999A[1-9A-Z]Z[0-9A-Z]`
pub fn is_valid_gstin(gstin: &str) -> bool {
    let b = gstin.as_bytes();
    b.len() == 15
        && b[..2].iter().all(u8::is_ascii_digit)
        && b[2..7].iter().all(u8::is_ascii_uppercase)
        && b[7..11].iter().all(u8::is_ascii_digit)
        && b[11].is_ascii_uppercase()
        && (matches!(b[12], b'1'..=b'9') || b[12].is_ascii_uppercase())
        && b[13] == b'Z'
        && (b[14].is_ascii_digit() || b[14].is_ascii_uppercase())
}

/// Run the registration checks over one client record.
pub fn check(pan: Option<&str>, gstin: Option<&str>, business_type: Option<&str>) -> Vec<ComplianceIssue> {
    let mut issues = Vec::new();
    if let Some(pan) = pan {
        if !is_valid_pan(pan) {
            issues.push(ComplianceIssue {
                kind: "PAN_INVALID",
                severity: Severity::Error,
                message: format!("PAN '{}' does not match the format AAAAA9999A", pan),
            });
        }
    }
    match gstin {
        Some(gstin) if !is_valid_gstin(gstin) => issues.push(ComplianceIssue {
            kind: "GSTIN_INVALID",
            severity: Severity::Error,
            message: format!("GSTIN '{}' is not a valid 15 character GSTIN", gstin),
        }),
        None if business_type == Some("Company") => issues.push(ComplianceIssue {
            kind: "GST_REGISTRATION_REQUIRED",
            severity: Severity::Warning,
            message: "Companies are expected to hold a GST registration".to_string(),
        }),
        _ => {}
    }
    issues
}

/// PAN / GSTIN format checks over the client in the input context
pub struct ComplianceCheckerNode;

impl ComplianceCheckerNode {
    fn field<'a>(ctx: &'a NodeContext, client: Option<&'a Value>, name: &str) -> Option<&'a str> {
        client
            .and_then(|c| c.get(name))
            .or_else(|| ctx.lookup(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

#[async_trait]
impl NodeExecutor for ComplianceCheckerNode {
    fn node_type(&self) -> NodeType {
        NodeType::ComplianceChecker
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let client = ctx.lookup("client").filter(|c| c.is_object());
        let pan = Self::field(&ctx, client, "pan").or_else(|| Self::field(&ctx, None, "panNumber"));
        let gstin = Self::field(&ctx, client, "gstin");
        let business_type = Self::field(&ctx, client, "businessType");

        let issues = check(pan, gstin, business_type);
        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| i.kind)
            .collect();

        for issue in &issues {
            ctx.events.warn(issue.message.clone());
        }
        if !errors.is_empty() && ctx.config.get_bool("failOnError").unwrap_or(false) {
            return Err(NodeError::ExecutionFailed(format!(
                "compliance check failed: {}",
                errors.join(", ")
            )));
        }

        let status = if !errors.is_empty() {
            "non_compliant"
        } else if !issues.is_empty() {
            "review"
        } else {
            "compliant"
        };

        let issues = serde_json::to_value(&issues)
            .map_err(|e| NodeError::ExecutionFailed(e.to_string()))?;

        Ok(NodeOutput::new()
            .with_output("issues", issues)
            .with_output("compliant", errors.is_empty())
            .with_output("status", status)
            .with_output(
                "checks",
                ctx.config.get_string_list("checkTypes").unwrap_or_default(),
            ))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Check PAN and GSTIN formats and GST registration".to_string(),
            category: "compliance".to_string(),
            inputs: vec![PortDefinition::optional(
                "client",
                "Client record with pan, gstin and businessType",
            )],
            outputs: vec![
                PortDefinition::required("issues", "Findings with type, severity and message"),
                PortDefinition::required("compliant", "True when no error-severity issue exists"),
                PortDefinition::required("status", "compliant, review or non_compliant"),
            ],
        }
    }
}
