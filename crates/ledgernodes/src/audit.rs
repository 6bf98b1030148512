use async_trait::async_trait;
use chrono::Utc;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};
use serde_json::{json, Value};

/// Records a structured audit entry for the run
pub struct AuditLogNode;

#[async_trait]
impl NodeExecutor for AuditLogNode {
    fn node_type(&self) -> NodeType {
        NodeType::AuditLog
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let action = ctx.config.get_str("action").unwrap_or("workflow_execution");
        let details = ctx.config.get_str("details").unwrap_or("Workflow executed");
        let data = if ctx.config.get_bool("includeData").unwrap_or(false) {
            Value::Object(ctx.inputs.clone())
        } else {
            Value::Null
        };

        tracing::info!(
            target: "audit",
            execution_id = %ctx.execution_id,
            node_id = %ctx.node_id,
            action,
            details,
            "audit entry"
        );
        ctx.events.info(format!("AUDIT: {} - {}", action, details));

        let entry = json!({
            "executionId": ctx.execution_id.to_string(),
            "nodeId": ctx.node_id,
            "timestamp": Utc::now().to_rfc3339(),
            "action": action,
            "details": details,
            "data": data,
        });
        Ok(NodeOutput::new().with_output("auditLog", entry))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Write a structured audit entry".to_string(),
            category: "audit".to_string(),
            inputs: vec![],
            outputs: vec![PortDefinition::required("auditLog", "The recorded entry")],
        }
    }
}
