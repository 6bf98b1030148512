use async_trait::async_trait;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};
use serde_json::{Map, Value};
use uuid::Uuid;

const DEFAULT_REQUIRED: [&str; 3] = ["name", "email", "pan"];

const CLIENT_FIELDS: [&str; 5] = ["name", "email", "phone", "pan", "address"];

/// Builds a client record from submitted intake data
pub struct ClientIntakeNode;

fn present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

#[async_trait]
impl NodeExecutor for ClientIntakeNode {
    fn node_type(&self) -> NodeType {
        NodeType::ClientIntake
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let required = ctx
            .config
            .get_string_list("requiredFields")
            .unwrap_or_else(|| DEFAULT_REQUIRED.iter().map(|s| s.to_string()).collect());

        let missing: Vec<&str> = required
            .iter()
            .map(String::as_str)
            .filter(|field| !ctx.lookup(field).is_some_and(present))
            .collect();
        if !missing.is_empty() {
            return Err(NodeError::MissingInput(missing.join(", ")));
        }

        let text = |field: &str| {
            ctx.lookup(field)
                .filter(|v| present(v))
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()))
        };

        let mut client = Map::new();
        client.insert("id".to_string(), Uuid::new_v4().to_string().into());
        for field in CLIENT_FIELDS {
            client.insert(field.to_string(), text(field));
        }
        if let Some(gstin) = ctx.lookup("gstin").filter(|v| present(v)) {
            client.insert("gstin".to_string(), gstin.clone());
        }
        client.insert(
            "businessType".to_string(),
            ctx.lookup("businessType")
                .filter(|v| present(v))
                .cloned()
                .unwrap_or_else(|| "Individual".into()),
        );
        client.insert(
            "financialYear".to_string(),
            ctx.lookup("financialYear")
                .filter(|v| present(v))
                .cloned()
                .unwrap_or_else(|| "2024-25".into()),
        );
        client.insert(
            "documents".to_string(),
            ctx.lookup("documents")
                .filter(|v| v.is_array())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
        );
        for field in &required {
            if !client.contains_key(field) {
                client.insert(field.clone(), text(field));
            }
        }

        ctx.events.info(format!("Client record created for {}", client["name"]));

        Ok(NodeOutput::new().with_output("client", Value::Object(client)))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Capture client details and create a client record".to_string(),
            category: "intake".to_string(),
            inputs: vec![
                PortDefinition::required("name", "Client name"),
                PortDefinition::required("email", "Contact email"),
                PortDefinition::required("pan", "Permanent account number"),
                PortDefinition::optional("gstin", "GST registration number"),
                PortDefinition::optional("businessType", "Individual, Company, ..."),
            ],
            outputs: vec![PortDefinition::required("client", "Client record")],
        }
    }
}
