use async_trait::async_trait;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition, SheetOperation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One operation against a named sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRequest {
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub operation: SheetOperation,
    #[serde(default)]
    pub row: Map<String, Value>,
    /// Column identifying the row to replace on `update`
    #[serde(default)]
    pub key_column: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetResult {
    pub rows_affected: usize,
    #[serde(default)]
    pub rows: Vec<Value>,
}

/// Spreadsheet backend used by [`GoogleSheetsActionNode`]
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    async fn apply(&self, request: &SheetRequest) -> Result<SheetResult, NodeError>;
}

/// Sheets held in memory, keyed by sheet name
#[derive(Default)]
pub struct InMemorySpreadsheet {
    sheets: RwLock<HashMap<String, Vec<Map<String, Value>>>>,
}

impl InMemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self, sheet_name: &str) -> Vec<Map<String, Value>> {
        self.sheets
            .read()
            .await
            .get(sheet_name)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SpreadsheetClient for InMemorySpreadsheet {
    async fn apply(&self, request: &SheetRequest) -> Result<SheetResult, NodeError> {
        let mut sheets = self.sheets.write().await;
        let rows = sheets.entry(request.sheet_name.clone()).or_default();

        let rows_affected = match request.operation {
            SheetOperation::Append => {
                rows.push(request.row.clone());
                1
            }
            SheetOperation::Update => {
                let key = request
                    .key_column
                    .as_ref()
                    .and_then(|column| Some((column, request.row.get(column)?)));
                let existing = key.and_then(|(column, value)| {
                    rows.iter_mut().find(|row| row.get(column) == Some(value))
                });
                match existing {
                    Some(row) => row.extend(request.row.clone()),
                    None => rows.push(request.row.clone()),
                }
                1
            }
            SheetOperation::Clear => std::mem::take(rows).len(),
            SheetOperation::Read => 0,
        };

        let rows = match request.operation {
            SheetOperation::Read => rows.iter().cloned().map(Value::Object).collect(),
            _ => Vec::new(),
        };
        Ok(SheetResult { rows_affected, rows })
    }
}

/// Writes a row built from the input context to a spreadsheet
pub struct GoogleSheetsActionNode {
    client: Arc<dyn SpreadsheetClient>,
}

impl GoogleSheetsActionNode {
    pub fn new(client: Arc<dyn SpreadsheetClient>) -> Self {
        Self { client }
    }

    // mapping is column -> input path; without one the row is the whole input context
    fn row(ctx: &NodeContext) -> Map<String, Value> {
        match ctx.config.get("mapping").and_then(Value::as_object) {
            Some(mapping) => mapping
                .iter()
                .map(|(column, path)| {
                    let value = path
                        .as_str()
                        .and_then(|p| ctx.lookup(p))
                        .cloned()
                        .unwrap_or(Value::Null);
                    (column.clone(), value)
                })
                .collect(),
            None => ctx.inputs.clone(),
        }
    }
}

#[async_trait]
impl NodeExecutor for GoogleSheetsActionNode {
    fn node_type(&self) -> NodeType {
        NodeType::GoogleSheetsAction
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let operation: SheetOperation = match ctx.config.get_str("operation") {
            Some(op) => op.parse()?,
            None => SheetOperation::Append,
        };
        let request = SheetRequest {
            spreadsheet_id: ctx.config.get_str("spreadsheetId").map(str::to_string),
            sheet_name: ctx.config.get_str("sheetName").unwrap_or("Sheet1").to_string(),
            operation,
            row: Self::row(&ctx),
            key_column: ctx.config.get_str("keyColumn").map(str::to_string),
        };

        ctx.events.info(format!("{} on sheet {}", operation, request.sheet_name));
        let result = self.client.apply(&request).await?;

        let mut output = NodeOutput::new()
            .with_output(
                "spreadsheetId",
                request.spreadsheet_id.map(Value::String).unwrap_or(Value::Null),
            )
            .with_output("sheetName", request.sheet_name)
            .with_output("operation", operation.as_str())
            .with_output("rowsAffected", result.rows_affected)
            .with_output("status", "success");
        if operation == SheetOperation::Read {
            output = output.with_output("rows", result.rows);
        }
        Ok(output)
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Append, update, clear or read spreadsheet rows".to_string(),
            category: "integration".to_string(),
            inputs: vec![PortDefinition::optional(
                "mapping",
                "Column to input path; defaults to the whole input context",
            )],
            outputs: vec![
                PortDefinition::required("sheetName", "Sheet written to"),
                PortDefinition::required("rowsAffected", "Rows appended, updated or cleared"),
                PortDefinition::optional("rows", "Sheet contents for read"),
            ],
        }
    }
}
