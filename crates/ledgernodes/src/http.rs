use crate::sheets::{SheetRequest, SheetResult, SpreadsheetClient};
use async_trait::async_trait;
use ledgercore::NodeError;
use std::collections::HashMap;

/// Spreadsheet client that posts each [`SheetRequest`] as JSON to a webhook
/// (an Apps Script endpoint or a small proxy in front of the Sheets API) and
/// reads a [`SheetResult`] back.
pub struct WebhookSpreadsheet {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
}

impl WebhookSpreadsheet {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SpreadsheetClient for WebhookSpreadsheet {
    async fn apply(&self, request: &SheetRequest) -> Result<SheetResult, NodeError> {
        tracing::debug!(url = %self.url, sheet = %request.sheet_name, "POST sheet request");

        let mut req = self.client.post(&self.url).json(request);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }

        let response = req
            .send()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NodeError::ExecutionFailed(format!(
                "Spreadsheet webhook returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<SheetResult>()
            .await
            .map_err(|e| NodeError::ExecutionFailed(format!("Failed to read response: {}", e)))
    }
}
