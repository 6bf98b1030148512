use crate::condition::display;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingEmail {
    pub id: Uuid,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Mail transport used by [`EmailSenderNode`]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NodeError>;
}

/// Logs each message and keeps it in an outbox instead of delivering it
#[derive(Default)]
pub struct LogMailer {
    outbox: Mutex<Vec<OutgoingEmail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), NodeError> {
        tracing::info!(to = ?email.to, subject = %email.subject, "email queued");
        self.outbox.lock().await.push(email.clone());
        Ok(())
    }
}

/// Replace `{{path}}` placeholders with values from the input context.
/// Placeholders that resolve to nothing are left as written.
pub fn render(template: &str, ctx: &NodeContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        let placeholder = &rest[start..start + 2 + len + 2];
        let path = rest[start + 2..start + 2 + len].trim();
        out.push_str(&rest[..start]);
        match ctx.lookup(path) {
            Some(value) => out.push_str(&display(value)),
            None => out.push_str(placeholder),
        }
        rest = &rest[start + placeholder.len()..];
    }
    out.push_str(rest);
    out
}

/// Sends a templated email
pub struct EmailSenderNode {
    mailer: Arc<dyn Mailer>,
}

impl EmailSenderNode {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    fn recipients(ctx: &NodeContext) -> Result<Vec<String>, NodeError> {
        if let Some(list) = ctx.config.get_string_list("recipients").filter(|l| !l.is_empty()) {
            return Ok(list);
        }
        ctx.lookup("client.email")
            .or_else(|| ctx.lookup("email"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| vec![s.to_string()])
            .ok_or_else(|| NodeError::MissingInput("recipients".to_string()))
    }
}

#[async_trait]
impl NodeExecutor for EmailSenderNode {
    fn node_type(&self) -> NodeType {
        NodeType::EmailSender
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let email = OutgoingEmail {
            id: Uuid::new_v4(),
            to: Self::recipients(&ctx)?,
            subject: render(
                ctx.config.get_str("subject").unwrap_or("Automated Notification"),
                &ctx,
            ),
            body: render(ctx.config.get_str("template").unwrap_or("Default message"), &ctx),
            sent_at: Utc::now(),
        };

        self.mailer.send(&email).await?;
        ctx.events.info(format!("Email sent to {}", email.to.join(", ")));

        Ok(NodeOutput::new()
            .with_output("emailId", email.id.to_string())
            .with_output("recipients", email.to)
            .with_output("subject", email.subject)
            .with_output("body", email.body)
            .with_output("status", "sent")
            .with_output("sentAt", email.sent_at.to_rfc3339()))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Send a templated email".to_string(),
            category: "notification".to_string(),
            inputs: vec![PortDefinition::optional(
                "client.email",
                "Recipient when no recipients are configured",
            )],
            outputs: vec![
                PortDefinition::required("emailId", "Message id"),
                PortDefinition::required("status", "Delivery status"),
            ],
        }
    }
}
