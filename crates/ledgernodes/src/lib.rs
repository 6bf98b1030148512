//! Standard node library
//!
//! Built-in executors for the practice's back-office node types, and the
//! collaborator interfaces (mail, spreadsheets, document extraction) the
//! side-effecting ones delegate to.

mod audit;
mod compliance;
mod condition;
mod document;
mod email;
mod gst;
mod http;
mod intake;
mod report;
mod sheets;
mod tax;
mod time;
mod transform;

pub use audit::AuditLogNode;
pub use compliance::{check, is_valid_gstin, is_valid_pan, ComplianceCheckerNode, ComplianceIssue, Severity};
pub use condition::{evaluate, ConditionNode};
pub use document::{DocumentExtractor, DocumentProcessorNode, Extraction, SampleExtractor};
pub use email::{render, EmailSenderNode, LogMailer, Mailer, OutgoingEmail};
pub use gst::GstProcessorNode;
pub use http::WebhookSpreadsheet;
pub use intake::ClientIntakeNode;
pub use report::ReportGeneratorNode;
pub use sheets::{GoogleSheetsActionNode, InMemorySpreadsheet, SheetRequest, SheetResult, SpreadsheetClient};
pub use tax::{income_tax, TaxCalculatorNode, DEFAULT_DEDUCTIONS};
pub use time::{DelayNode, ScheduledTriggerNode};
pub use transform::{calculate, format_inr, DataTransformerNode};

use ledgerruntime::NodeRegistry;
use std::sync::Arc;

/// External services the side-effecting executors talk to
#[derive(Clone)]
pub struct Integrations {
    pub mailer: Arc<dyn Mailer>,
    pub spreadsheet: Arc<dyn SpreadsheetClient>,
    pub extractor: Arc<dyn DocumentExtractor>,
}

impl Default for Integrations {
    /// Offline stand-ins: an outbox mailer, in-memory sheets and sample extraction.
    fn default() -> Self {
        Self {
            mailer: Arc::new(LogMailer::new()),
            spreadsheet: Arc::new(InMemorySpreadsheet::new()),
            extractor: Arc::new(SampleExtractor),
        }
    }
}

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    register_with(registry, Integrations::default());
}

/// Register all standard nodes, wired to the given integrations
pub fn register_with(registry: &mut NodeRegistry, integrations: Integrations) {
    registry.register(Arc::new(ClientIntakeNode));
    registry.register(Arc::new(ScheduledTriggerNode));
    registry.register(Arc::new(DocumentProcessorNode::new(integrations.extractor)));
    registry.register(Arc::new(TaxCalculatorNode));
    registry.register(Arc::new(GstProcessorNode));
    registry.register(Arc::new(ComplianceCheckerNode));
    registry.register(Arc::new(GoogleSheetsActionNode::new(integrations.spreadsheet)));
    registry.register(Arc::new(EmailSenderNode::new(integrations.mailer)));
    registry.register(Arc::new(ConditionNode));
    registry.register(Arc::new(DelayNode));
    registry.register(Arc::new(DataTransformerNode));
    registry.register(Arc::new(ReportGeneratorNode));
    registry.register(Arc::new(AuditLogNode));
}
