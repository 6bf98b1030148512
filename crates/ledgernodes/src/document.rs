use async_trait::async_trait;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Fields pulled out of one document
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fields: Map<String, Value>,
    pub confidence: f64,
}

/// OCR / parsing backend used by [`DocumentProcessorNode`]
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &Value) -> Result<Extraction, NodeError>;
}

/// Offline extractor returning fixed sample figures per document type.
///
/// A document that carries its own `fields` object is passed through as is,
/// with its `confidence` when given.
pub struct SampleExtractor;

impl SampleExtractor {
    fn sample(doc_type: &str) -> Option<Value> {
        let fields = match doc_type {
            "form16" => json!({
                "grossIncome": 800_000,
                "employer": "Acme Industries Pvt Ltd",
                "tdsDeducted": 18_500
            }),
            "bank_interest" => json!({ "interestIncome": 12_000 }),
            "bank_statement" => json!({ "closingBalance": 245_000 }),
            "investment_proofs" => json!({ "section80C": 150_000 }),
            "pan_card" => json!({ "panNumber": "ABCDE1234F", "name": "John Doe" }),
            "address_proof" => json!({ "address": "12 MG Road, Mumbai 400001" }),
            "sales_register" => json!({ "revenue": 1_250_000 }),
            "purchase_register" => json!({ "inputTaxCredit": 85_000 }),
            "trial_balance" => json!({ "totalDebits": 4_850_000, "totalCredits": 4_850_000 }),
            "general_ledger" => json!({ "ledgerAccounts": 42 }),
            _ => return None,
        };
        Some(fields)
    }
}

#[async_trait]
impl DocumentExtractor for SampleExtractor {
    async fn extract(&self, document: &Value) -> Result<Extraction, NodeError> {
        if let Some(Value::Object(fields)) = document.get("fields") {
            return Ok(Extraction {
                fields: fields.clone(),
                confidence: document.get("confidence").and_then(Value::as_f64).unwrap_or(0.95),
            });
        }
        let doc_type = document.get("type").and_then(Value::as_str).unwrap_or("unknown");
        Ok(match Self::sample(doc_type) {
            Some(Value::Object(fields)) => Extraction { fields, confidence: 0.95 },
            _ => Extraction { fields: Map::new(), confidence: 0.6 },
        })
    }
}

/// Extracts data from the client's documents
pub struct DocumentProcessorNode {
    extractor: Arc<dyn DocumentExtractor>,
}

impl DocumentProcessorNode {
    pub fn new(extractor: Arc<dyn DocumentExtractor>) -> Self {
        Self { extractor }
    }

    // config documents, then input documents, then one per configured documentType
    fn documents(ctx: &NodeContext) -> Vec<Value> {
        let listed = ctx
            .config
            .get("documents")
            .or_else(|| ctx.lookup("documents"))
            .and_then(Value::as_array)
            .filter(|docs| !docs.is_empty());
        if let Some(docs) = listed {
            return docs
                .iter()
                .map(|doc| match doc {
                    Value::String(kind) => json!({ "type": kind }),
                    other => other.clone(),
                })
                .collect();
        }
        ctx.config
            .get_string_list("documentTypes")
            .unwrap_or_default()
            .into_iter()
            .map(|kind| json!({ "type": kind }))
            .collect()
    }
}

#[async_trait]
impl NodeExecutor for DocumentProcessorNode {
    fn node_type(&self) -> NodeType {
        NodeType::DocumentProcessor
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let min_confidence = ctx.config.get_f64("minConfidence").unwrap_or(0.8);
        let documents = Self::documents(&ctx);

        let mut extracted = Map::new();
        let mut processed = Vec::with_capacity(documents.len());
        let mut low_confidence = Vec::new();
        let mut confidence_sum = 0.0;

        for (i, document) in documents.iter().enumerate() {
            let doc_type = document
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();
            let extraction = self.extractor.extract(document).await?;
            let needs_review = extraction.confidence < min_confidence;
            if needs_review {
                ctx.events.warn(format!(
                    "{} extracted with low confidence {:.2}",
                    doc_type, extraction.confidence
                ));
                low_confidence.push(Value::String(doc_type.clone()));
            }
            ctx.events.progress(
                (i + 1) as f64 * 100.0 / documents.len() as f64,
                Some(format!("Processed {}", doc_type)),
            );

            confidence_sum += extraction.confidence;
            processed.push(json!({
                "type": doc_type,
                "processed": true,
                "extractedFields": extraction.fields.keys().cloned().collect::<Vec<_>>(),
                "confidence": extraction.confidence,
                "needsReview": needs_review,
            }));
            extracted.extend(extraction.fields);
        }

        let confidence = if documents.is_empty() {
            0.0
        } else {
            confidence_sum / documents.len() as f64
        };
        let status = if low_confidence.is_empty() { "completed" } else { "needs_review" };

        Ok(NodeOutput::new()
            .with_output("documentsProcessed", documents.len())
            .with_output("processedDocuments", processed)
            .with_output("extractedData", Value::Object(extracted))
            .with_output("confidence", confidence)
            .with_output("lowConfidence", low_confidence)
            .with_output("status", status))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Extract data from uploaded documents".to_string(),
            category: "documents".to_string(),
            inputs: vec![PortDefinition::optional(
                "documents",
                "Documents to process; defaults to one per configured documentType",
            )],
            outputs: vec![
                PortDefinition::required("extractedData", "Merged fields from every document"),
                PortDefinition::required("confidence", "Average extraction confidence"),
                PortDefinition::required("lowConfidence", "Document types below minConfidence"),
            ],
        }
    }
}
