use crate::condition::number;
use async_trait::async_trait;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition,
};

const DEFAULT_GST_RATE: f64 = 0.18;

/// GST on a turnover figure, split into CGST/SGST or charged as IGST
pub struct GstProcessorNode;

#[async_trait]
impl NodeExecutor for GstProcessorNode {
    fn node_type(&self) -> NodeType {
        NodeType::GstProcessor
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let field = ctx.config.get_str("turnoverField").unwrap_or("revenue");
        let raw = ctx
            .config
            .get("turnover")
            .or_else(|| ctx.lookup(field))
            .ok_or_else(|| NodeError::MissingInput(field.to_string()))?;
        let turnover = number(raw).ok_or_else(|| NodeError::invalid_type(field, "number", raw))?;

        let rate = ctx.config.get_f64("gstRate").unwrap_or(DEFAULT_GST_RATE);
        let interstate = ctx.config.get_bool("interstate").unwrap_or(false);
        let gst = turnover * rate;
        let (cgst, sgst, igst) = if interstate {
            (0.0, 0.0, gst)
        } else {
            (gst / 2.0, gst / 2.0, 0.0)
        };

        ctx.events.info(format!("GST {} on turnover {}", gst, turnover));

        Ok(NodeOutput::new()
            .with_output("turnover", turnover)
            .with_output("gstRate", rate)
            .with_output("gstAmount", gst)
            .with_output("cgst", cgst)
            .with_output("sgst", sgst)
            .with_output("igst", igst)
            .with_output("interstate", interstate)
            .with_output("totalWithGst", turnover + gst))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Compute GST liability on turnover".to_string(),
            category: "tax".to_string(),
            inputs: vec![PortDefinition::required(
                "revenue",
                "Turnover, or the path named by turnoverField",
            )],
            outputs: vec![
                PortDefinition::required("gstAmount", "Total GST"),
                PortDefinition::required("cgst", "Central share (intra-state)"),
                PortDefinition::required("sgst", "State share (intra-state)"),
                PortDefinition::required("igst", "Integrated GST (inter-state)"),
            ],
        }
    }
}
