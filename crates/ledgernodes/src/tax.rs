use crate::condition::number;
use async_trait::async_trait;
use ledgercore::{
    ConfigExt, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, NodeType,
    PortDefinition, TaxRegime,
};
use serde_json::json;

/// Standard deduction applied when deductions are enabled and none is supplied.
pub const DEFAULT_DEDUCTIONS: f64 = 150_000.0;

// (floor, tax at floor, marginal rate above floor), highest band first
const OLD_SLABS: &[(f64, f64, f64)] = &[
    (1_000_000.0, 112_500.0, 0.30),
    (500_000.0, 12_500.0, 0.20),
    (250_000.0, 0.0, 0.05),
];

const NEW_SLABS: &[(f64, f64, f64)] = &[
    (1_500_000.0, 150_000.0, 0.30),
    (1_200_000.0, 90_000.0, 0.20),
    (900_000.0, 45_000.0, 0.15),
    (600_000.0, 15_000.0, 0.10),
    (300_000.0, 0.0, 0.05),
];

/// Income tax on `taxable` under the given regime's marginal slabs.
pub fn income_tax(taxable: f64, regime: TaxRegime) -> f64 {
    let slabs = match regime {
        TaxRegime::Old => OLD_SLABS,
        TaxRegime::New => NEW_SLABS,
    };
    slabs
        .iter()
        .find(|(floor, _, _)| taxable > *floor)
        .map(|(floor, base, rate)| base + (taxable - floor) * rate)
        .unwrap_or(0.0)
}

/// Individual income-tax computation
pub struct TaxCalculatorNode;

impl TaxCalculatorNode {
    fn amount(ctx: &NodeContext, key: &str, path: &str) -> Result<Option<f64>, NodeError> {
        let Some(value) = ctx.config.get(key).or_else(|| ctx.lookup(path)) else {
            return Ok(None);
        };
        number(value)
            .map(Some)
            .ok_or_else(|| NodeError::invalid_type(path, "number", value))
    }
}

#[async_trait]
impl NodeExecutor for TaxCalculatorNode {
    fn node_type(&self) -> NodeType {
        NodeType::TaxCalculator
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let regime: TaxRegime = ctx
            .config
            .get_str("taxRegime")
            .ok_or_else(|| NodeError::Configuration("taxRegime is required (old | new)".to_string()))?
            .parse()?;
        let income_field = ctx.config.get_str("incomeField").unwrap_or("grossIncome");
        let gross_income = Self::amount(&ctx, "grossIncome", income_field)?
            .ok_or_else(|| NodeError::MissingInput(income_field.to_string()))?;

        let deductions = if ctx.config.get_bool("includeDeductions").unwrap_or(false) {
            Self::amount(&ctx, "deductions", "deductions")?.unwrap_or(DEFAULT_DEDUCTIONS)
        } else {
            0.0
        };

        let taxable_income = (gross_income - deductions).max(0.0);
        let tax = income_tax(taxable_income, regime);
        let assessment_year = ctx.config.get_str("assessmentYear").unwrap_or("2024-25");

        ctx.events.info(format!(
            "Taxable income {} under the {} regime, tax {}",
            taxable_income, regime, tax
        ));

        Ok(NodeOutput::new()
            .with_output("grossIncome", gross_income)
            .with_output("deductions", deductions)
            .with_output("taxableIncome", taxable_income)
            .with_output("taxAmount", tax)
            .with_output("taxRegime", regime.as_str())
            .with_output("assessmentYear", assessment_year)
            .with_output(
                "calculations",
                json!({
                    "basicTax": tax * 0.8,
                    "surcharge": tax * 0.1,
                    "cess": tax * 0.04,
                    "totalTax": tax,
                }),
            ))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Compute income tax under the old or new regime".to_string(),
            category: "tax".to_string(),
            inputs: vec![
                PortDefinition::required("grossIncome", "Gross income, or the path named by incomeField"),
                PortDefinition::optional("deductions", "Deduction amount when includeDeductions is set"),
            ],
            outputs: vec![
                PortDefinition::required("taxableIncome", "Income after deductions"),
                PortDefinition::required("taxAmount", "Total tax payable"),
                PortDefinition::required("calculations", "basicTax, surcharge and cess split"),
            ],
        }
    }
}
