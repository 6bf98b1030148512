// crates/ledgercli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ledgercore::{
    Branch, Complexity, ExecutionEvent, ExecutionStatus, NodeEvent, NodeSpec, NodeStatus,
    NodeType, TemplateCategory, TemplateOverrides, Workflow,
};
use ledgerruntime::{FlowRuntime, NodeRegistry, RuntimeConfig, TemplateRegistry};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Practice workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Start a partial run at this node
        #[arg(long)]
        from_node: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// List built-in templates
    Templates {
        #[arg(long)]
        category: Option<TemplateCategory>,

        #[arg(long)]
        complexity: Option<Complexity>,
    },

    /// Write a workflow instantiated from a template
    Instantiate {
        /// Template id
        template: String,

        /// Name for the new workflow
        #[arg(long)]
        name: Option<String>,

        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

fn standard_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    ledgernodes::register_all(&mut registry);
    registry
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&workflow_json).with_context(|| format!("parsing {}", file.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            from_node,
            verbose,
        } => {
            // Initialize logging
            let level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
                )
                .init();

            run_workflow(&file, input, from_node).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Templates {
            category,
            complexity,
        } => {
            list_templates(category, complexity);
        }

        Commands::Instantiate {
            template,
            name,
            output,
        } => {
            instantiate_template(&template, name, &output)?;
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::WorkflowStarted { triggered_by, .. } => {
            println!("▶️  Workflow started ({})", triggered_by);
        }
        ExecutionEvent::NodeStarted {
            node_id, node_type, ..
        } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        ExecutionEvent::NodeCompleted {
            node_id,
            duration_ms,
            ..
        } => {
            println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
        }
        ExecutionEvent::NodeFailed {
            node_id,
            error,
            optional,
            ..
        } => {
            let note = if optional { " (optional)" } else { "" };
            println!("  ❌ Node {} failed{}: {}", node_id, note, error);
        }
        ExecutionEvent::NodeSkipped { node_id, .. } => {
            println!("  ⏭️  Node {} skipped", node_id);
        }
        ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", node_id, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", node_id, message);
            }
            NodeEvent::Progress { percent, message } => {
                if let Some(msg) = message {
                    println!("     📊 [{}] {:.0}% - {}", node_id, percent, msg);
                } else {
                    println!("     📊 [{}] {:.0}%", node_id, percent);
                }
            }
            NodeEvent::Data { .. } => {}
        },
        ExecutionEvent::WorkflowFinished {
            status,
            duration_ms,
            ..
        } => match status {
            ExecutionStatus::Completed => {
                println!("✨ Workflow completed successfully in {}ms", duration_ms)
            }
            other => println!("💥 Workflow {} after {}ms", other, duration_ms),
        },
    }
}

async fn run_workflow(file: &Path, input: Option<String>, from_node: Option<String>) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(file)?;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let data: Value = match input {
        Some(input_str) => serde_json::from_str(&input_str).context("parsing --input")?,
        None => json!({}),
    };

    let runtime = FlowRuntime::with_registry(Arc::new(standard_registry()), RuntimeConfig::from_env()?);

    // Subscribe before starting so no event is missed
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let finished = matches!(event, ExecutionEvent::WorkflowFinished { .. });
            print_event(event);
            if finished {
                break;
            }
        }
    });

    let workflow = runtime.create_workflow(workflow).await?;
    tracing::debug!("registered workflow {}", workflow.id);
    let execution_id = match from_node {
        Some(node_id) => {
            runtime
                .execute_workflow_from(workflow.id, &node_id, data)
                .await?
        }
        None => runtime.execute_workflow(workflow.id, data).await?,
    };
    let execution = runtime.wait_for_execution(execution_id).await?;

    // Let the printer drain the final events
    let _ = tokio::time::timeout(Duration::from_secs(1), event_task).await;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", execution.id);
    println!("   Status: {}", execution.status);
    println!(
        "   Completed: {}/{} nodes ({} skipped, {} failed)",
        execution.count(NodeStatus::Completed),
        execution.node_executions.len(),
        execution.count(NodeStatus::Skipped),
        execution.count(NodeStatus::Failed),
    );

    let outputs: Vec<_> = execution
        .node_executions
        .iter()
        .filter_map(|n| n.output.as_ref().map(|o| (&n.node_id, o)))
        .collect();
    if !outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        for (node_id, output) in outputs {
            println!("   Node {}:", node_id);
            println!("     {}", serde_json::to_string_pretty(output)?.replace('\n', "\n     "));
        }
    }

    if let Some(error) = execution.error {
        bail!("workflow {}: {}", execution.status, error);
    }
    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let runtime = FlowRuntime::with_registry(Arc::new(standard_registry()), RuntimeConfig::default());
    let report = runtime.validate(&workflow);

    if !report.is_valid {
        println!("❌ Workflow is invalid:");
        for error in &report.errors {
            println!("   - {}", error);
        }
        bail!("{} validation error(s)", report.errors.len());
    }

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = standard_registry();

    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn list_templates(category: Option<TemplateCategory>, complexity: Option<Complexity>) {
    println!("📚 Templates:");
    println!();

    let registry = TemplateRegistry::with_builtin();
    let templates = registry
        .list()
        .iter()
        .filter(|t| category.map_or(true, |c| t.category == c))
        .filter(|t| complexity.map_or(true, |c| t.complexity == c));

    for template in templates {
        println!(
            "  • {} [{}, {}, ~{} min]",
            template.id, template.category, template.complexity, template.estimated_minutes
        );
        println!("    {}", template.name);
        println!("    {}", template.preview);
    }
}

fn instantiate_template(template_id: &str, name: Option<String>, output: &Path) -> Result<()> {
    let overrides = TemplateOverrides {
        name,
        ..TemplateOverrides::default()
    };
    let workflow = TemplateRegistry::with_builtin().instantiate(template_id, &overrides)?;

    std::fs::write(output, serde_json::to_string_pretty(&workflow)?)?;

    println!("✨ Created workflow '{}' from {}: {}", workflow.name, template_id, output.display());
    Ok(())
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = Workflow::new("Example Client Check")
        .with_description("Takes a new client, checks PAN/GSTIN and either records them or asks for review");

    let intake = workflow.add_node(
        NodeSpec::new("intake", NodeType::ClientIntake)
            .with_label("New Client")
            .with_config("requiredFields", json!(["name", "email", "pan"]))
            .with_position(100.0, 100.0),
    );
    let compliance = workflow.add_node(
        NodeSpec::new("compliance", NodeType::ComplianceChecker)
            .with_label("PAN / GSTIN Check")
            .with_position(300.0, 100.0),
    );
    let gate = workflow.add_node(
        NodeSpec::new("gate", NodeType::Condition)
            .with_label("Compliant?")
            .with_config("fieldPath", "compliance.compliant")
            .with_config("operator", "equals")
            .with_config("compareValue", true)
            .with_position(500.0, 100.0),
    );
    let record = workflow.add_node(
        NodeSpec::new("record", NodeType::GoogleSheetsAction)
            .with_label("Add to Client Sheet")
            .with_config("operation", "append")
            .with_config("sheetName", "Clients")
            .with_position(700.0, 50.0),
    );
    let review = workflow.add_node(
        NodeSpec::new("review", NodeType::EmailSender)
            .with_label("Ask for Review")
            .with_config("recipients", json!(["review@practice.example"]))
            .with_config("subject", "Client needs review")
            .with_config("template", "Compliance check failed: {{compliance.status}}")
            .with_position(700.0, 150.0),
    );

    workflow.connect(intake, compliance.clone());
    workflow.connect(compliance, gate.clone());
    workflow.connect_branch(gate.clone(), record, Branch::True);
    workflow.connect_branch(gate, review, Branch::False);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  ledger run --file {} --input '{{\"name\": \"Asha Rao\", \"email\": \"asha@example.com\", \"pan\": \"ABCDE1234F\"}}'",
        output.display()
    );

    Ok(())
}
