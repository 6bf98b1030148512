use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use ledgernodes::{Integrations, WebhookSpreadsheet};
use ledgerruntime::{FlowRuntime, NodeRegistry, RuntimeConfig};
use ledgerserver::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulated integrations, with spreadsheet writes sent to
/// `SHEETS_WEBHOOK_URL` when it is set.
fn integrations() -> Integrations {
    let mut integrations = Integrations::default();
    if let Ok(url) = std::env::var("SHEETS_WEBHOOK_URL") {
        let mut client = WebhookSpreadsheet::new(url);
        if let Ok(token) = std::env::var("SHEETS_WEBHOOK_TOKEN") {
            client = client.with_header("Authorization", format!("Bearer {}", token));
        }
        info!("Spreadsheet writes go to {}", client.url());
        integrations.spreadsheet = Arc::new(client);
    }
    integrations
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting LedgerFlow Server");

    let config = RuntimeConfig::from_env()?;
    let mut registry = NodeRegistry::new();
    ledgernodes::register_with(&mut registry, integrations());

    let runtime = FlowRuntime::with_registry(Arc::new(registry), config);

    info!(
        "✅ Runtime initialized with {} node types and {} templates",
        runtime.registry().len(),
        runtime.get_templates().len()
    );

    let app_state = web::Data::new(AppState::new(runtime));

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .configure(ledgerserver::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
