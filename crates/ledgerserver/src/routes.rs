use crate::{ApiError, AppState};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use actix_ws::Message;
use ledgercore::{
    Complexity, ExecutionId, NodeId, TemplateCategory, TemplateOverrides, Workflow, WorkflowError,
    WorkflowId, WorkflowUpdate,
};
use ledgerruntime::ExecutionRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

type ApiResult = Result<HttpResponse, ApiError>;

#[derive(Debug, Deserialize)]
pub struct WorkflowQuery {
    q: Option<String>,
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionQuery {
    workflow_id: Option<WorkflowId>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateQuery {
    category: Option<TemplateCategory>,
    complexity: Option<Complexity>,
}

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    execution_id: Option<ExecutionId>,
}

/// Request body for workflow execution
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    data: Value,
    trigger_node: Option<NodeId>,
}

#[derive(Debug, Deserialize)]
pub struct CloneRequest {
    name: String,
}

/// Response for a started run
#[derive(Debug, Serialize)]
struct ExecutionStarted {
    execution_id: ExecutionId,
    status: &'static str,
}

fn started(execution_id: ExecutionId) -> HttpResponse {
    HttpResponse::Accepted().json(ExecutionStarted {
        execution_id,
        status: "running",
    })
}

fn summary(w: &Workflow) -> Value {
    json!({
        "id": w.id,
        "name": w.name,
        "description": w.description,
        "is_active": w.is_active,
        "tags": w.tags,
        "created_by": w.created_by,
        "nodes": w.nodes.len(),
        "connections": w.connections.len(),
        "updated_at": w.updated_at,
    })
}

/// Health check endpoint
#[get("/health")]
async fn health_check(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "ledgerflow",
        "node_types": data.runtime.registry().len(),
    }))
}

// ---- workflows ----

/// List workflows, optionally filtered by free text or owner
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>, query: web::Query<WorkflowQuery>) -> ApiResult {
    let workflows = match (&query.q, &query.owner) {
        (Some(q), _) => data.runtime.search_workflows(q).await?,
        (None, Some(owner)) => data.runtime.workflows_by_owner(owner).await?,
        (None, None) => data.runtime.list_workflows().await?,
    };
    let list: Vec<Value> = workflows.iter().map(summary).collect();
    Ok(HttpResponse::Ok().json(list))
}

#[post("/api/workflows")]
async fn create_workflow(data: web::Data<AppState>, workflow: web::Json<Workflow>) -> ApiResult {
    let workflow = data.runtime.create_workflow(workflow.into_inner()).await?;
    info!("Created workflow: {} ({})", workflow.name, workflow.id);
    Ok(HttpResponse::Created().json(workflow))
}

/// Validate without saving
#[post("/api/workflows/validate")]
async fn validate_workflow(data: web::Data<AppState>, workflow: web::Json<Workflow>) -> impl Responder {
    HttpResponse::Ok().json(data.runtime.validate(&workflow))
}

#[get("/api/workflows/{id}")]
async fn get_workflow(data: web::Data<AppState>, path: web::Path<WorkflowId>) -> ApiResult {
    let id = path.into_inner();
    let workflow = data
        .runtime
        .get_workflow(id)
        .await?
        .ok_or(WorkflowError::NotFound(id))?;
    Ok(HttpResponse::Ok().json(workflow))
}

#[put("/api/workflows/{id}")]
async fn update_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
    update: web::Json<WorkflowUpdate>,
) -> ApiResult {
    let workflow = data
        .runtime
        .update_workflow(path.into_inner(), update.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(workflow))
}

#[delete("/api/workflows/{id}")]
async fn delete_workflow(data: web::Data<AppState>, path: web::Path<WorkflowId>) -> ApiResult {
    let id = path.into_inner();
    if !data.runtime.delete_workflow(id).await? {
        return Err(WorkflowError::NotFound(id).into());
    }
    info!("Deleted workflow: {}", id);
    Ok(HttpResponse::Ok().json(json!({ "message": "Workflow deleted successfully" })))
}

#[post("/api/workflows/{id}/clone")]
async fn clone_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
    body: web::Json<CloneRequest>,
) -> ApiResult {
    let copy = data
        .runtime
        .clone_workflow(path.into_inner(), &body.name)
        .await?;
    Ok(HttpResponse::Created().json(copy))
}

/// Start a run; the response carries the execution id, not the result
#[post("/api/workflows/{id}/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
    body: Option<web::Json<ExecuteRequest>>,
) -> ApiResult {
    let id = path.into_inner();
    let body = body.map(web::Json::into_inner).unwrap_or_default();

    let mut request = ExecutionRequest::new(body.data).triggered_by("api");
    if let Some(node_id) = body.trigger_node {
        request = request.from_node(node_id);
    }
    let execution_id = data.runtime.submit(id, request).await?;
    info!("Started execution {} of workflow {}", execution_id, id);
    Ok(started(execution_id))
}

// ---- executions ----

#[get("/api/executions")]
async fn list_executions(data: web::Data<AppState>, query: web::Query<ExecutionQuery>) -> ApiResult {
    let history = data.runtime.execution_history(query.workflow_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[get("/api/executions/{id}")]
async fn get_execution(data: web::Data<AppState>, path: web::Path<ExecutionId>) -> ApiResult {
    let id = path.into_inner();
    let execution = data
        .runtime
        .get_execution_status(id)
        .await?
        .ok_or(WorkflowError::ExecutionNotFound(id))?;
    Ok(HttpResponse::Ok().json(execution))
}

#[post("/api/executions/{id}/cancel")]
async fn cancel_execution(data: web::Data<AppState>, path: web::Path<ExecutionId>) -> impl Responder {
    let cancelled = data.runtime.cancel_execution(path.into_inner()).await;
    HttpResponse::Ok().json(json!({ "cancelled": cancelled }))
}

// ---- templates ----

#[get("/api/templates")]
async fn list_templates(data: web::Data<AppState>, query: web::Query<TemplateQuery>) -> impl Responder {
    let templates: Vec<_> = data
        .runtime
        .get_templates()
        .iter()
        .filter(|t| query.category.map_or(true, |c| t.category == c))
        .filter(|t| query.complexity.map_or(true, |c| t.complexity == c))
        .collect();
    HttpResponse::Ok().json(templates)
}

#[get("/api/templates/{id}")]
async fn get_template(data: web::Data<AppState>, path: web::Path<String>) -> ApiResult {
    let id = path.into_inner();
    let template = data
        .runtime
        .get_template(&id)
        .ok_or_else(|| WorkflowError::TemplateNotFound(id.clone()))?;
    Ok(HttpResponse::Ok().json(template))
}

#[post("/api/templates/{id}/instantiate")]
async fn instantiate_template(
    data: web::Data<AppState>,
    path: web::Path<String>,
    overrides: Option<web::Json<TemplateOverrides>>,
) -> ApiResult {
    let overrides = overrides.map(web::Json::into_inner).unwrap_or_default();
    let workflow = data
        .runtime
        .create_workflow_from_template(&path.into_inner(), overrides)
        .await?;
    Ok(HttpResponse::Created().json(workflow))
}

#[post("/api/templates/{id}/execute")]
async fn execute_template(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: Option<web::Json<ExecuteRequest>>,
) -> ApiResult {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let execution_id = data
        .runtime
        .execute_template(&path.into_inner(), body.data)
        .await?;
    Ok(started(execution_id))
}

// ---- observability ----

#[get("/api/stats")]
async fn stats(data: web::Data<AppState>) -> ApiResult {
    Ok(HttpResponse::Ok().json(data.runtime.get_workflow_stats().await?))
}

/// List available node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> impl Responder {
    let registry = data.runtime.registry();
    let nodes: Vec<_> = registry
        .list_node_types()
        .iter()
        .map(|node_type| {
            json!({
                "type": node_type,
                "metadata": registry.get_metadata(node_type),
            })
        })
        .collect();

    HttpResponse::Ok().json(nodes)
}

/// WebSocket endpoint for real-time events, optionally for one execution
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    query: web::Query<EventQuery>,
) -> actix_web::Result<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let filter = query.execution_id;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if filter.is_some_and(|id| id != event.execution_id()) {
                                continue;
                            }
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("WebSocket client lagged, {} events dropped", skipped);
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// Mount every route. `/api/workflows/validate` is registered ahead of
/// `/api/workflows/{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(validate_workflow)
        .service(list_workflows)
        .service(create_workflow)
        .service(get_workflow)
        .service(update_workflow)
        .service(delete_workflow)
        .service(clone_workflow)
        .service(execute_workflow)
        .service(list_executions)
        .service(get_execution)
        .service(cancel_execution)
        .service(list_templates)
        .service(get_template)
        .service(instantiate_template)
        .service(execute_template)
        .service(stats)
        .service(list_node_types)
        .service(websocket_events);
}
