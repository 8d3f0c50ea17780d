use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    routing::get,
    Router,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{
    app_state::AppState,
    error::{NodeError, StoreError},
    models::{NewNode, Node, NodeCollection, NodePatch},
};

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/nodes", get(list_nodes_handler).post(create_node_handler))
        .route("/nodes/", get(list_nodes_handler).post(create_node_handler))
        .route(
            "/nodes/:node_id",
            get(get_node_handler)
                .put(update_node_handler)
                .delete(delete_node_handler),
        )
        .route("/nodes/:node_id/children", get(list_children_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}

// --- Handlers ---

#[axum::debug_handler]
async fn list_nodes_handler(
    State(state): State<AppState>,
) -> Result<Json<NodeCollection>, ApiError> {
    let nodes = state.nodes.list_all().await.map_err(error_response)?;
    Ok(Json(nodes.into()))
}

#[axum::debug_handler]
async fn get_node_handler(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<Node>, ApiError> {
    let node = state.nodes.get(&node_id).await.map_err(error_response)?;
    Ok(Json(node))
}

/// Devuelve todos los descendientes, no sólo los hijos directos.
#[axum::debug_handler]
async fn list_children_handler(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<NodeCollection>, ApiError> {
    let nodes = state
        .nodes
        .list_descendants(&node_id)
        .await
        .map_err(error_response)?;
    Ok(Json(nodes.into()))
}

#[axum::debug_handler]
async fn create_node_handler(
    State(state): State<AppState>,
    payload: Result<Json<NewNode>, JsonRejection>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let Json(payload) = payload.map_err(rejection_response)?;
    let node = state.nodes.create(payload).await.map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(node)))
}

#[axum::debug_handler]
async fn update_node_handler(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    payload: Result<Json<NodePatch>, JsonRejection>,
) -> Result<Json<Node>, ApiError> {
    let Json(payload) = payload.map_err(rejection_response)?;
    let node = state
        .nodes
        .update(&node_id, payload)
        .await
        .map_err(error_response)?;
    Ok(Json(node))
}

#[axum::debug_handler]
async fn delete_node_handler(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.nodes.delete(&node_id).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.nodes.ping().await.map_err(error_response)?;
    Ok(Json(json!({ "status": "ok" })))
}

// --- Utilidades ---

fn status_for(err: &NodeError) -> StatusCode {
    match err {
        NodeError::NotFound(_) => StatusCode::NOT_FOUND,
        NodeError::NoFieldsToUpdate => StatusCode::BAD_REQUEST,
        NodeError::Validation(_)
        | NodeError::UnknownParent(_)
        | NodeError::ParentNotDirectory(_) => StatusCode::UNPROCESSABLE_ENTITY,
        NodeError::HasChildren(_) | NodeError::Store(StoreError::Duplicate(_)) => {
            StatusCode::CONFLICT
        }
        NodeError::Store(StoreError::Backend(_)) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: NodeError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Error del almacén: {:#}", err);
    } else {
        warn!("Petición rechazada ({}): {}", status.as_u16(), err);
    }
    (
        status,
        Json(json!({ "error": err.to_string(), "code": err.code() })),
    )
}

/// Cuerpos JSON mal formados o incompletos usan el mismo sobre de error
/// que los errores del servicio.
fn rejection_response(rejection: JsonRejection) -> ApiError {
    let status = rejection.status();
    let message = rejection.body_text();
    warn!("Cuerpo rechazado ({}): {}", status.as_u16(), message);
    (
        status,
        Json(json!({ "error": message, "code": "invalid_body" })),
    )
}
