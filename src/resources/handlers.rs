//! Default sub-router handlers over a [`Collection`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};

use crate::error::AppError;
use crate::resources::store::{Collection, Store};
use crate::routing::not_found;

fn document_not_found() -> AppError {
    AppError::NotFound("No document found with that ID".to_string())
}

fn object_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, AppError> {
    let Json(value) = payload?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::MalformedBody(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

async fn list_documents(State(collection): State<Arc<Collection>>) -> Json<Value> {
    let docs = collection.list();
    Json(json!({
        "status": "success",
        "results": docs.len(),
        "data": { "data": docs },
    }))
}

async fn create_document(
    State(collection): State<Arc<Collection>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let doc = collection.create(object_body(payload)?);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "data": doc } })),
    )
        .into_response())
}

async fn get_document(
    State(collection): State<Arc<Collection>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doc = collection.get(&id).ok_or_else(document_not_found)?;
    Ok(Json(json!({ "status": "success", "data": { "data": doc } })))
}

async fn update_document(
    State(collection): State<Arc<Collection>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let changes = object_body(payload)?;
    let doc = collection.update(&id, changes).ok_or_else(document_not_found)?;
    Ok(Json(json!({ "status": "success", "data": { "data": doc } })))
}

async fn delete_document(
    State(collection): State<Arc<Collection>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if collection.delete(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(document_not_found())
    }
}

/// CRUD sub-router for one collection, relative to its mount point.
pub fn collection_router(collection: Arc<Collection>) -> Router {
    Router::new()
        .route("/", get(list_documents).post(create_document))
        .route(
            "/{id}",
            get(get_document)
                .patch(update_document)
                .delete(delete_document),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(collection)
}

async fn entity_counts(State(store): State<Store>) -> Json<Value> {
    Json(json!({ "status": "success", "data": store.counts() }))
}

/// Summary sub-router: document count of every collection.
pub fn entities_router(store: Store) -> Router {
    Router::new()
        .route("/", get(entity_counts))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .with_state(store)
}
