//! HTTP handlers for the catalog API

use super::params::{SearchBody, SearchParams};
use super::response::{
    render_collection, render_feature_collection, render_item, ApiError, LinkBuilder,
    CONFORMANCE_CLASSES,
};
use super::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

type HandlerResult = Result<Json<Value>, ApiError>;

fn links_for(state: &AppState, headers: &HeaderMap) -> LinkBuilder {
    LinkBuilder::for_request(
        headers,
        state.public_url.as_deref(),
        &state.base_path,
    )
}

/// GET /: catalog landing page
pub async fn landing(State(state): State<Arc<AppState>>, headers: HeaderMap) -> HandlerResult {
    let links = links_for(&state, &headers);
    let collections = state.store.list_collections().await?;
    let ids: Vec<String> = collections.into_iter().map(|c| c.id).collect();
    Ok(Json(json!({
        "type": "Catalog",
        "stac_version": crate::model::STAC_VERSION,
        "id": state.catalog_id,
        "title": state.catalog_title,
        "description": state.catalog_description,
        "conformsTo": CONFORMANCE_CLASSES,
        "links": links.landing_links(&ids),
    })))
}

/// GET /conformance
pub async fn conformance() -> Json<Value> {
    Json(json!({ "conformsTo": CONFORMANCE_CLASSES }))
}

/// GET /api: OpenAPI service description
pub async fn service_desc(State(state): State<Arc<AppState>>) -> Json<Value> {
    let get_op = |summary: &str| json!({"get": {"summary": summary, "responses": {"200": {"description": "Success"}}}});
    Json(json!({
        "openapi": "3.0.3",
        "info": {
            "title": state.catalog_title,
            "description": state.catalog_description,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/": get_op("Landing page"),
            "/conformance": get_op("Conformance classes"),
            "/collections": get_op("List collections"),
            "/collections/{collection_id}": get_op("Get a collection"),
            "/collections/{collection_id}/items": get_op("List collection items"),
            "/collections/{collection_id}/items/{item_id}": get_op("Get an item"),
            "/search": {
                "get": {"summary": "Search items", "responses": {"200": {"description": "Success"}}},
                "post": {"summary": "Search items", "responses": {"200": {"description": "Success"}}},
            },
        },
    }))
}

/// GET /collections
pub async fn list_collections(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> HandlerResult {
    let links = links_for(&state, &headers);
    let collections = state.store.list_collections().await?;
    let mut rendered = Vec::with_capacity(collections.len());
    for collection in &collections {
        let extent = state.store.collection_extent(&collection.id).await?;
        rendered.push(render_collection(collection, &extent, &links));
    }
    Ok(Json(json!({
        "collections": rendered,
        "links": [
            crate::model::Link::new("self", links.href("/collections"), super::response::MEDIA_JSON),
            crate::model::Link::new("root", links.root(), super::response::MEDIA_JSON),
        ],
    })))
}

/// GET /collections/{collection_id}
pub async fn get_collection(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(collection_id): Path<String>,
) -> HandlerResult {
    let links = links_for(&state, &headers);
    let collection = state
        .store
        .get_collection(&collection_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("collection '{collection_id}' not found")))?;
    let extent = state.store.collection_extent(&collection.id).await?;
    Ok(Json(render_collection(&collection, &extent, &links)))
}

/// GET /collections/{collection_id}/items
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(collection_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> HandlerResult {
    let links = links_for(&state, &headers);
    if !state.store.collection_exists(&collection_id).await? {
        return Err(crate::error::Error::CollectionNotFound(collection_id).into());
    }
    let filter = params.into_filter(Some(&collection_id))?;
    let items = state.store.query_items(&filter).await?;
    let self_href = links.href(&format!("/collections/{collection_id}/items"));
    Ok(Json(render_feature_collection(&items, self_href, &links)))
}

/// GET /collections/{collection_id}/items/{item_id}
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((collection_id, item_id)): Path<(String, String)>,
) -> HandlerResult {
    let links = links_for(&state, &headers);
    let item = state
        .store
        .get_item(&collection_id, &item_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "item '{item_id}' not found in collection '{collection_id}'"
            ))
        })?;
    Ok(Json(render_item(&item, &links)))
}

/// GET /search
pub async fn search_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> HandlerResult {
    let links = links_for(&state, &headers);
    let filter = params.into_filter(None)?;
    let items = state.store.query_items(&filter).await?;
    Ok(Json(render_feature_collection(
        &items,
        links.href("/search"),
        &links,
    )))
}

/// POST /search
pub async fn search_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> HandlerResult {
    let links = links_for(&state, &headers);
    let filter = body.into_filter()?;
    let items = state.store.query_items(&filter).await?;
    Ok(Json(render_feature_collection(
        &items,
        links.href("/search"),
        &links,
    )))
}
