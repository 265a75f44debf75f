//! STAC-like catalog HTTP API
//!
//! Read-only API over the catalog store: landing page, conformance,
//! collections with computed extents, item listing, and search.

mod handlers;
pub mod params;
pub mod response;

use crate::config::Config;
use crate::store::CatalogStore;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
pub struct AppState {
    pub store: CatalogStore,
    pub base_path: String,
    pub public_url: Option<String>,
    pub catalog_id: String,
    pub catalog_title: String,
    pub catalog_description: String,
}

impl AppState {
    pub fn new(store: CatalogStore, config: &Config) -> Self {
        Self {
            store,
            base_path: config.api.base_path.clone(),
            public_url: config.api.public_url.clone(),
            catalog_id: config.api.catalog_id.clone(),
            catalog_title: config.api.catalog_title.clone(),
            catalog_description: config.api.catalog_description.clone(),
        }
    }
}

/// Build the application router, nested under the configured base path.
pub fn build_router(state: Arc<AppState>) -> Router {
    let base_path = state.base_path.clone();
    let api = Router::new()
        .route("/", get(handlers::landing))
        .route("/conformance", get(handlers::conformance))
        .route("/api", get(handlers::service_desc))
        .route("/collections", get(handlers::list_collections))
        .route("/collections/{collection_id}", get(handlers::get_collection))
        .route(
            "/collections/{collection_id}/items",
            get(handlers::list_items),
        )
        .route(
            "/collections/{collection_id}/items/{item_id}",
            get(handlers::get_item),
        )
        .route(
            "/search",
            get(handlers::search_get).post(handlers::search_post),
        )
        .with_state(state);

    let router = if base_path == "/" {
        api
    } else {
        Router::new().nest(&base_path, api)
    };
    router.layer(TraceLayer::new_for_http())
}
