//! API error mapping and link assembly

use crate::error::Error;
use crate::model::{Collection, Extent, Item, Link};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub const MEDIA_JSON: &str = "application/json";
pub const MEDIA_GEOJSON: &str = "application/geo+json";
pub const MEDIA_OPENAPI: &str = "application/vnd.oai.openapi+json;version=3.0";

/// Conformance classes the API implements
pub const CONFORMANCE_CLASSES: &[&str] = &[
    "https://api.stacspec.org/v1.0.0/core",
    "https://api.stacspec.org/v1.0.0/collections",
    "https://api.stacspec.org/v1.0.0/item-search",
];

/// An error rendered to an HTTP response
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, description) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Internal(msg) => {
                error!("Internal error serving request: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        let body = Json(json!({
            "code": status.as_u16(),
            "description": description,
        }));
        (status, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidQuery(msg) => Self::BadRequest(msg),
            Error::CollectionNotFound(id) => Self::NotFound(format!("collection '{id}' not found")),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Builds absolute hrefs for navigational links.
///
/// The advertised origin comes from the configured public URL when set,
/// otherwise from the request's forwarded-proto and host headers.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    /// Resolve the base URL for this request: `<origin><base_path>`.
    pub fn for_request(headers: &HeaderMap, public_url: Option<&str>, base_path: &str) -> Self {
        let origin = match public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let proto = headers
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("http");
                let host = headers
                    .get(axum::http::header::HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("localhost");
                format!("{proto}://{host}")
            }
        };
        let base_path = base_path.trim_end_matches('/');
        Self {
            base: format!("{origin}{base_path}"),
        }
    }

    pub fn root(&self) -> String {
        self.base.clone()
    }

    pub fn href(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn landing_links(&self, collection_ids: &[String]) -> Vec<Link> {
        let mut links = vec![
            Link::new("self", self.root(), MEDIA_JSON),
            Link::new("root", self.root(), MEDIA_JSON),
            Link::new("conformance", self.href("/conformance"), MEDIA_JSON),
            Link::new("data", self.href("/collections"), MEDIA_JSON),
            Link::new("search", self.href("/search"), MEDIA_GEOJSON),
            Link::new("service-desc", self.href("/api"), MEDIA_OPENAPI),
        ];
        for id in collection_ids {
            links.push(Link::new(
                "child",
                self.href(&format!("/collections/{id}")),
                MEDIA_JSON,
            ));
        }
        links
    }

    pub fn collection_links(&self, collection_id: &str) -> Vec<Link> {
        vec![
            Link::new(
                "self",
                self.href(&format!("/collections/{collection_id}")),
                MEDIA_JSON,
            ),
            Link::new(
                "items",
                self.href(&format!("/collections/{collection_id}/items")),
                MEDIA_GEOJSON,
            ),
            Link::new("parent", self.root(), MEDIA_JSON),
            Link::new("root", self.root(), MEDIA_JSON),
        ]
    }

    pub fn item_links(&self, collection_id: &str, item_id: &str) -> Vec<Link> {
        let collection_href = self.href(&format!("/collections/{collection_id}"));
        vec![
            Link::new(
                "self",
                self.href(&format!("/collections/{collection_id}/items/{item_id}")),
                MEDIA_GEOJSON,
            ),
            Link::new("collection", collection_href.clone(), MEDIA_JSON),
            Link::new("parent", collection_href, MEDIA_JSON),
            Link::new("root", self.root(), MEDIA_JSON),
        ]
    }
}

/// Render a collection with its extent and links.
pub fn render_collection(
    collection: &Collection,
    extent: &Extent,
    links: &LinkBuilder,
) -> serde_json::Value {
    json!({
        "type": "Collection",
        "stac_version": collection.stac_version,
        "stac_extensions": collection.stac_extensions,
        "id": collection.id,
        "title": collection.title,
        "description": collection.description,
        "license": collection.license,
        "extent": extent,
        "links": links.collection_links(&collection.id),
    })
}

/// Render an item as a GeoJSON Feature.
pub fn render_item(item: &Item, links: &LinkBuilder) -> serde_json::Value {
    let mut properties = match &item.properties {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    properties.insert(
        "datetime".into(),
        json!(item
            .datetime
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
    );
    if let Some(title) = &item.title {
        properties.entry("title").or_insert_with(|| json!(title));
    }
    if let Some(description) = &item.description {
        properties
            .entry("description")
            .or_insert_with(|| json!(description));
    }

    json!({
        "type": "Feature",
        "stac_version": item.stac_version,
        "stac_extensions": item.stac_extensions,
        "id": item.id,
        "collection": item.collection_id,
        "geometry": item.geometry,
        "bbox": item.bbox,
        "properties": properties,
        "assets": item.assets,
        "links": links.item_links(&item.collection_id, &item.id),
    })
}

/// Render a page of items as a GeoJSON FeatureCollection.
pub fn render_feature_collection(
    items: &[Item],
    self_href: String,
    links: &LinkBuilder,
) -> serde_json::Value {
    json!({
        "type": "FeatureCollection",
        "features": items.iter().map(|i| render_item(i, links)).collect::<Vec<_>>(),
        "numberReturned": items.len(),
        "links": [
            Link::new("self", self_href, MEDIA_GEOJSON),
            Link::new("root", links.root(), MEDIA_JSON),
        ],
    })
}
