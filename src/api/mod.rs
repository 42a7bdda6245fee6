//! HTTP surface
//!
//! Routes the upload, list, read, replace and delete endpoints of both
//! categories onto the gatekeeper.

pub mod handlers;
pub mod responses;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use std::sync::Arc;

use crate::storage::{Category, CategoryPolicy, Gatekeeper};

/// Slack on top of the file ceiling for multipart boundaries and part headers
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub public_base_url: String,
}

impl AppState {
    pub fn new(gatekeeper: Gatekeeper, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            gatekeeper: Arc::new(gatekeeper),
            public_base_url,
        }
    }

    /// Retrieval URL for a stored asset, e.g. `http://localhost:3000/imagen/imagen-1.png`
    pub fn asset_url(&self, category: Category, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_base_url,
            category.route_segment(),
            name
        )
    }
}

/// Transport body limit for uploads into a category
fn body_limit(policy: &CategoryPolicy) -> usize {
    usize::try_from(policy.max_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD)
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    let image_limit = DefaultBodyLimit::max(body_limit(state.gatekeeper.policy(Category::Image)));
    let tabular_limit =
        DefaultBodyLimit::max(body_limit(state.gatekeeper.policy(Category::TabularData)));

    Router::new()
        .route(
            "/imagen",
            post(handlers::upload_image)
                .get(handlers::list_images)
                .layer(image_limit),
        )
        .route(
            "/imagen/{filename}",
            get(handlers::get_image)
                .put(handlers::replace_image)
                .delete(handlers::delete_image)
                .layer(image_limit),
        )
        .route(
            "/excel",
            post(handlers::upload_tabular)
                .get(handlers::list_tabular)
                .layer(tabular_limit),
        )
        .route("/excel/{filename}", get(handlers::get_tabular))
        .with_state(state)
}
