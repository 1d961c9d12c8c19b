use axum::routing::{get, post};
use axum::Router;

use crate::handlers::listing_handlers::{poll_job, post_types, scrape_listing};

pub fn listing_routes() -> Router {
    Router::new()
        .route("/scrape-listing", post(scrape_listing))
        .route("/jobs/{id}", get(poll_job))
        .route("/post-types", get(post_types))
}
