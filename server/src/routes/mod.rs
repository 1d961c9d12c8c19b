pub mod listing;

use axum::{Extension, Router};

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", listing::listing_routes())
        .layer(Extension(state))
}
