use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use listing_captions::scraper::validate_url;
use listing_captions::{CaptionVariation, ListingRecord, POST_TYPES};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{AppState, JobRecord, JobStatus};

const DEFAULT_POST_TYPE: &str = "New Listing";
const DEFAULT_VARIATIONS: usize = 3;
const MAX_VARIATIONS: usize = 10;

#[derive(Deserialize)]
pub struct ScrapeListingPayload {
    pub url: String,
    pub post_type: Option<String>,
    pub num_variations: Option<usize>,
}

#[derive(Serialize)]
pub struct JobCreated {
    pub job_id: Uuid,
}

#[derive(Serialize)]
pub struct JobPollResponse {
    pub status: String,
    pub listing: Option<ListingRecord>,
    pub captions: Vec<CaptionVariation>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// POST /api/scrape-listing
pub async fn scrape_listing(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ScrapeListingPayload>,
) -> impl IntoResponse {
    if let Err(e) = validate_url(&payload.url) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })));
    }

    // 1) Register the job as pending
    let job_id = Uuid::new_v4();
    state.jobs.insert(job_id, JobRecord::pending());
    info!(%job_id, url = %payload.url, "job queued");

    // 2) Scrape and caption in the background
    let state_clone = state.clone();
    tokio::spawn(async move {
        let status = run_job(&state_clone, payload).await;
        match &status {
            JobStatus::Failed { error } => warn!(%job_id, error = %error, "job failed"),
            _ => info!(%job_id, "job done"),
        }
        state_clone.finish(job_id, status);
    });

    // 3) Answer 202 with the job id right away
    (StatusCode::ACCEPTED, Json(json!(JobCreated { job_id })))
}

async fn run_job(state: &AppState, payload: ScrapeListingPayload) -> JobStatus {
    let listing = match state.scraper.scrape(&payload.url).await {
        Ok(listing) => listing,
        Err(e) => {
            return JobStatus::Failed {
                error: format!("Scrape error: {}", e),
            }
        }
    };

    let captions = match &state.generator {
        Some(generator) => {
            let post_type = payload.post_type.as_deref().unwrap_or(DEFAULT_POST_TYPE);
            let count = payload
                .num_variations
                .unwrap_or(DEFAULT_VARIATIONS)
                .clamp(1, MAX_VARIATIONS);
            match generator.generate_captions(&listing, post_type, count).await {
                Ok(captions) => captions,
                Err(e) => {
                    return JobStatus::Failed {
                        error: format!("AI error: {}", e),
                    }
                }
            }
        }
        None => Vec::new(),
    };

    JobStatus::Done { listing, captions }
}

/// GET /api/jobs/{id}
pub async fn poll_job(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let Some(job) = state.jobs.get(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "Job not found" })));
    };

    let created_at = job.created_at;
    let resp = match &job.status {
        JobStatus::Pending => JobPollResponse {
            status: "pending".to_string(),
            listing: None,
            captions: Vec::new(),
            error: None,
            created_at,
        },
        JobStatus::Done { listing, captions } => JobPollResponse {
            status: "done".to_string(),
            listing: Some(listing.clone()),
            captions: captions.clone(),
            error: None,
            created_at,
        },
        JobStatus::Failed { error } => JobPollResponse {
            status: "failed".to_string(),
            listing: None,
            captions: Vec::new(),
            error: Some(error.clone()),
            created_at,
        },
    };
    (StatusCode::OK, Json(json!(resp)))
}

/// GET /api/post-types
pub async fn post_types() -> impl IntoResponse {
    Json(json!({ "post_types": POST_TYPES }))
}
