use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use listing_captions::ai::CaptionGenerator;
use listing_captions::scraper::Scraper;
use listing_captions::{CaptionVariation, ListingRecord};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

// Where a scrape → caption job stands:
#[derive(Clone, Serialize, Debug)]
pub enum JobStatus {
    Pending,
    Done {
        listing: ListingRecord,
        captions: Vec<CaptionVariation>,
    },
    Failed {
        error: String,
    },
}

#[derive(Clone, Debug)]
pub struct JobRecord {
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

// job_id → JobRecord, plus the shared scraper and (optional) caption generator
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<DashMap<Uuid, JobRecord>>,
    pub scraper: Arc<Scraper>,
    pub generator: Option<CaptionGenerator>,
}

impl AppState {
    pub fn new(scraper: Scraper, generator: Option<CaptionGenerator>) -> Self {
        AppState {
            jobs: Arc::new(DashMap::new()),
            scraper: Arc::new(scraper),
            generator,
        }
    }

    pub fn finish(&self, job_id: Uuid, status: JobStatus) {
        if let Some(mut job) = self.jobs.get_mut(&job_id) {
            job.status = status;
        }
    }

    /// Drops finished jobs created more than `ttl` ago. Pending jobs stay
    /// until their task reports back. Returns how many were removed.
    pub fn evict_finished(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now() - ttl;
        let before = self.jobs.len();
        self.jobs.retain(|_, job| {
            matches!(job.status, JobStatus::Pending) || job.created_at > cutoff
        });
        before.saturating_sub(self.jobs.len())
    }
}
