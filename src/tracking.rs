//! Email open tracking.
//!
//! Outbound emails can embed a pixel URL; the `/track/{pixel_id}` route
//! serves a 1×1 GIF and records an `open` interaction. The pixel registry is
//! an explicit injected store owned by the orchestrator's caller, not a
//! module-level map.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::engagement::{EngagementTracker, InteractionEvent, InteractionKind};

/// 1×1 transparent GIF.
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// What a pixel id points back to.
#[derive(Debug, Clone)]
pub struct PixelMetadata {
    pub lead_id: String,
    pub job_id: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// Registry of issued tracking pixels.
#[derive(Default)]
pub struct TrackingPixels {
    pixels: RwLock<HashMap<String, PixelMetadata>>,
}

impl TrackingPixels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a pixel for a lead (and optionally the job that sent it).
    pub async fn issue(&self, lead_id: &str, job_id: Option<&str>) -> String {
        let pixel_id = Uuid::new_v4().to_string();
        self.pixels.write().await.insert(
            pixel_id.clone(),
            PixelMetadata {
                lead_id: lead_id.to_string(),
                job_id: job_id.map(String::from),
                issued_at: Utc::now(),
            },
        );
        pixel_id
    }

    /// Render the public URL for a pixel.
    pub fn url(&self, base_url: &str, pixel_id: &str) -> String {
        format!("{}/track/{pixel_id}", base_url.trim_end_matches('/'))
    }

    pub async fn lookup(&self, pixel_id: &str) -> Option<PixelMetadata> {
        self.pixels.read().await.get(pixel_id).cloned()
    }
}

/// Shared state for the tracking routes.
#[derive(Clone)]
pub struct TrackingState {
    pub pixels: Arc<TrackingPixels>,
    pub tracker: Arc<EngagementTracker>,
}

/// Build the tracking router.
pub fn tracking_routes(state: TrackingState) -> Router {
    Router::new()
        .route("/track/{pixel_id}", get(serve_pixel))
        .with_state(state)
}

async fn serve_pixel(
    State(state): State<TrackingState>,
    Path(pixel_id): Path<String>,
) -> impl IntoResponse {
    record_open(&state, &pixel_id).await;
    ([(header::CONTENT_TYPE, "image/gif")], PIXEL_GIF)
}

/// Record the open event for a pixel hit. Unknown pixels record nothing —
/// the GIF is served either way.
async fn record_open(state: &TrackingState, pixel_id: &str) {
    let Some(metadata) = state.pixels.lookup(pixel_id).await else {
        tracing::debug!(%pixel_id, "Unknown tracking pixel");
        return;
    };

    tracing::info!(lead = %metadata.lead_id, %pixel_id, "Tracked email open");
    let content = match metadata.job_id {
        Some(ref job_id) => format!("email opened (job {job_id})"),
        None => "email opened".to_string(),
    };
    state
        .tracker
        .record(InteractionEvent::new(
            &metadata.lead_id,
            InteractionKind::Open,
            &content,
        ))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngagementConfig;
    use crate::store::{LeadStore, MemoryLeadStore};

    fn state() -> (TrackingState, Arc<MemoryLeadStore>) {
        let store = Arc::new(MemoryLeadStore::new());
        let tracker = Arc::new(EngagementTracker::new(
            store.clone(),
            EngagementConfig::default(),
        ));
        (
            TrackingState {
                pixels: Arc::new(TrackingPixels::new()),
                tracker,
            },
            store,
        )
    }

    #[tokio::test]
    async fn known_pixel_records_open() {
        let (state, store) = state();
        let pixel_id = state.pixels.issue("lead_42", Some("job_1")).await;

        record_open(&state, &pixel_id).await;

        let opens = store
            .query_events("lead_42", Some(InteractionKind::Open), None)
            .await
            .unwrap();
        assert_eq!(opens.len(), 1);
        assert!(opens[0].content.contains("job_1"));
    }

    #[tokio::test]
    async fn unknown_pixel_records_nothing() {
        let (state, store) = state();
        record_open(&state, "not-a-pixel").await;
        let opens = store
            .query_events("lead_42", Some(InteractionKind::Open), None)
            .await
            .unwrap();
        assert!(opens.is_empty());
    }

    #[test]
    fn url_joins_base_and_id() {
        let pixels = TrackingPixels::new();
        assert_eq!(
            pixels.url("https://track.example.com/", "abc"),
            "https://track.example.com/track/abc"
        );
    }

    #[test]
    fn pixel_gif_is_valid_header() {
        assert_eq!(&PIXEL_GIF[..6], b"GIF89a");
    }
}
