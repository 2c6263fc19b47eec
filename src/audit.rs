//! Checks that every catalogued video is still reachable and re-renders the
//! ones that are not.

use serde::Serialize;
use tracing::{info, warn};

use crate::generator::Generator;
use crate::models::{GenerateVideoRequest, VideoRecord};
use crate::store::{StoreError, VideoStore};

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub total: usize,
    pub missing: Vec<VideoRecord>,
    pub up_to_date: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FailedRegeneration {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Serialize, Default, PartialEq, Eq)]
pub struct RegenerationReport {
    pub regenerated: Vec<String>,
    pub failed: Vec<FailedRegeneration>,
}

/// Probes every record. A probe that errors counts as missing.
pub async fn audit(store: &dyn VideoStore) -> Result<AuditReport, StoreError> {
    let catalog = store.load().await?;
    let mut missing = Vec::new();
    for record in &catalog.videos {
        match store.has_video(record).await {
            Ok(true) => {}
            Ok(false) => {
                info!(url = %record.video_url, "video missing, regeneration needed");
                missing.push(record.clone());
            }
            Err(e) => {
                warn!(url = %record.video_url, "video inaccessible, regeneration needed: {}", e);
                missing.push(record.clone());
            }
        }
    }
    Ok(AuditReport {
        total: catalog.videos.len(),
        up_to_date: missing.is_empty(),
        missing,
    })
}

/// Re-renders each record in turn; one failure does not stop the rest.
pub async fn regenerate(generator: &Generator, records: &[VideoRecord]) -> RegenerationReport {
    let mut report = RegenerationReport::default();
    for record in records {
        match generator.generate_now(&GenerateVideoRequest::from(record)).await {
            Ok(done) => report.regenerated.push(done.id),
            Err(e) => report.failed.push(FailedRegeneration {
                id: record.id.clone(),
                error: e.to_string(),
            }),
        }
    }
    report
}
