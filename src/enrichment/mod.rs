//! Clip Enrichment
//!
//! Optional post-persistence step that asks an external service for a short
//! text summary of a clip. Enrichment never affects scoring or capture: a
//! failure only means the record has no summary.

pub mod http;
pub mod http_retry;

pub use http::HttpEnricher;

use crate::app::config::EnrichmentConfig;
use crate::capture::ClipMetadata;
use std::path::Path;
use tracing::{info, warn};

/// Produces a free-text summary for a persisted clip
pub trait ClipEnricher: Send + Sync {
    /// `Ok(None)` means the service had nothing to say
    fn summarize(&self, video_path: &Path, metadata: &ClipMetadata) -> crate::Result<Option<String>>;
}

/// Enricher for the configured endpoint, if any
pub fn from_config(config: &EnrichmentConfig) -> Option<Box<dyn ClipEnricher>> {
    let endpoint = config.endpoint.as_deref()?.trim();
    if endpoint.is_empty() {
        return None;
    }
    match HttpEnricher::new(endpoint, config) {
        Ok(enricher) => {
            info!(endpoint, "Clip enrichment enabled");
            Some(Box::new(enricher))
        }
        Err(e) => {
            warn!(error = %e, "Clip enrichment disabled");
            None
        }
    }
}
