//! HTTP summary service client

use super::http_retry::send_with_retry;
use super::ClipEnricher;
use crate::app::config::EnrichmentConfig;
use crate::capture::ClipMetadata;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Request body sent to the summary endpoint
#[derive(Debug, Serialize)]
struct SummaryRequest<'a> {
    video: &'a str,
    metadata: &'a ClipMetadata,
}

/// Expected response body
#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: Option<String>,
}

/// Posts clip metadata to an HTTP endpoint and reads back `{"summary": ...}`
pub struct HttpEnricher {
    endpoint: String,
    token: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

impl HttpEnricher {
    /// Build from config. The bearer token is read from `token_env` once.
    pub fn new(endpoint: impl Into<String>, config: &EnrichmentConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| crate::Error::Enrichment(format!("failed to build HTTP client: {}", e)))?;

        let token = std::env::var(&config.token_env).ok().filter(|t| !t.is_empty());
        Ok(Self {
            endpoint: endpoint.into(),
            token,
            max_retries: config.max_retries.max(1),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request_summary(&self, video: &str, metadata: &ClipMetadata) -> crate::Result<Option<String>> {
        let body = SummaryRequest { video, metadata };
        let context = format!("enrich {}", metadata.clip_id);

        let response = send_with_retry(
            &self.client,
            |c| {
                let req = c.post(&self.endpoint).json(&body);
                match &self.token {
                    Some(token) => req.bearer_auth(token),
                    None => req,
                }
            },
            self.max_retries,
            &context,
        )
        .await
        .ok_or_else(|| crate::Error::Enrichment(format!("no response from {}", self.endpoint)))?;

        let parsed: SummaryResponse = response
            .json()
            .await
            .map_err(|e| crate::Error::Enrichment(format!("invalid summary response: {}", e)))?;

        Ok(parsed.summary.filter(|s| !s.trim().is_empty()))
    }
}

impl ClipEnricher for HttpEnricher {
    fn summarize(&self, video_path: &Path, metadata: &ClipMetadata) -> crate::Result<Option<String>> {
        let video = video_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        // Persistence runs on a plain thread, so each call gets its own runtime
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| crate::Error::Enrichment(format!("failed to create runtime: {}", e)))?;

        debug!(endpoint = %self.endpoint, video, "Requesting clip summary");
        let summary = rt.block_on(self.request_summary(video, metadata))?;
        if summary.is_some() {
            info!(clip_id = %metadata.clip_id, "Summary received");
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::metadata::utc_from_epoch;
    use crate::fusion::ThreatLevel;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn metadata() -> ClipMetadata {
        ClipMetadata {
            clip_id: Uuid::new_v4(),
            timestamp: 10.0,
            started_at: utc_from_epoch(10.0),
            duration: 60.0,
            trigger_level: ThreatLevel::Threat,
            final_level: ThreatLevel::Threat,
            max_intent: 0.9,
            mean_intent: 0.8,
            weapon_detected: true,
            transitions: Vec::new(),
            signals_stats: BTreeMap::new(),
            frame_count: 3,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let meta = metadata();
        let body = SummaryRequest { video: "clip.webm", metadata: &meta };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["video"], "clip.webm");
        assert_eq!(json["metadata"]["final_level"], "THREAT");
    }

    #[test]
    fn test_response_parsing() {
        let r: SummaryResponse = serde_json::from_str(r#"{"summary": "A person waits"}"#).unwrap();
        assert_eq!(r.summary.as_deref(), Some("A person waits"));
        let r: SummaryResponse = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert!(r.summary.is_none());
    }

    #[test]
    fn test_unreachable_endpoint_is_error() {
        let config = EnrichmentConfig {
            timeout_s: 1,
            max_retries: 1,
            ..Default::default()
        };
        let enricher = HttpEnricher::new("http://127.0.0.1:1/summarize", &config).unwrap();
        let result = enricher.summarize(Path::new("/tmp/clip.webm"), &metadata());
        assert!(matches!(result, Err(crate::Error::Enrichment(_))));
    }
}
