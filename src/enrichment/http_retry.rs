//! HTTP retry with exponential backoff for enrichment calls.
//!
//! 429 and 5xx responses, timeouts and connection failures are retried;
//! any other status ends the attempt sequence immediately.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Delay before the next attempt, or `None` when the status is final
fn backoff_for_status(status: StatusCode, attempt: u32) -> Option<Duration> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(Duration::from_secs(2u64.pow(attempt + 1)))
    } else if status.is_server_error() {
        Some(Duration::from_secs(2u64.pow(attempt)))
    } else {
        None
    }
}

/// Send a request built by `build_request`, retrying up to `max_retries`
/// attempts in total.
///
/// Backoff:
/// - 429: 2s, 4s, 8s
/// - 5xx, timeout, connect error: 1s, 2s, 4s
///
/// Returns `None` once attempts are exhausted or a non-retriable error occurs.
pub async fn send_with_retry<F>(
    client: &Client,
    build_request: F,
    max_retries: u32,
    context: &str,
) -> Option<Response>
where
    F: Fn(&Client) -> RequestBuilder,
{
    for attempt in 0..max_retries {
        let last = attempt + 1 == max_retries;
        match build_request(client).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Some(resp);
                }
                match backoff_for_status(status, attempt) {
                    Some(delay) if !last => {
                        warn!(context, %status, ?delay, "Retriable response, backing off");
                        tokio::time::sleep(delay).await;
                    }
                    Some(_) => warn!(context, %status, "Retriable response on final attempt"),
                    None => {
                        warn!(context, %status, "Non-retriable response");
                        return None;
                    }
                }
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                if last {
                    warn!(context, error = %e, "Network error on final attempt");
                } else {
                    let delay = Duration::from_secs(2u64.pow(attempt));
                    warn!(context, error = %e, ?delay, "Network error, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                warn!(context, error = %e, "Request failed");
                return None;
            }
        }
    }

    warn!(context, attempts = max_retries, "Giving up");
    None
}
