//! Maps a non-2xx upstream response into a [`ProviderError`], pulling a
//! message out of the common `{"error":{"message":...}}` shape when present
//! and falling back to the raw body otherwise.

use crate::error::ProviderError;
use reqwest::Response;

pub async fn map_error_response(resp: Response) -> ProviderError {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").cloned())
                .and_then(|e| e.get("message").cloned())
                .and_then(|m| m.as_str().map(|s| s.to_string()))
                .unwrap_or(body);

            ProviderError::Upstream {
                status: status.as_u16(),
                message,
            }
        }
        Err(_) => ProviderError::Upstream {
            status: status.as_u16(),
            message: "failed to read upstream error response".to_string(),
        },
    }
}
