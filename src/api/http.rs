use std::time::Duration;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use crate::errors::ImpactError;

pub(crate) fn build_client(connect_timeout: Duration) -> Result<Client, ImpactError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| ImpactError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-2xx response into an `Api` error, preferring the backend's
/// `detail` text over a generic status message.
pub(crate) async fn error_from_response(resp: Response) -> ImpactError {
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    ImpactError::Api {
        status,
        message: extract_detail(&body).unwrap_or_else(|| format!("API error: {}", status)),
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ImpactError> {
    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }
    resp.json::<T>()
        .await
        .map_err(|e| ImpactError::Decode(format!("Invalid response body: {}", e)))
}

pub(crate) async fn read_bytes(resp: Response) -> Result<bytes::Bytes, ImpactError> {
    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }
    Ok(resp.bytes().await?)
}

fn extract_detail(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}
