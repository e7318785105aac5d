// Structured output helpers

use crate::types::{AppError, AppResult};
use serde::de::DeserializeOwned;

/// Pull the JSON payload out of a model response that may wrap it in a code
/// fence or surround it with prose.
pub fn extract_json(response: &str) -> &str {
    let fenced = if response.contains("```json") {
        response
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
    } else if response.contains("```") {
        response.split("```").nth(1)
    } else {
        None
    };
    if let Some(inner) = fenced {
        return inner.trim();
    }

    let trimmed = response.trim();
    match (trimmed.find(['{', '[']), trimmed.rfind(['}', ']'])) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

pub fn parse_json<T: DeserializeOwned>(response: &str) -> AppResult<T> {
    serde_json::from_str(extract_json(response))
        .map_err(|e| AppError::Parse(format!("Failed to parse model JSON: {}", e)))
}
