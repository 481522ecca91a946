use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("client configuration error: {0}")]
    Config(String),
    /// The client-side limiter refused to wait any longer.
    #[error("request to {path} was rate limited")]
    RateLimited { path: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Network(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Build an error from a failed response body.
    ///
    /// The backend reports problems either as `{"detail": ..}`, as
    /// `{"error": ..}` or as a per-field error map; the raw text is used
    /// when none of those apply.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| extract_message(&value))
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("request failed with status {status}")
                } else {
                    trimmed.to_string()
                }
            });
        ApiError::Http { status, message }
    }
}

fn extract_message(value: &serde_json::Value) -> Option<String> {
    let object = value.as_object()?;
    for key in ["detail", "error", "message"] {
        if let Some(message) = object.get(key).and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
    }

    let fields: Vec<String> = object
        .iter()
        .filter_map(|(field, errors)| {
            let first = match errors {
                serde_json::Value::Array(items) => items.first()?.as_str()?.to_string(),
                serde_json::Value::String(text) => text.clone(),
                _ => return None,
            };
            Some(format!("{field}: {first}"))
        })
        .collect();
    (!fields.is_empty()).then(|| fields.join("; "))
}
