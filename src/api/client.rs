use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::ApiError;
use crate::config::{ApiConfig, CacheConfig, SpmsConfig};
use crate::observability::api_metrics;

/// Rate-limited client for the SPMS REST API with a short-lived GET cache.
///
/// Mutations never touch the cache themselves; callers invalidate the
/// prefixes a mutation affects so the next read refetches.
#[derive(Debug, Clone)]
pub struct SpmsClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    max_wait: Duration,
    cache: Option<Cache<String, serde_json::Value>>,
}

impl SpmsClient {
    pub fn from_config(config: &SpmsConfig) -> Result<Self, ApiError> {
        Self::new(&config.api, &config.cache)
    }

    pub fn new(api: &ApiConfig, cache: &CacheConfig) -> Result<Self, ApiError> {
        let per_second = NonZeroU32::new(api.rate_limit.requests_per_second)
            .ok_or_else(|| ApiError::Config("requests_per_second must be non-zero".into()))?;
        let burst = NonZeroU32::new(api.rate_limit.burst_capacity)
            .ok_or_else(|| ApiError::Config("burst_capacity must be non-zero".into()))?;
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let mut base = api.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| ApiError::Config(format!("invalid base_url {base:?}: {err}")))?;

        let timeout = Duration::from_secs(api.timeout_seconds);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("spms-workflow/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let cache = cache.enabled.then(|| {
            Cache::builder()
                .max_capacity(cache.max_capacity)
                .time_to_live(Duration::from_secs(cache.ttl_seconds))
                .build()
        });

        Ok(Self {
            http,
            base_url,
            token: api.token.clone(),
            rate_limiter,
            max_wait: timeout,
            cache,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::Config(format!("invalid path {path:?}: {err}")))
    }

    async fn wait_for_permit(&self, path: &str) -> Result<(), ApiError> {
        if self.rate_limiter.check().is_ok() {
            return Ok(());
        }
        api_metrics().record_rate_limit_wait();
        tokio::time::timeout(
            self.max_wait,
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100))),
        )
        .await
        .map_err(|_| ApiError::RateLimited {
            path: path.to_string(),
        })
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<serde_json::Value, ApiError> {
        self.wait_for_permit(path).await?;

        let mut request = self.http.request(method.clone(), self.url(path)?);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        api_metrics().record_request();
        debug!(method = %method, path = path, "Sending SPMS API request");

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                api_metrics().record_error();
                warn!(method = %method, path = path, error = %err, "SPMS API request failed");
                return Err(ApiError::Network(err));
            }
        };

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            api_metrics().record_error();
            if status == StatusCode::TOO_MANY_REQUESTS {
                api_metrics().record_rate_limit_wait();
            }
            warn!(method = %method, path = path, status = status.as_u16(), "SPMS API returned an error");
            return Err(ApiError::from_response_body(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// GET `path`, answering from the cache when possible.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(path).await {
                api_metrics().record_cache_hit();
                debug!(path = path, "Cache hit");
                return Ok(serde_json::from_value(cached)?);
            }
            api_metrics().record_cache_miss();
        }

        let value = self.execute::<()>(Method::GET, path, None).await?;
        if let Some(cache) = &self.cache {
            cache.insert(path.to_string(), value.clone()).await;
        }
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        self.mutate(Method::POST, path, body).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.mutate(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.mutate::<(), serde_json::Value>(Method::DELETE, path, None)
            .await
            .map(|_| ())
    }

    async fn mutate<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        api_metrics().record_mutation();
        let value = self.execute(method, path, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Invalidate cached responses whose path starts with `prefix`.
    pub async fn invalidate_prefix(&self, prefix: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        let keys_to_remove: Vec<String> = cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.as_ref().clone())
            .collect();

        for key in &keys_to_remove {
            cache.invalidate(key).await;
        }
        debug!(prefix = prefix, removed = keys_to_remove.len(), "Invalidated cache entries");
    }

    /// Clear cache (useful for testing or after bulk changes)
    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            info!("SPMS client cache cleared");
        }
    }
}
