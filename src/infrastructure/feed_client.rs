// Bounded-time JSON GET shared by the feed adapters
use crate::application::feed_repository::FeedError;
use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Longest error body kept in a [`FeedError::Status`].
const MAX_ERROR_BODY: usize = 2000;

#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, timeout })
    }

    /// GETs `url` and parses the body as JSON. An empty body is `Value::Null`.
    /// The whole exchange, body included, is bounded by the client timeout.
    pub async fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value, FeedError> {
        match tokio::time::timeout(self.timeout, self.fetch(url, token)).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::Timeout(self.timeout)),
        }
    }

    async fn fetch(&self, url: &str, token: Option<&str>) -> Result<Value, FeedError> {
        let mut request = self.http.get(url).header("Accept", "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FeedError::Unauthorized);
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        if !status.is_success() {
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| FeedError::Parse(e.to_string()))
    }

    fn classify(&self, error: reqwest::Error) -> FeedError {
        if error.is_timeout() {
            FeedError::Timeout(self.timeout)
        } else {
            FeedError::Transport(error.to_string())
        }
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    use axum::Router;
    use std::net::SocketAddr;

    /// Serves `router` on an ephemeral local port and returns its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
