use super::{filter_scenario, ScenarioSource};
use crate::detect::{SampleRecord, ScenarioClass};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Strip trailing slashes so joined paths never contain `//`.
pub fn normalize_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Scenario records served by the remote API at `GET {base}/scenarios/{id}`.
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base_url(base_url),
        })
    }

    pub fn scenario_url(&self, scenario: ScenarioClass) -> String {
        format!("{}/scenarios/{}", self.base_url, scenario)
    }
}

#[async_trait::async_trait]
impl ScenarioSource for HttpSource {
    fn name(&self) -> String {
        format!("api:{}", self.base_url)
    }

    async fn fetch(&self, scenario: ScenarioClass) -> Result<Vec<SampleRecord>> {
        let url = self.scenario_url(scenario);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("scenario API rejected {}", url))?;
        let records: Vec<SampleRecord> = response
            .json()
            .await
            .with_context(|| format!("unexpected payload from {}", url))?;
        let records = filter_scenario(records, scenario);
        info!(%url, records = records.len(), "fetched replay");
        Ok(records)
    }
}

/// Outcome of one console check against a running service.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointCheck {
    pub endpoint: String,
    pub status: Option<u16>,
    pub latency_ms: f64,
    pub ok: bool,
    pub body: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Connectivity console for a deployed monitor service.
pub struct ApiConsole {
    client: Client,
    base_url: String,
}

impl ApiConsole {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: normalize_base_url(base_url),
        })
    }

    /// `GET /`: the service answers at all.
    pub async fn ping(&self) -> EndpointCheck {
        self.check("/", |_| true).await
    }

    /// `GET /health`: the service reports `"status": "ok"`.
    pub async fn health(&self) -> EndpointCheck {
        self.check("/health", |body| {
            body.get("status").and_then(|s| s.as_str()) == Some("ok")
        })
        .await
    }

    async fn check(
        &self,
        path: &str,
        accept: impl Fn(&serde_json::Value) -> bool,
    ) -> EndpointCheck {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();
        let result = self.client.get(&url).send().await;
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.json::<serde_json::Value>().await.ok();
                let ok = status.is_success() && body.as_ref().is_some_and(|b| accept(b));
                if !ok {
                    warn!(%url, status = status.as_u16(), "endpoint check failed");
                }
                EndpointCheck {
                    endpoint: path.to_string(),
                    status: Some(status.as_u16()),
                    latency_ms,
                    ok,
                    body,
                    error: None,
                }
            }
            Err(e) => {
                warn!(%url, error = %e, "endpoint unreachable");
                EndpointCheck {
                    endpoint: path.to_string(),
                    status: None,
                    latency_ms,
                    ok: false,
                    body: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://reactor.example.org/"),
            "https://reactor.example.org"
        );
        assert_eq!(normalize_base_url("http://localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn test_scenario_url() {
        let source = HttpSource::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            source.scenario_url(ScenarioClass::new(12).unwrap()),
            "http://localhost:8080/scenarios/12"
        );
        assert_eq!(source.name(), "api:http://localhost:8080");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_error() {
        // Port 9 (discard) is closed on test machines.
        let console = ApiConsole::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let check = console.health().await;
        assert!(!check.ok);
        assert!(check.status.is_none());
        assert!(check.error.is_some());
        assert_eq!(check.endpoint, "/health");
    }
}
