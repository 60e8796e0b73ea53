use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_key, transport_err, WorkspaceAnalyst, HTTP_TIMEOUT};
use crate::error::PipelineError;

#[derive(Serialize)]
struct AnalysisRequest<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    focus: Option<&'a str>,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    analysis: String,
}

pub struct HttpWorkspaceAnalyst {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpWorkspaceAnalyst {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl WorkspaceAnalyst for HttpWorkspaceAnalyst {
    async fn analyze(&self, raster: &[u8], focus: Option<&str>) -> Result<String, PipelineError> {
        ensure_key(&self.api_key, "analysis")?;
        let image = STANDARD.encode(raster);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&AnalysisRequest { image: &image, focus })
            .send()
            .await
            .map_err(transport_err("analysis"))?;
        if !response.status().is_success() {
            return Err(PipelineError::Backend {
                service: "analysis",
                status: response.status().as_u16(),
            });
        }
        let parsed: AnalysisResponse = response.json().await.map_err(|e| {
            PipelineError::Malformed { service: "analysis", reason: e.to_string() }
        })?;
        Ok(parsed.analysis)
    }
}
