use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_key, transport_err, HelpAssessment, HelpClassifier, HTTP_TIMEOUT};
use crate::error::PipelineError;

#[derive(Serialize)]
struct NeedCheckRequest<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Deserialize)]
struct NeedCheckResponse {
    #[serde(alias = "needsHelp")]
    needs_help: bool,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reason: String,
}

pub struct HttpHelpClassifier {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpHelpClassifier {
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
impl HelpClassifier for HttpHelpClassifier {
    async fn assess(
        &self,
        raster: &[u8],
        text: Option<&str>,
    ) -> Result<HelpAssessment, PipelineError> {
        ensure_key(&self.api_key, "need-check")?;
        let image = STANDARD.encode(raster);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&NeedCheckRequest { image: &image, text })
            .send()
            .await
            .map_err(transport_err("need-check"))?;
        if !response.status().is_success() {
            return Err(PipelineError::Backend {
                service: "need-check",
                status: response.status().as_u16(),
            });
        }
        let parsed: NeedCheckResponse = response.json().await.map_err(|e| {
            PipelineError::Malformed { service: "need-check", reason: e.to_string() }
        })?;
        Ok(HelpAssessment {
            needs_help: parsed.needs_help,
            confidence: parsed.confidence,
            reason: parsed.reason,
        })
    }
}
