use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ensure_key, transport_err, TextExtractor, HTTP_TIMEOUT};
use crate::error::PipelineError;

#[derive(Serialize)]
struct OcrRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct OcrResponse {
    text: String,
}

pub struct HttpTextExtractor {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpTextExtractor {
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
impl TextExtractor for HttpTextExtractor {
    async fn extract_text(&self, raster: &[u8]) -> Result<String, PipelineError> {
        ensure_key(&self.api_key, "ocr")?;
        let image = STANDARD.encode(raster);
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&OcrRequest { image: &image })
            .send()
            .await
            .map_err(transport_err("ocr"))?;
        if !response.status().is_success() {
            return Err(PipelineError::Backend {
                service: "ocr",
                status: response.status().as_u16(),
            });
        }
        let parsed: OcrResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Malformed { service: "ocr", reason: e.to_string() })?;
        Ok(parsed.text)
    }
}
