use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::{
    ensure_key, transport_err, GenerateReply, GenerateRequest, ImageFetcher, SolutionGenerator,
    HTTP_TIMEOUT,
};
use crate::error::PipelineError;

#[derive(Serialize)]
struct GenerateBody<'a> {
    image: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    prompt: &'static str,
    mode: crate::pipeline::AssistMode,
}

pub struct HttpSolutionGenerator {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpSolutionGenerator {
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
impl SolutionGenerator for HttpSolutionGenerator {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<GenerateReply, PipelineError> {
        ensure_key(&self.api_key, "generate")?;
        let image = STANDARD.encode(req.raster);
        let body = GenerateBody {
            image: &image,
            text: req.extracted_text,
            prompt: req.mode.profile().prompt,
            mode: req.mode,
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_err("generate"))?;
        if !response.status().is_success() {
            return Err(PipelineError::Backend {
                service: "generate",
                status: response.status().as_u16(),
            });
        }
        // A malformed body is treated as "no image", not a failure: the model
        // may answer in prose only.
        let value: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "generate response was not JSON; treating as no-image");
                return Ok(GenerateReply { image_url: None, text: String::new() });
            }
        };
        Ok(GenerateReply {
            image_url: extract_image_url(&value),
            text: extract_text_content(&value).unwrap_or_default(),
        })
    }
}

type Probe = fn(&Value) -> Option<String>;

/// Backends have shipped the overlay image under several response shapes over
/// time. Ordered probes, first hit wins. This reflects real backend
/// inconsistency, not guesswork: every probe below has been observed in the
/// wild.
const IMAGE_PROBES: &[Probe] = &[
    probe_top_level_url,
    probe_data_array_url,
    probe_chat_choice_image,
    probe_output_items,
];

pub fn extract_image_url(value: &Value) -> Option<String> {
    IMAGE_PROBES.iter().find_map(|probe| probe(value))
}

fn probe_top_level_url(value: &Value) -> Option<String> {
    value
        .get("imageUrl")
        .or_else(|| value.get("image_url"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn probe_data_array_url(value: &Value) -> Option<String> {
    value["data"][0]["url"].as_str().map(str::to_owned)
}

fn probe_chat_choice_image(value: &Value) -> Option<String> {
    value["choices"][0]["message"]["images"][0]["image_url"]["url"]
        .as_str()
        .map(str::to_owned)
}

fn probe_output_items(value: &Value) -> Option<String> {
    value["output"].as_array()?.iter().find_map(|item| {
        if item["type"].as_str() == Some("image") {
            item["url"]
                .as_str()
                .or_else(|| item["result"].as_str())
                .map(str::to_owned)
        } else {
            None
        }
    })
}

fn extract_text_content(value: &Value) -> Option<String> {
    value
        .get("textContent")
        .or_else(|| value.get("text"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or_else(|| {
            value["choices"][0]["message"]["content"]
                .as_str()
                .map(str::to_owned)
        })
}

/// Fetches generated image bytes. Some backends return https URLs, others
/// inline `data:` URLs; both resolve here.
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        if let Some(rest) = url.strip_prefix("data:") {
            let payload = rest.split_once(";base64,").map(|(_, p)| p).ok_or_else(|| {
                PipelineError::Malformed {
                    service: "image",
                    reason: "data url without base64 payload".into(),
                }
            })?;
            return STANDARD.decode(payload).map_err(|e| PipelineError::Malformed {
                service: "image",
                reason: e.to_string(),
            });
        }
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_err("image"))?;
        if !response.status().is_success() {
            return Err(PipelineError::Backend {
                service: "image",
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(transport_err("image"))?;
        Ok(bytes.to_vec())
    }
}
