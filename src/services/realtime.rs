use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::HTTP_TIMEOUT;
use crate::error::VoiceError;

/// Short-lived credential for the realtime transport.
#[derive(Debug, Clone)]
pub struct RealtimeCredential {
    pub client_secret: String,
}

#[async_trait]
pub trait TokenMinter: Send + Sync {
    async fn mint(&self) -> Result<RealtimeCredential, VoiceError>;
}

pub struct HttpTokenMinter {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpTokenMinter {
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
impl TokenMinter for HttpTokenMinter {
    async fn mint(&self) -> Result<RealtimeCredential, VoiceError> {
        if self.api_key.trim().is_empty() {
            return Err(VoiceError::Token("realtime credential not configured".into()));
        }
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| VoiceError::Token(e.to_string()))?;
        if !response.status().is_success() {
            return Err(VoiceError::Token(format!("HTTP {}", response.status().as_u16())));
        }
        let value: Value = response
            .json()
            .await
            .map_err(|e| VoiceError::Token(e.to_string()))?;
        // Token endpoint shapes vary: nested client_secret object or a bare
        // string field.
        let secret = value["client_secret"]["value"]
            .as_str()
            .or_else(|| value["client_secret"].as_str())
            .or_else(|| value["value"].as_str())
            .ok_or_else(|| VoiceError::Token("response carried no client secret".into()))?;
        Ok(RealtimeCredential { client_secret: secret.to_owned() })
    }
}
