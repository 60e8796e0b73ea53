use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::events::{ClientEvent, ServerEvent};
use crate::error::VoiceError;
use crate::services::realtime::RealtimeCredential;

/// Both ends of an open data channel, as seen by the bridge.
pub struct DataChannel {
    pub outgoing: mpsc::Sender<ClientEvent>,
    pub incoming: mpsc::Receiver<ServerEvent>,
}

/// The WebRTC stack sits behind this seam. A real implementation creates the
/// peer connection, attaches the microphone track and remote audio playback,
/// gathers ICE to completion, runs the SDP exchange with the minted
/// credential, and opens the event data channel. Tests script it.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn connect(&self, credential: &RealtimeCredential) -> Result<DataChannel, VoiceError>;

    /// Close the peer connection and data channel. Must be safe to call when
    /// not connected.
    async fn close(&self);
}

/// Local media control. Mute disables the outgoing track without tearing the
/// session down; the tool-call capability stays live while muted.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Fatal if the OS denies access; surfaced as `PermissionDenied`.
    async fn acquire_microphone(&self) -> Result<(), VoiceError>;

    fn set_muted(&self, muted: bool);

    fn muted(&self) -> bool;

    /// Stop local tracks and detach remote audio. Idempotent.
    async fn shutdown(&self);
}

/// The HTTP half of the signaling dance: posts a complete (ICE-gathered)
/// local offer to the realtime backend and returns the remote answer.
/// Incomplete offers must never be sent; gathering completion is the
/// transport implementation's responsibility before calling this.
pub struct HttpSdpExchange {
    client: Client,
    url: String,
}

impl HttpSdpExchange {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            url: url.into(),
        }
    }

    pub async fn exchange(
        &self,
        offer_sdp: &str,
        credential: &RealtimeCredential,
    ) -> Result<String, VoiceError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&credential.client_secret)
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_owned())
            .send()
            .await
            .map_err(|e| VoiceError::Sdp(e.to_string()))?;
        if !response.status().is_success() {
            return Err(VoiceError::Sdp(format!("HTTP {}", response.status().as_u16())));
        }
        response
            .text()
            .await
            .map_err(|e| VoiceError::Sdp(e.to_string()))
    }
}
