use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ensure_key, transport_err, HTTP_TIMEOUT};
use crate::canvas::{CanvasSnapshotter, CanvasSurface};
use crate::error::PipelineError;

/// Generic record store for board documents. Last write wins; no consistency
/// guarantees beyond that.
#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn save(
        &self,
        board_id: &str,
        document: &Value,
        preview: Option<&[u8]>,
    ) -> Result<(), PipelineError>;
}

#[derive(Serialize)]
struct SaveBody<'a> {
    board_id: &'a str,
    document: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    preview: Option<String>,
}

pub struct HttpBoardStore {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpBoardStore {
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
impl BoardStore for HttpBoardStore {
    async fn save(
        &self,
        board_id: &str,
        document: &Value,
        preview: Option<&[u8]>,
    ) -> Result<(), PipelineError> {
        ensure_key(&self.api_key, "board-store")?;
        let body = SaveBody {
            board_id,
            document,
            preview: preview.map(|p| STANDARD.encode(p)),
        };
        let response = self
            .client
            .put(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_err("board-store"))?;
        if !response.status().is_success() {
            return Err(PipelineError::Backend {
                service: "board-store",
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Fire-and-forget persistence. A failed save, including an unserializable
/// document, aborts only the attempt; the interactive session keeps running.
/// Saves are gated on document change, so an idle canvas is uploaded once and
/// then left alone even though the quiet signal keeps firing.
pub struct Autosaver {
    surface: Arc<dyn CanvasSurface>,
    store: Arc<dyn BoardStore>,
    board_id: String,
    snapshotter: CanvasSnapshotter,
    last_saved: Mutex<Option<String>>,
}

impl Autosaver {
    pub fn new(surface: Arc<dyn CanvasSurface>, store: Arc<dyn BoardStore>, board_id: impl Into<String>) -> Self {
        Self {
            surface,
            store,
            board_id: board_id.into(),
            snapshotter: CanvasSnapshotter::new(),
            last_saved: Mutex::new(None),
        }
    }

    pub async fn save_now(&self) {
        let document = match self.surface.document_snapshot() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "document snapshot failed; skipping autosave");
                return;
            }
        };
        let encoded = document.to_string();
        if self.last_saved.lock().unwrap().as_deref() == Some(&encoded) {
            debug!(board = %self.board_id, "document unchanged; skipping autosave");
            return;
        }
        let preview = self
            .snapshotter
            .capture(self.surface.as_ref())
            .ok()
            .flatten()
            .map(|c| c.bytes);
        match self
            .store
            .save(&self.board_id, &document, preview.as_deref())
            .await
        {
            // A failed save leaves the marker alone; the next quiet period
            // retries.
            Ok(()) => {
                *self.last_saved.lock().unwrap() = Some(encoded);
                debug!(board = %self.board_id, "autosaved");
            }
            Err(e) => warn!(error = %e, "autosave failed"),
        }
    }
}
