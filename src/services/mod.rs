pub mod analysis;
pub mod board;
pub mod generate;
pub mod needcheck;
pub mod ocr;
pub mod realtime;

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::pipeline::mode::AssistMode;

pub use analysis::HttpWorkspaceAnalyst;
pub use board::{Autosaver, BoardStore, HttpBoardStore};
pub use generate::{HttpImageFetcher, HttpSolutionGenerator};
pub use needcheck::HttpHelpClassifier;
pub use ocr::HttpTextExtractor;
pub use realtime::{HttpTokenMinter, RealtimeCredential, TokenMinter};

/// Default network timeout for the AI backends.
pub(crate) const HTTP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Text extraction (OCR) over a raster capture.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, raster: &[u8]) -> Result<String, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct HelpAssessment {
    pub needs_help: bool,
    pub confidence: f32,
    pub reason: String,
}

/// Classifier deciding whether the user appears stuck.
#[async_trait]
pub trait HelpClassifier: Send + Sync {
    async fn assess(
        &self,
        raster: &[u8],
        text: Option<&str>,
    ) -> Result<HelpAssessment, PipelineError>;
}

pub struct GenerateRequest<'a> {
    pub raster: &'a [u8],
    pub extracted_text: Option<&'a str>,
    pub mode: AssistMode,
}

/// Reply from the image-generation backend. A `None` image with rationale
/// text is a valid "no help needed" outcome, not a failure.
#[derive(Debug, Clone)]
pub struct GenerateReply {
    pub image_url: Option<String>,
    pub text: String,
}

#[async_trait]
pub trait SolutionGenerator: Send + Sync {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<GenerateReply, PipelineError>;
}

/// Natural-language canvas summary for the voice agent.
#[async_trait]
pub trait WorkspaceAnalyst: Send + Sync {
    async fn analyze(&self, raster: &[u8], focus: Option<&str>) -> Result<String, PipelineError>;
}

/// Resolves a generated image reference (https or data: URL) to raw bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

pub(crate) fn transport_err(
    service: &'static str,
) -> impl FnOnce(reqwest::Error) -> PipelineError {
    move |source| PipelineError::Transport { service, source }
}

pub(crate) fn ensure_key(api_key: &str, service: &'static str) -> Result<(), PipelineError> {
    if api_key.trim().is_empty() {
        return Err(PipelineError::MissingCredential(service));
    }
    Ok(())
}
