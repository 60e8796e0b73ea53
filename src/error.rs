use thiserror::Error;

use crate::canvas::ShapeId;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("shape {0:?} not found")]
    ShapeNotFound(ShapeId),
    #[error("shape {0:?} is locked")]
    ShapeLocked(ShapeId),
    #[error("raster export failed: {0}")]
    Export(String),
    #[error("document snapshot failed: {0}")]
    Snapshot(String),
}

/// Failures of the generation pipeline. Cancellation and negative-but-valid
/// outcomes (classifier declined, generator returned no image) are NOT errors;
/// they live in `PipelineOutcome`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Backend credentials absent. Surfaced before any network call.
    #[error("missing credential for {0}")]
    MissingCredential(&'static str),
    #[error("{service} returned HTTP {status}")]
    Backend { service: &'static str, status: u16 },
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed {service} response: {reason}")]
    Malformed { service: &'static str, reason: String },
    #[error("overlay image could not be decoded: {0}")]
    ImageDecode(String),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
}

#[derive(Debug, Error)]
pub enum VoiceError {
    /// User-actionable: cannot be retried without OS-level consent.
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("realtime token mint failed: {0}")]
    Token(String),
    #[error("sdp exchange failed: {0}")]
    Sdp(String),
    #[error("realtime transport failed: {0}")]
    Transport(String),
    #[error("data channel closed")]
    ChannelClosed,
    #[error("malformed realtime event: {0}")]
    Protocol(String),
}
