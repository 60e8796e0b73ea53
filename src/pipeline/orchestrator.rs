use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::GenericImageView;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fingerprint::CanvasFingerprint;
use super::layout;
use super::mode::AssistMode;
use super::pending::PendingArtifactManager;
use crate::activity::{SuppressGuard, SUPPRESS_GRACE};
use crate::canvas::{CanvasSnapshotter, CanvasSurface, Shape, ShapeId, ShapeKind};
use crate::error::PipelineError;
use crate::services::{
    GenerateRequest, HelpClassifier, ImageFetcher, SolutionGenerator, TextExtractor,
};

/// Which AI call chain the orchestrator drives. The consolidated single call
/// is canonical; the three-stage OCR/need-check chain is an alternate
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineShape {
    SingleCall,
    ThreeStage,
}

/// Observable stage of the pipeline, fed to the UI status pill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    Capturing,
    Comparing,
    ExtractingText,
    AssessingNeed,
    Generating,
    Materializing,
    Errored(String),
}

/// How one run ended. Negative-but-successful results are first-class here so
/// the UI never flashes an error when the model simply declined, or when the
/// user kept drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// An overlay was materialized. `committed` means it skipped review
    /// (feedback mode).
    Generated { shape: ShapeId, committed: bool },
    /// Classifier said no, or the generator declined with a rationale.
    NoHelpNeeded { reason: String },
    /// Fingerprint matched the stored one; nothing new to look at.
    Unchanged,
    /// No capturable shapes on the canvas.
    EmptyCanvas,
    /// Another request is in flight; this trigger was a no-op.
    Busy,
    /// A live voice session owns the canvas; debounced triggers stand down.
    VoiceActive,
    /// The request was canceled mid-flight. Not an error.
    Canceled,
}

/// The trigger that starts a run.
#[derive(Debug, Clone, Copy)]
pub struct GenerationTrigger {
    pub source: TriggerSource,
    /// Skip the fingerprint short-circuit.
    pub force: bool,
    pub mode: Option<AssistMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Debounce,
    Voice,
}

impl GenerationTrigger {
    pub fn debounced() -> Self {
        Self { source: TriggerSource::Debounce, force: false, mode: None }
    }

    pub fn forced(mode: Option<AssistMode>) -> Self {
        Self { source: TriggerSource::Voice, force: true, mode }
    }
}

/// Injected AI collaborator handles. OCR and the classifier are only consulted
/// in the three-stage shape.
pub struct PipelineBackends {
    pub generator: Arc<dyn SolutionGenerator>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub ocr: Option<Arc<dyn TextExtractor>>,
    pub classifier: Option<Arc<dyn HelpClassifier>>,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub shape: PipelineShape,
    pub default_mode: AssistMode,
    /// How long an error stays on the status pill before resetting to idle.
    pub error_display: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            shape: PipelineShape::SingleCall,
            default_mode: AssistMode::Answer,
            error_display: Duration::from_secs(3),
        }
    }
}

/// The state machine at the center of the crate:
/// Idle -> Capturing -> Comparing -> (Ocr?) -> (NeedCheck?) -> Generating
/// -> Materializing -> Idle, with cancellation reachable from any non-terminal
/// state. Single-flight: the in-flight flag is checked-and-set synchronously
/// before the first suspension point, so at most one request chain is ever
/// active per canvas view.
pub struct GenerationOrchestrator {
    surface: Arc<dyn CanvasSurface>,
    snapshotter: CanvasSnapshotter,
    pending: Arc<PendingArtifactManager>,
    suppress: Arc<SuppressGuard>,
    backends: PipelineBackends,
    opts: PipelineOptions,
    voice_active: Arc<AtomicBool>,
    in_flight: AtomicBool,
    current: Mutex<Option<CancellationToken>>,
    fingerprint: Mutex<Option<CanvasFingerprint>>,
    status: watch::Sender<PipelineStatus>,
}

impl GenerationOrchestrator {
    pub fn new(
        surface: Arc<dyn CanvasSurface>,
        pending: Arc<PendingArtifactManager>,
        suppress: Arc<SuppressGuard>,
        backends: PipelineBackends,
        opts: PipelineOptions,
        voice_active: Arc<AtomicBool>,
    ) -> Self {
        let (status, _) = watch::channel(PipelineStatus::Idle);
        Self {
            surface,
            snapshotter: CanvasSnapshotter::new(),
            pending,
            suppress,
            backends,
            opts,
            voice_active,
            in_flight: AtomicBool::new(false),
            current: Mutex::new(None),
            fingerprint: Mutex::new(None),
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<PipelineStatus> {
        self.status.subscribe()
    }

    pub fn pending(&self) -> &PendingArtifactManager {
        &self.pending
    }

    /// Cooperative cancellation of the in-flight request, if any. Called when
    /// a new qualifying mutation arrives or on teardown.
    pub fn cancel_in_flight(&self) {
        if let Some(token) = self.current.lock().unwrap().as_ref() {
            token.cancel();
        }
    }

    /// Run one generation attempt. Entry guards are evaluated before any
    /// suspension: voice mutual exclusion (debounced triggers only),
    /// single-flight, empty canvas.
    pub async fn run(&self, trigger: GenerationTrigger) -> Result<PipelineOutcome, PipelineError> {
        if trigger.source == TriggerSource::Debounce && self.voice_active.load(Ordering::SeqCst) {
            debug!("voice session live; debounced trigger stands down");
            return Ok(PipelineOutcome::VoiceActive);
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("request already in flight; trigger is a no-op");
            return Ok(PipelineOutcome::Busy);
        }
        if self.surface.shape_ids().is_empty() {
            self.in_flight.store(false, Ordering::SeqCst);
            return Ok(PipelineOutcome::EmptyCanvas);
        }

        let token = CancellationToken::new();
        *self.current.lock().unwrap() = Some(token.clone());

        let result = self.drive(trigger, &token).await;

        *self.current.lock().unwrap() = None;
        self.in_flight.store(false, Ordering::SeqCst);

        match &result {
            Ok(outcome) => {
                self.set_status(PipelineStatus::Idle);
                info!(?outcome, "pipeline finished");
            }
            Err(e) => {
                warn!(error = %e, "pipeline failed");
                self.flash_error(e.to_string());
            }
        }
        result
    }

    async fn drive(
        &self,
        trigger: GenerationTrigger,
        token: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.set_status(PipelineStatus::Capturing);
        let Some(capture) = self.snapshotter.capture(self.surface.as_ref())? else {
            return Ok(PipelineOutcome::EmptyCanvas);
        };

        self.set_status(PipelineStatus::Comparing);
        let fp = CanvasFingerprint::of(&capture.bytes);
        {
            let mut stored = self.fingerprint.lock().unwrap();
            if !trigger.force && stored.as_ref() == Some(&fp) {
                debug!("fingerprint unchanged; short-circuit");
                return Ok(PipelineOutcome::Unchanged);
            }
            *stored = Some(fp);
        }

        let mode = trigger.mode.unwrap_or(self.opts.default_mode);
        let mut extracted: Option<String> = None;

        if self.opts.shape == PipelineShape::ThreeStage {
            if let Some(ocr) = &self.backends.ocr {
                self.set_status(PipelineStatus::ExtractingText);
                let Some(text) = cancelable(token, ocr.extract_text(&capture.bytes)).await else {
                    return Ok(self.canceled());
                };
                extracted = Some(text?);
            }
            if let Some(classifier) = &self.backends.classifier {
                self.set_status(PipelineStatus::AssessingNeed);
                let Some(assessment) =
                    cancelable(token, classifier.assess(&capture.bytes, extracted.as_deref()))
                        .await
                else {
                    return Ok(self.canceled());
                };
                let assessment = assessment?;
                if !assessment.needs_help {
                    // Deliberate negative result, not a failure.
                    info!(
                        confidence = assessment.confidence,
                        reason = %assessment.reason,
                        "classifier: no help needed"
                    );
                    return Ok(PipelineOutcome::NoHelpNeeded { reason: assessment.reason });
                }
            }
        }

        self.set_status(PipelineStatus::Generating);
        let request = GenerateRequest {
            raster: &capture.bytes,
            extracted_text: extracted.as_deref(),
            mode,
        };
        let Some(reply) = cancelable(token, self.backends.generator.generate(&request)).await
        else {
            return Ok(self.canceled());
        };
        let reply = reply?;
        let Some(image_url) = reply.image_url else {
            // The model decided unaided help was unnecessary. Clean idle.
            info!(rationale = %reply.text, "generator declined to draw");
            return Ok(PipelineOutcome::NoHelpNeeded { reason: reply.text });
        };

        self.set_status(PipelineStatus::Materializing);
        let Some(bytes) = cancelable(token, self.backends.fetcher.fetch(&image_url)).await else {
            return Ok(self.canceled());
        };
        let bytes = bytes?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| PipelineError::ImageDecode(e.to_string()))?;
        let (img_w, img_h) = decoded.dimensions();

        // Last cancellation check before touching the canvas: a canceled
        // request must never materialize its result.
        if token.is_cancelled() {
            return Ok(self.canceled());
        }

        let placed = layout::fit_in_viewport(capture.viewport, img_w, img_h);
        let profile = mode.profile();

        // Our own writes follow; hold the guard so the debouncer ignores them.
        self.suppress.hold(SUPPRESS_GRACE);
        let asset = self.surface.create_asset(bytes);
        let shape = Shape {
            id: ShapeId::fresh(),
            kind: ShapeKind::Image { asset },
            bounds: placed,
            opacity: profile.overlay_opacity,
            locked: true,
            provisional: profile.reviewable,
        };
        let shape_id = shape.id;
        self.surface.create_shape(shape);
        if profile.reviewable {
            self.pending.register(shape_id, asset);
        }
        Ok(PipelineOutcome::Generated { shape: shape_id, committed: !profile.reviewable })
    }

    fn canceled(&self) -> PipelineOutcome {
        debug!("request canceled mid-flight; partial results discarded");
        PipelineOutcome::Canceled
    }

    fn set_status(&self, status: PipelineStatus) {
        let _ = self.status.send_replace(status);
    }

    /// Show the error on the status pill for the configured duration, then
    /// fall back to idle unless the status has moved on.
    fn flash_error(&self, message: String) {
        let _ = self.status.send_replace(PipelineStatus::Errored(message.clone()));
        let status = self.status.clone();
        let hold = self.opts.error_display;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            status.send_if_modified(|current| {
                if matches!(current, PipelineStatus::Errored(m) if *m == message) {
                    *current = PipelineStatus::Idle;
                    true
                } else {
                    false
                }
            });
        });
    }
}

/// Race a stage against the request's cancellation signal. `None` means
/// canceled; the underlying future is dropped, which aborts an outstanding
/// HTTP request so server-side work can stop too.
async fn cancelable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}
