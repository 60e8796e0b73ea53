pub mod fingerprint;
pub mod layout;
pub mod mode;
pub mod orchestrator;
pub mod pending;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

pub use fingerprint::CanvasFingerprint;
pub use mode::{AssistMode, ModeProfile};
pub use orchestrator::{
    GenerationOrchestrator, GenerationTrigger, PipelineBackends, PipelineOptions, PipelineOutcome,
    PipelineShape, PipelineStatus, TriggerSource,
};
pub use pending::{PendingArtifact, PendingArtifactManager};

use crate::activity::ActivitySignal;
use crate::services::board::Autosaver;

/// Glue between the debouncer and the orchestrator: user activity cancels the
/// in-flight request, a quiet canvas starts a debounced run (and an autosave,
/// when configured). Errors are already surfaced through the status channel;
/// here they only get a log line.
pub fn spawn_supervisor(
    orchestrator: Arc<GenerationOrchestrator>,
    autosaver: Option<Arc<Autosaver>>,
    mut signals: mpsc::Receiver<ActivitySignal>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(signal) = signals.recv().await {
            match signal {
                ActivitySignal::Activity => orchestrator.cancel_in_flight(),
                ActivitySignal::Quiet => {
                    if let Some(saver) = &autosaver {
                        saver.save_now().await;
                    }
                    if let Err(e) = orchestrator.run(GenerationTrigger::debounced()).await {
                        warn!(error = %e, "debounced generation failed");
                    }
                }
            }
        }
    })
}
