use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use easel::activity::{ActivityDebouncer, SuppressGuard};
use easel::canvas::{memory::InMemoryCanvas, Bounds, CanvasSurface};
use easel::config::Config;
use easel::error::PipelineError;
use easel::pipeline::{
    spawn_supervisor, GenerationOrchestrator, PendingArtifactManager, PipelineBackends,
    PipelineOptions,
};
use easel::services::{GenerateReply, GenerateRequest, ImageFetcher, SolutionGenerator};

/// Scripted generator for the headless harness: always offers an overlay.
struct CannedGenerator;

#[async_trait]
impl SolutionGenerator for CannedGenerator {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<GenerateReply, PipelineError> {
        // Simulate backend latency so cancellation is observable.
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(GenerateReply {
            image_url: Some("canned://overlay".into()),
            text: format!("worked example ({:?} mode)", req.mode),
        })
    }
}

struct CannedFetcher;

#[async_trait]
impl ImageFetcher for CannedFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, PipelineError> {
        let img = image::DynamicImage::new_rgb8(1600, 400);
        let mut bytes = Vec::new();
        img.write_to(&mut bytes, image::ImageOutputFormat::Png)
            .map_err(|e| PipelineError::ImageDecode(e.to_string()))?;
        Ok(bytes)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    tracing::info!("easel harness booting");

    let config = Config::from_env();
    let canvas = Arc::new(InMemoryCanvas::new(Bounds::new(0.0, 0.0, 800.0, 600.0)));
    let surface: Arc<dyn CanvasSurface> = canvas.clone();
    let suppress = Arc::new(SuppressGuard::new());
    let pending = Arc::new(PendingArtifactManager::new(surface.clone(), suppress.clone()));
    let voice_active = Arc::new(AtomicBool::new(false));

    let orchestrator = Arc::new(GenerationOrchestrator::new(
        surface.clone(),
        pending.clone(),
        suppress.clone(),
        PipelineBackends {
            generator: Arc::new(CannedGenerator),
            fetcher: Arc::new(CannedFetcher),
            ocr: None,
            classifier: None,
        },
        PipelineOptions {
            error_display: config.error_display,
            default_mode: config.default_mode,
            ..Default::default()
        },
        voice_active,
    ));

    // Print stage transitions the way a status pill would show them.
    let mut status = orchestrator.status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            tracing::info!(stage = ?*status.borrow_and_update(), "pipeline");
        }
    });

    let quiet = Duration::from_millis(600);
    let (signals_tx, signals_rx) = mpsc::channel(16);
    let debouncer =
        ActivityDebouncer::arm(surface.subscribe(), suppress.clone(), quiet, signals_tx);
    let supervisor = spawn_supervisor(orchestrator.clone(), None, signals_rx);

    // Scripted session: a few strokes, then hands off the keyboard.
    tracing::info!("drawing...");
    for i in 0..4 {
        let offset = i as f64 * 40.0;
        canvas.add_stroke(vec![(20.0 + offset, 30.0), (60.0 + offset, 90.0)]);
        tokio::time::sleep(Duration::from_millis(150)).await;
    }

    // Quiet period elapses; the pipeline runs and parks a ghost overlay.
    tokio::time::sleep(quiet + Duration::from_secs(1)).await;
    if let Some(artifact) = pending.latest() {
        tracing::info!(shape = ?artifact.shape, "accepting ghost overlay");
        pending.accept(artifact.shape)?;
    } else {
        tracing::info!("no overlay was proposed");
    }

    debouncer.disarm();
    supervisor.abort();
    tracing::info!(shapes = canvas.shape_count(), "harness done");
    Ok(())
}
