#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use easel::activity::SuppressGuard;
use easel::canvas::{memory::InMemoryCanvas, Bounds, CanvasSurface};
use easel::error::PipelineError;
use easel::pipeline::{
    GenerationOrchestrator, PendingArtifactManager, PipelineBackends, PipelineOptions,
};
use easel::services::{
    GenerateReply, GenerateRequest, HelpAssessment, HelpClassifier, ImageFetcher,
    SolutionGenerator, TextExtractor,
};

/// Encode a blank PNG of the given pixel dimensions.
pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(w, h);
    let mut bytes = Vec::new();
    img.write_to(&mut bytes, image::ImageOutputFormat::Png)
        .expect("png encode");
    bytes
}

/// Generator double: counts calls, optionally sleeps to keep a request in
/// flight, pops scripted replies and falls back to an image reply.
pub struct ScriptedGenerator {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub replies: Mutex<VecDeque<Result<GenerateReply, PipelineError>>>,
    pub last_extracted: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    pub fn instant() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            replies: Mutex::new(VecDeque::new()),
            last_extracted: Mutex::new(None),
        }
    }

    pub fn script(self, reply: Result<GenerateReply, PipelineError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SolutionGenerator for ScriptedGenerator {
    async fn generate(&self, req: &GenerateRequest<'_>) -> Result<GenerateReply, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_extracted.lock().unwrap() = req.extracted_text.map(str::to_owned);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => Ok(GenerateReply {
                image_url: Some("scripted://overlay".into()),
                text: "worked example".into(),
            }),
        }
    }
}

/// Fetcher double returning a PNG of fixed dimensions regardless of URL.
pub struct FixedImageFetcher {
    pub w: u32,
    pub h: u32,
}

#[async_trait]
impl ImageFetcher for FixedImageFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, PipelineError> {
        Ok(png_bytes(self.w, self.h))
    }
}

pub struct ScriptedExtractor {
    pub text: String,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TextExtractor for ScriptedExtractor {
    async fn extract_text(&self, _raster: &[u8]) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

pub struct ScriptedClassifier {
    pub needs_help: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl HelpClassifier for ScriptedClassifier {
    async fn assess(
        &self,
        _raster: &[u8],
        _text: Option<&str>,
    ) -> Result<HelpAssessment, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HelpAssessment {
            needs_help: self.needs_help,
            confidence: 0.9,
            reason: if self.needs_help { "stalled mid-step" } else { "making steady progress" }
                .into(),
        })
    }
}

/// Everything a pipeline test needs, wired the way the harness wires it.
pub struct TestRig {
    pub canvas: Arc<InMemoryCanvas>,
    pub surface: Arc<dyn CanvasSurface>,
    pub suppress: Arc<SuppressGuard>,
    pub pending: Arc<PendingArtifactManager>,
    pub voice_active: Arc<AtomicBool>,
    pub generator: Arc<ScriptedGenerator>,
    pub orchestrator: Arc<GenerationOrchestrator>,
}

pub fn rig() -> TestRig {
    rig_with(ScriptedGenerator::instant(), PipelineOptions::default())
}

pub fn rig_with(generator: ScriptedGenerator, opts: PipelineOptions) -> TestRig {
    let backends = |generator: Arc<ScriptedGenerator>| PipelineBackends {
        generator,
        fetcher: Arc::new(FixedImageFetcher { w: 1600, h: 400 }),
        ocr: None,
        classifier: None,
    };
    rig_full(generator, opts, backends)
}

pub fn rig_full(
    generator: ScriptedGenerator,
    opts: PipelineOptions,
    backends: impl FnOnce(Arc<ScriptedGenerator>) -> PipelineBackends,
) -> TestRig {
    let canvas = Arc::new(InMemoryCanvas::new(Bounds::new(0.0, 0.0, 800.0, 600.0)));
    let surface: Arc<dyn CanvasSurface> = canvas.clone();
    let suppress = Arc::new(SuppressGuard::new());
    let pending = Arc::new(PendingArtifactManager::new(surface.clone(), suppress.clone()));
    let voice_active = Arc::new(AtomicBool::new(false));
    let generator = Arc::new(generator);
    let orchestrator = Arc::new(GenerationOrchestrator::new(
        surface.clone(),
        pending.clone(),
        suppress.clone(),
        backends(generator.clone()),
        opts,
        voice_active.clone(),
    ));
    TestRig {
        canvas,
        surface,
        suppress,
        pending,
        voice_active,
        generator,
        orchestrator,
    }
}
