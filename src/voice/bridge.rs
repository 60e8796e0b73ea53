use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::accumulator::ToolCallAccumulator;
use super::events::{ClientEvent, ConversationItem, ServerEvent, SessionConfig, ToolSpec};
use super::transport::{MediaSession, RealtimeTransport};
use crate::canvas::{CanvasSnapshotter, CanvasSurface};
use crate::error::VoiceError;
use crate::pipeline::{GenerationOrchestrator, GenerationTrigger, PipelineOutcome};
use crate::pipeline::mode::AssistMode;
use crate::services::realtime::TokenMinter;
use crate::services::WorkspaceAnalyst;

/// Displayed status of the voice session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceStatus {
    Idle,
    Connecting,
    Listening,
    Thinking,
    CallingTool,
    /// Distinct, user-actionable: needs OS-level consent, not a retry.
    PermissionDenied,
    Error(String),
    Closed,
}

struct SessionHandles {
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

/// Protocol bridge between the realtime voice backend and the canvas:
/// connects the transport, announces the closed tool set, reassembles
/// streamed tool-call arguments, dispatches tools, and funnels results back.
/// While a session is live the debounced generation path is suppressed; voice
/// and auto-generation are mutually exclusive control sources.
pub struct VoiceToolBridge {
    minter: Arc<dyn TokenMinter>,
    transport: Arc<dyn RealtimeTransport>,
    media: Arc<dyn MediaSession>,
    analyst: Arc<dyn WorkspaceAnalyst>,
    orchestrator: Arc<GenerationOrchestrator>,
    surface: Arc<dyn CanvasSurface>,
    snapshotter: CanvasSnapshotter,
    voice_active: Arc<AtomicBool>,
    running: AtomicBool,
    session: Mutex<Option<SessionHandles>>,
    status: watch::Sender<VoiceStatus>,
}

impl VoiceToolBridge {
    pub fn new(
        minter: Arc<dyn TokenMinter>,
        transport: Arc<dyn RealtimeTransport>,
        media: Arc<dyn MediaSession>,
        analyst: Arc<dyn WorkspaceAnalyst>,
        orchestrator: Arc<GenerationOrchestrator>,
        surface: Arc<dyn CanvasSurface>,
        voice_active: Arc<AtomicBool>,
    ) -> Self {
        let (status, _) = watch::channel(VoiceStatus::Idle);
        Self {
            minter,
            transport,
            media,
            analyst,
            orchestrator,
            surface,
            snapshotter: CanvasSnapshotter::new(),
            voice_active,
            running: AtomicBool::new(false),
            session: Mutex::new(None),
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<VoiceStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connect dance: microphone, token mint, transport (ICE-complete SDP
    /// exchange inside), tool announcement. A second start while live is a
    /// no-op.
    pub async fn start(self: &Arc<Self>) -> Result<(), VoiceError> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("voice session already live");
            return Ok(());
        }
        self.set_status(VoiceStatus::Connecting);

        if let Err(e) = self.media.acquire_microphone().await {
            self.running.store(false, Ordering::SeqCst);
            self.set_status(match &e {
                VoiceError::PermissionDenied => VoiceStatus::PermissionDenied,
                other => VoiceStatus::Error(other.to_string()),
            });
            return Err(e);
        }

        let connected = async {
            let credential = self.minter.mint().await?;
            self.transport.connect(&credential).await
        }
        .await;

        let channel = match connected {
            Ok(channel) => channel,
            Err(e) => {
                self.media.shutdown().await;
                self.running.store(false, Ordering::SeqCst);
                self.set_status(VoiceStatus::Error(e.to_string()));
                return Err(e);
            }
        };

        // Data channel open: declare the tool set before anything else.
        if channel
            .outgoing
            .send(ClientEvent::SessionUpdate { session: Self::session_config() })
            .await
            .is_err()
        {
            self.media.shutdown().await;
            self.running.store(false, Ordering::SeqCst);
            self.set_status(VoiceStatus::Error("data channel closed".into()));
            return Err(VoiceError::ChannelClosed);
        }

        self.voice_active.store(true, Ordering::SeqCst);
        self.set_status(VoiceStatus::Listening);
        info!("voice session live");

        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(Self::event_loop(
            Arc::clone(self),
            channel.incoming,
            channel.outgoing,
            shutdown.clone(),
        ));
        *self.session.lock().await = Some(SessionHandles { shutdown, worker });

        // The worker tears the session down on its own if the channel dies
        // before the handles land above; in that case its teardown found an
        // empty slot, so the stale handles are ours to reap.
        if !self.running.load(Ordering::SeqCst) {
            if let Some(handles) = self.session.lock().await.take() {
                handles.shutdown.cancel();
                let _ = handles.worker.await;
            }
            return Err(VoiceError::ChannelClosed);
        }
        Ok(())
    }

    /// Explicit stop. Safe to call when already stopped.
    pub async fn stop(&self) {
        self.teardown(true).await;
    }

    /// Mute disables the outgoing audio track only; the session and its
    /// tool-call capability remain live.
    pub fn set_muted(&self, muted: bool) {
        self.media.set_muted(muted);
    }

    pub fn muted(&self) -> bool {
        self.media.muted()
    }

    async fn teardown(&self, join_worker: bool) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let handles = self.session.lock().await.take();
        if let Some(handles) = handles {
            handles.shutdown.cancel();
            if join_worker {
                let _ = handles.worker.await;
            }
        }
        self.transport.close().await;
        self.media.shutdown().await;
        self.media.set_muted(false);
        self.voice_active.store(false, Ordering::SeqCst);
        self.set_status(VoiceStatus::Closed);
        info!("voice session closed");
    }

    async fn event_loop(
        bridge: Arc<Self>,
        mut incoming: mpsc::Receiver<ServerEvent>,
        outgoing: mpsc::Sender<ClientEvent>,
        shutdown: CancellationToken,
    ) {
        let mut accumulator = ToolCallAccumulator::new();
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = incoming.recv() => match event {
                    Some(event) => event,
                    None => {
                        // Connection failure counts as teardown too.
                        debug!("data channel closed by transport");
                        bridge.teardown(false).await;
                        break;
                    }
                },
            };
            match event {
                ServerEvent::FunctionCallArgumentsDelta { call_id, delta } => {
                    accumulator.push(&call_id, &delta);
                }
                ServerEvent::FunctionCallArgumentsDone { call_id, name } => {
                    let raw_args = accumulator.finish(&call_id).unwrap_or_default();
                    bridge.set_status(VoiceStatus::CallingTool);
                    let output = match bridge.dispatch_tool(&name, &raw_args).await {
                        Ok(output) => output,
                        Err(e) => {
                            warn!(tool = %name, error = %e, "tool call failed");
                            json!({"ok": false, "error": e.to_string()}).to_string()
                        }
                    };
                    // Even a failed tool must answer; silence after a tool
                    // call stalls the remote conversation.
                    let sent = outgoing
                        .send(ClientEvent::ItemCreate {
                            item: ConversationItem::FunctionCallOutput { call_id, output },
                        })
                        .await
                        .is_ok()
                        && outgoing.send(ClientEvent::ResponseCreate).await.is_ok();
                    if !sent {
                        bridge.teardown(false).await;
                        break;
                    }
                    bridge.set_status(VoiceStatus::Listening);
                }
                ServerEvent::SpeechStarted | ServerEvent::SpeechStopped => {
                    bridge.set_status(VoiceStatus::Listening);
                }
                ServerEvent::ResponseCreated => bridge.set_status(VoiceStatus::Thinking),
                ServerEvent::ResponseDone => bridge.set_status(VoiceStatus::Listening),
                ServerEvent::Error { error } => {
                    warn!(message = %error.message, "realtime backend error");
                    bridge.set_status(VoiceStatus::Error(error.message));
                }
                ServerEvent::Unhandled => {}
            }
        }
    }

    async fn dispatch_tool(&self, name: &str, raw_args: &str) -> Result<String, VoiceError> {
        let args: serde_json::Value = if raw_args.is_empty() {
            json!({})
        } else {
            serde_json::from_str(raw_args)
                .map_err(|e| VoiceError::Protocol(format!("tool arguments: {e}")))?
        };
        match name {
            "analyze_workspace" => {
                let capture = self
                    .snapshotter
                    .capture(self.surface.as_ref())
                    .map_err(|e| VoiceError::Protocol(e.to_string()))?;
                let Some(capture) = capture else {
                    return Ok(json!({"ok": true, "analysis": "The canvas is empty."}).to_string());
                };
                let focus = args["focus"].as_str();
                match self.analyst.analyze(&capture.bytes, focus).await {
                    Ok(analysis) => Ok(json!({"ok": true, "analysis": analysis}).to_string()),
                    Err(e) => Ok(json!({"ok": false, "error": e.to_string()}).to_string()),
                }
            }
            "draw_on_canvas" => {
                let mode = args["mode"].as_str().and_then(AssistMode::parse);
                // Forced: bypasses the debounce path and the fingerprint
                // short-circuit, but never the single-flight guard.
                let result = self.orchestrator.run(GenerationTrigger::forced(mode)).await;
                Ok(match result {
                    Ok(PipelineOutcome::Generated { .. }) => {
                        json!({"ok": true, "result": "overlay drawn on the canvas"})
                    }
                    Ok(PipelineOutcome::NoHelpNeeded { reason }) => {
                        json!({"ok": true, "result": format!("declined: {reason}")})
                    }
                    Ok(PipelineOutcome::Unchanged) => {
                        json!({"ok": true, "result": "canvas unchanged since last look"})
                    }
                    Ok(PipelineOutcome::EmptyCanvas) => {
                        json!({"ok": false, "error": "the canvas is empty"})
                    }
                    Ok(PipelineOutcome::Busy) => {
                        json!({"ok": false, "error": "a generation is already running"})
                    }
                    Ok(PipelineOutcome::VoiceActive) | Ok(PipelineOutcome::Canceled) => {
                        json!({"ok": false, "error": "generation was interrupted"})
                    }
                    Err(e) => json!({"ok": false, "error": e.to_string()}),
                }
                .to_string())
            }
            other => Err(VoiceError::Protocol(format!("unknown tool: {other}"))),
        }
    }

    fn session_config() -> SessionConfig {
        SessionConfig {
            instructions: "You are a patient drawing-canvas tutor. Look at the student's \
                           work with analyze_workspace before advising. Use draw_on_canvas \
                           only when the student asks for visual help or is clearly stuck."
                .to_owned(),
            tools: vec![
                ToolSpec {
                    kind: "function",
                    name: "analyze_workspace",
                    description: "Capture the student's canvas and describe what is on it.",
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "focus": {
                                "type": "string",
                                "description": "Optional aspect to focus the analysis on."
                            }
                        }
                    }),
                },
                ToolSpec {
                    kind: "function",
                    name: "draw_on_canvas",
                    description: "Generate a hint or solution overlay onto the canvas.",
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "mode": {
                                "type": "string",
                                "enum": ["feedback", "suggest", "answer"],
                                "description": "How much help to draw."
                            }
                        }
                    }),
                },
            ],
        }
    }

    fn set_status(&self, status: VoiceStatus) {
        let _ = self.status.send_replace(status);
    }
}
