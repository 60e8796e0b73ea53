mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use common::{rig, TestRig};
use easel::error::{PipelineError, VoiceError};
use easel::pipeline::{GenerationTrigger, PipelineOutcome};
use easel::services::realtime::{RealtimeCredential, TokenMinter};
use easel::services::WorkspaceAnalyst;
use easel::voice::{
    ClientEvent, ConversationItem, DataChannel, MediaSession, RealtimeTransport, ServerEvent,
    VoiceStatus, VoiceToolBridge,
};

struct ScriptedMinter;

#[async_trait]
impl TokenMinter for ScriptedMinter {
    async fn mint(&self) -> Result<RealtimeCredential, VoiceError> {
        Ok(RealtimeCredential { client_secret: "ephemeral-secret".into() })
    }
}

/// Transport double: hands the bridge a pre-built channel pair and keeps the
/// far ends for the test to drive.
struct ScriptedTransport {
    channel: Mutex<Option<DataChannel>>,
    closed: AtomicBool,
}

impl ScriptedTransport {
    fn new() -> (Arc<Self>, mpsc::Sender<ServerEvent>, mpsc::Receiver<ClientEvent>) {
        let (server_tx, incoming) = mpsc::channel(32);
        let (outgoing, wire_rx) = mpsc::channel(32);
        let transport = Arc::new(Self {
            channel: Mutex::new(Some(DataChannel { outgoing, incoming })),
            closed: AtomicBool::new(false),
        });
        (transport, server_tx, wire_rx)
    }
}

#[async_trait]
impl RealtimeTransport for ScriptedTransport {
    async fn connect(&self, credential: &RealtimeCredential) -> Result<DataChannel, VoiceError> {
        assert_eq!(credential.client_secret, "ephemeral-secret");
        self.channel
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| VoiceError::Transport("already connected".into()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct ScriptedMedia {
    allow_microphone: bool,
    muted: AtomicBool,
    stopped: AtomicBool,
}

impl ScriptedMedia {
    fn allowing() -> Self {
        Self {
            allow_microphone: true,
            muted: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    fn denying() -> Self {
        Self { allow_microphone: false, ..Self::allowing() }
    }
}

#[async_trait]
impl MediaSession for ScriptedMedia {
    async fn acquire_microphone(&self) -> Result<(), VoiceError> {
        if self.allow_microphone {
            Ok(())
        } else {
            Err(VoiceError::PermissionDenied)
        }
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct RecordingAnalyst {
    last_focus: Mutex<Option<String>>,
}

#[async_trait]
impl WorkspaceAnalyst for RecordingAnalyst {
    async fn analyze(&self, _raster: &[u8], focus: Option<&str>) -> Result<String, PipelineError> {
        *self.last_focus.lock().unwrap() = focus.map(str::to_owned);
        Ok("two strokes forming a triangle".into())
    }
}

struct VoiceRig {
    rig: TestRig,
    bridge: Arc<VoiceToolBridge>,
    transport: Arc<ScriptedTransport>,
    media: Arc<ScriptedMedia>,
    analyst: Arc<RecordingAnalyst>,
    server_tx: mpsc::Sender<ServerEvent>,
    wire_rx: mpsc::Receiver<ClientEvent>,
}

fn voice_rig(media: ScriptedMedia) -> VoiceRig {
    let rig = rig();
    let (transport, server_tx, wire_rx) = ScriptedTransport::new();
    let media = Arc::new(media);
    let analyst = Arc::new(RecordingAnalyst { last_focus: Mutex::new(None) });
    let bridge = Arc::new(VoiceToolBridge::new(
        Arc::new(ScriptedMinter),
        transport.clone(),
        media.clone(),
        analyst.clone(),
        rig.orchestrator.clone(),
        rig.surface.clone(),
        rig.voice_active.clone(),
    ));
    VoiceRig { rig, bridge, transport, media, analyst, server_tx, wire_rx }
}

async fn next_wire(wire_rx: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(1), wire_rx.recv())
        .await
        .expect("wire event in time")
        .expect("channel open")
}

#[tokio::test]
async fn start_announces_the_tool_set_and_listens() {
    let mut vr = voice_rig(ScriptedMedia::allowing());
    vr.bridge.start().await.unwrap();

    let first = next_wire(&mut vr.wire_rx).await;
    let ClientEvent::SessionUpdate { session } = first else {
        panic!("first data-channel message must declare the session, got {first:?}");
    };
    let names: Vec<_> = session.tools.iter().map(|t| t.name).collect();
    assert_eq!(names, vec!["analyze_workspace", "draw_on_canvas"]);

    assert_eq!(*vr.bridge.status().borrow(), VoiceStatus::Listening);
    assert!(vr.rig.voice_active.load(Ordering::SeqCst));
}

#[tokio::test]
async fn streamed_arguments_reassemble_and_dispatch() {
    let mut vr = voice_rig(ScriptedMedia::allowing());
    vr.rig.canvas.add_stroke(vec![(0.0, 0.0), (10.0, 10.0)]);
    vr.bridge.start().await.unwrap();
    let _session = next_wire(&mut vr.wire_rx).await;

    // Arguments arrive as string fragments keyed by call id.
    for delta in ["{\"focus\":", "\"triangle\"}"] {
        vr.server_tx
            .send(ServerEvent::FunctionCallArgumentsDelta {
                call_id: "call_1".into(),
                delta: delta.into(),
            })
            .await
            .unwrap();
    }
    vr.server_tx
        .send(ServerEvent::FunctionCallArgumentsDone {
            call_id: "call_1".into(),
            name: "analyze_workspace".into(),
        })
        .await
        .unwrap();

    let output = next_wire(&mut vr.wire_rx).await;
    let ClientEvent::ItemCreate {
        item: ConversationItem::FunctionCallOutput { call_id, output },
    } = output
    else {
        panic!("expected a function_call_output, got {output:?}");
    };
    assert_eq!(call_id, "call_1");
    assert!(output.contains("triangle"), "analysis text missing from {output}");
    assert!(matches!(next_wire(&mut vr.wire_rx).await, ClientEvent::ResponseCreate));

    assert_eq!(
        vr.analyst.last_focus.lock().unwrap().as_deref(),
        Some("triangle"),
        "handler must receive the parsed arguments"
    );
}

#[tokio::test]
async fn draw_tool_forces_generation_while_voice_owns_the_canvas() {
    let mut vr = voice_rig(ScriptedMedia::allowing());
    vr.rig.canvas.add_stroke(vec![(0.0, 0.0), (10.0, 10.0)]);
    vr.bridge.start().await.unwrap();
    let _session = next_wire(&mut vr.wire_rx).await;

    // Debounced triggers stand down while the session is live.
    let debounced = vr.rig.orchestrator.run(GenerationTrigger::debounced()).await.unwrap();
    assert_eq!(debounced, PipelineOutcome::VoiceActive);

    vr.server_tx
        .send(ServerEvent::FunctionCallArgumentsDelta {
            call_id: "call_2".into(),
            delta: "{\"mode\":\"answer\"}".into(),
        })
        .await
        .unwrap();
    vr.server_tx
        .send(ServerEvent::FunctionCallArgumentsDone {
            call_id: "call_2".into(),
            name: "draw_on_canvas".into(),
        })
        .await
        .unwrap();

    let output = next_wire(&mut vr.wire_rx).await;
    let ClientEvent::ItemCreate {
        item: ConversationItem::FunctionCallOutput { output, .. },
    } = output
    else {
        panic!("expected a function_call_output");
    };
    assert!(output.contains("\"ok\":true"), "tool must report success: {output}");
    assert!(matches!(next_wire(&mut vr.wire_rx).await, ClientEvent::ResponseCreate));

    assert_eq!(vr.rig.generator.call_count(), 1);
    assert_eq!(vr.rig.pending.len(), 1, "voice-forced generation parks a ghost overlay");
}

#[tokio::test]
async fn malformed_arguments_are_reported_not_fatal() {
    let mut vr = voice_rig(ScriptedMedia::allowing());
    vr.rig.canvas.add_stroke(vec![(0.0, 0.0), (10.0, 10.0)]);
    vr.bridge.start().await.unwrap();
    let _session = next_wire(&mut vr.wire_rx).await;

    vr.server_tx
        .send(ServerEvent::FunctionCallArgumentsDelta {
            call_id: "call_3".into(),
            delta: "{not json".into(),
        })
        .await
        .unwrap();
    vr.server_tx
        .send(ServerEvent::FunctionCallArgumentsDone {
            call_id: "call_3".into(),
            name: "analyze_workspace".into(),
        })
        .await
        .unwrap();

    // Even a failed tool call must answer, then trigger a response.
    let output = next_wire(&mut vr.wire_rx).await;
    let ClientEvent::ItemCreate {
        item: ConversationItem::FunctionCallOutput { output, .. },
    } = output
    else {
        panic!("expected a function_call_output");
    };
    assert!(output.contains("\"ok\":false"));
    assert!(matches!(next_wire(&mut vr.wire_rx).await, ClientEvent::ResponseCreate));

    // The session survived; a well-formed call still works.
    vr.server_tx
        .send(ServerEvent::FunctionCallArgumentsDone {
            call_id: "call_4".into(),
            name: "analyze_workspace".into(),
        })
        .await
        .unwrap();
    assert!(matches!(next_wire(&mut vr.wire_rx).await, ClientEvent::ItemCreate { .. }));
}

#[tokio::test]
async fn permission_denied_is_a_distinct_status() {
    let vr = voice_rig(ScriptedMedia::denying());
    let err = vr.bridge.start().await.unwrap_err();
    assert!(matches!(err, VoiceError::PermissionDenied));
    assert_eq!(*vr.bridge.status().borrow(), VoiceStatus::PermissionDenied);
    assert!(!vr.bridge.is_running());
    assert!(!vr.rig.voice_active.load(Ordering::SeqCst));
}

#[tokio::test]
async fn teardown_is_idempotent_and_releases_the_canvas() {
    let mut vr = voice_rig(ScriptedMedia::allowing());
    vr.bridge.start().await.unwrap();
    let _session = next_wire(&mut vr.wire_rx).await;

    vr.bridge.stop().await;
    assert!(!vr.bridge.is_running());
    assert!(vr.transport.closed.load(Ordering::SeqCst));
    assert!(vr.media.stopped.load(Ordering::SeqCst));
    assert!(!vr.rig.voice_active.load(Ordering::SeqCst));
    assert_eq!(*vr.bridge.status().borrow(), VoiceStatus::Closed);

    // Safe to call again when already stopped.
    vr.bridge.stop().await;
    assert_eq!(*vr.bridge.status().borrow(), VoiceStatus::Closed);

    // With the session gone, debounced generation is available again.
    vr.rig.canvas.add_stroke(vec![(0.0, 0.0), (10.0, 10.0)]);
    let outcome = vr.rig.orchestrator.run(GenerationTrigger::debounced()).await.unwrap();
    assert!(matches!(outcome, PipelineOutcome::Generated { .. }));
}

#[tokio::test]
async fn channel_death_during_connect_still_tears_down() {
    let vr = voice_rig(ScriptedMedia::allowing());
    // The backend hangs up before the bridge finishes wiring the session.
    drop(vr.server_tx);
    let _ = vr.bridge.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!vr.bridge.is_running());
    assert!(vr.transport.closed.load(Ordering::SeqCst));
    assert!(vr.media.stopped.load(Ordering::SeqCst));
    assert!(!vr.rig.voice_active.load(Ordering::SeqCst));
    assert_eq!(*vr.bridge.status().borrow(), VoiceStatus::Closed);

    // Nothing stale is parked in the session slot; stop stays a clean no-op.
    vr.bridge.stop().await;
    assert_eq!(*vr.bridge.status().borrow(), VoiceStatus::Closed);
}

#[tokio::test]
async fn mute_disables_audio_without_ending_the_session() {
    let mut vr = voice_rig(ScriptedMedia::allowing());
    vr.rig.canvas.add_stroke(vec![(0.0, 0.0), (10.0, 10.0)]);
    vr.bridge.start().await.unwrap();
    let _session = next_wire(&mut vr.wire_rx).await;

    vr.bridge.set_muted(true);
    assert!(vr.bridge.muted());
    assert!(vr.bridge.is_running(), "mute must not tear the session down");
    assert!(vr.rig.voice_active.load(Ordering::SeqCst));

    // Tool calls still work while muted.
    vr.server_tx
        .send(ServerEvent::FunctionCallArgumentsDone {
            call_id: "call_5".into(),
            name: "analyze_workspace".into(),
        })
        .await
        .unwrap();
    assert!(matches!(next_wire(&mut vr.wire_rx).await, ClientEvent::ItemCreate { .. }));
}
