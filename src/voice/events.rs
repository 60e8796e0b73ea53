//! Wire protocol for the realtime data channel. Event names follow the
//! realtime backend's published schema; anything we do not handle lands in
//! `Unhandled` rather than failing the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events we send over the data channel.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },
    #[serde(rename = "conversation.item.create")]
    ItemCreate { item: ConversationItem },
    /// Asks the backend to produce its next response. Mandatory after every
    /// tool output.
    #[serde(rename = "response.create")]
    ResponseCreate,
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionConfig {
    pub instructions: String,
    pub tools: Vec<ToolSpec>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ConversationItem {
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

/// Events we receive from the backend.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta { call_id: String, delta: String },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone { call_id: String, name: String },
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,
    #[serde(rename = "response.created")]
    ResponseCreated,
    #[serde(rename = "response.done")]
    ResponseDone,
    #[serde(rename = "error")]
    Error { error: ServerErrorBody },
    #[serde(other)]
    Unhandled,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerErrorBody {
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_deserialize_by_type_tag() {
        let raw = r#"{"type":"response.function_call_arguments.delta","call_id":"c1","delta":"{\"mo"}"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            event,
            ServerEvent::FunctionCallArgumentsDelta { ref call_id, ref delta }
                if call_id == "c1" && delta == "{\"mo"
        ));
    }

    #[test]
    fn unknown_event_kinds_do_not_fail_the_session() {
        let raw = r#"{"type":"rate_limits.updated","rate_limits":[]}"#;
        let event: ServerEvent = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, ServerEvent::Unhandled));
    }
}
