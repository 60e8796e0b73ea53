pub mod accumulator;
pub mod bridge;
pub mod events;
pub mod transport;

pub use accumulator::ToolCallAccumulator;
pub use bridge::{VoiceStatus, VoiceToolBridge};
pub use events::{ClientEvent, ConversationItem, ServerEvent, SessionConfig, ToolSpec};
pub use transport::{DataChannel, HttpSdpExchange, MediaSession, RealtimeTransport};
