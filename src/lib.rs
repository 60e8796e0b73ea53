pub mod activity;
pub mod canvas;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod voice;

// Re-export the two state machines most hosts wire up directly.
pub use pipeline::GenerationOrchestrator;
pub use voice::VoiceToolBridge;
