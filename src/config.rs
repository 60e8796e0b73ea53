use std::time::Duration;

use crate::pipeline::{AssistMode, PipelineShape};

/// Endpoint and tuning configuration, env-driven with local defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub generate_url: String,
    pub ocr_url: String,
    pub needcheck_url: String,
    pub analysis_url: String,
    pub token_url: String,
    pub board_url: String,
    pub quiet_period: Duration,
    pub error_display: Duration,
    pub pipeline_shape: PipelineShape,
    pub default_mode: AssistMode,
}

impl Config {
    pub fn from_env() -> Self {
        let base = env_or("EASEL_API_BASE", "http://localhost:8080");
        Self {
            api_key: std::env::var("EASEL_API_KEY").unwrap_or_default(),
            generate_url: env_or("EASEL_GENERATE_URL", &format!("{base}/v1/generate")),
            ocr_url: env_or("EASEL_OCR_URL", &format!("{base}/v1/ocr")),
            needcheck_url: env_or("EASEL_NEEDCHECK_URL", &format!("{base}/v1/need-check")),
            analysis_url: env_or("EASEL_ANALYSIS_URL", &format!("{base}/v1/analyze")),
            token_url: env_or("EASEL_TOKEN_URL", &format!("{base}/v1/realtime/token")),
            board_url: env_or("EASEL_BOARD_URL", &format!("{base}/v1/boards")),
            quiet_period: Duration::from_millis(env_ms("EASEL_QUIET_MS", 2500)),
            error_display: Duration::from_millis(env_ms("EASEL_ERROR_DISPLAY_MS", 3000)),
            pipeline_shape: match std::env::var("EASEL_PIPELINE").as_deref() {
                Ok("three-stage") => PipelineShape::ThreeStage,
                _ => PipelineShape::SingleCall,
            },
            default_mode: std::env::var("EASEL_MODE")
                .ok()
                .as_deref()
                .and_then(AssistMode::parse)
                .unwrap_or(AssistMode::Answer),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_ms(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
