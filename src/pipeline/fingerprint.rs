use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Base64 encoding of the last successfully compared raster capture. Used
/// purely for equality: identical canvas content must produce an identical
/// fingerprint so redundant AI calls short-circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasFingerprint(String);

impl CanvasFingerprint {
    pub fn of(raster: &[u8]) -> Self {
        Self(STANDARD.encode(raster))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_identical_fingerprint() {
        assert_eq!(CanvasFingerprint::of(b"frame"), CanvasFingerprint::of(b"frame"));
        assert_ne!(CanvasFingerprint::of(b"frame"), CanvasFingerprint::of(b"other"));
    }
}
