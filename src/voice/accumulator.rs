use std::collections::HashMap;

/// Buffers streamed tool-call argument fragments keyed by call id. Fragments
/// concatenate in arrival order; an entry exists only between its first delta
/// and its done signal, so nothing leaks across calls.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    parts: HashMap<String, String>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, call_id: &str, delta: &str) {
        self.parts
            .entry(call_id.to_owned())
            .or_default()
            .push_str(delta);
    }

    /// Finalize a call: returns the assembled arguments and removes the
    /// entry. `None` when no delta ever arrived (zero-argument calls).
    pub fn finish(&mut self, call_id: &str) -> Option<String> {
        self.parts.remove(call_id)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_reassemble_in_arrival_order() {
        let mut acc = ToolCallAccumulator::new();
        acc.push("call_1", "{\"mode\":");
        acc.push("call_1", "\"answer\"}");
        let args = acc.finish("call_1").unwrap();
        assert_eq!(args, r#"{"mode":"answer"}"#);
        assert!(acc.is_empty(), "finalized entry must be removed");
    }

    #[test]
    fn interleaved_calls_stay_separate() {
        let mut acc = ToolCallAccumulator::new();
        acc.push("a", "{\"focus\":");
        acc.push("b", "{}");
        acc.push("a", "\"x\"}");
        assert_eq!(acc.finish("b").unwrap(), "{}");
        assert_eq!(acc.finish("a").unwrap(), r#"{"focus":"x"}"#);
    }

    #[test]
    fn finish_without_deltas_is_none() {
        let mut acc = ToolCallAccumulator::new();
        assert!(acc.finish("ghost").is_none());
    }
}
