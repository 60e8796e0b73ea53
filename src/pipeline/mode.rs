use serde::{Deserialize, Serialize};

/// Assistance strength requested from the generator. Consumed as a tagged
/// variant by the materializing stage via `profile()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssistMode {
    /// Margin annotations on the user's work. Committed immediately at full
    /// opacity; not reviewable.
    Feedback,
    /// A nudge toward the next step, shown as a ghost overlay.
    Suggest,
    /// The full worked solution, shown as a ghost overlay.
    Answer,
}

/// Per-mode behavior table: prompt template, overlay opacity at creation, and
/// whether the result waits for user review.
#[derive(Debug, Clone, Copy)]
pub struct ModeProfile {
    pub prompt: &'static str,
    pub overlay_opacity: f32,
    pub reviewable: bool,
}

impl AssistMode {
    pub fn profile(self) -> ModeProfile {
        match self {
            AssistMode::Feedback => ModeProfile {
                prompt: "Annotate the student's work with brief margin feedback. \
                         Mark what is correct and circle mistakes. Do not solve the problem.",
                overlay_opacity: 1.0,
                reviewable: false,
            },
            AssistMode::Suggest => ModeProfile {
                prompt: "The student appears stuck. Sketch only the next step of the \
                         solution as a light hint. Leave the rest for them.",
                overlay_opacity: 0.3,
                reviewable: true,
            },
            AssistMode::Answer => ModeProfile {
                prompt: "Work the problem to completion, writing each step clearly \
                         in the free space of the canvas.",
                overlay_opacity: 0.3,
                reviewable: true,
            },
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feedback" => Some(AssistMode::Feedback),
            "suggest" => Some(AssistMode::Suggest),
            "answer" => Some(AssistMode::Answer),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_commits_immediately() {
        let profile = AssistMode::Feedback.profile();
        assert!(!profile.reviewable);
        assert_eq!(profile.overlay_opacity, 1.0);
    }

    #[test]
    fn reviewable_modes_start_as_ghosts() {
        for mode in [AssistMode::Suggest, AssistMode::Answer] {
            let profile = mode.profile();
            assert!(profile.reviewable);
            assert!(profile.overlay_opacity < 1.0);
        }
    }

    #[test]
    fn parse_round_trips_the_wire_names() {
        assert_eq!(AssistMode::parse("answer"), Some(AssistMode::Answer));
        assert_eq!(AssistMode::parse("bogus"), None);
    }
}
