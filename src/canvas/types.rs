use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeId(pub Uuid);

impl ShapeId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub Uuid);

impl AssetId {
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Axis-aligned rectangle in document space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// Where a document mutation originated. The editor cannot tell a programmatic
/// local write apart from a hand-drawn one; both arrive as `User`. The
/// suppression guard exists precisely to cover that gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationSource {
    User,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEvent {
    pub source: MutationSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Stroke { points: Vec<(f64, f64)> },
    Image { asset: AssetId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub bounds: Bounds,
    pub opacity: f32,
    pub locked: bool,
    /// Provisional shapes are pipeline overlays awaiting accept/reject.
    /// They are excluded from fingerprint captures.
    pub provisional: bool,
}

/// Partial update applied to an existing shape. Non-lock fields may only be
/// patched while the shape is unlocked, matching the editor's own rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShapePatch {
    pub opacity: Option<f32>,
    pub locked: Option<bool>,
    pub provisional: Option<bool>,
}

/// Export parameters for the raster encoder. Held fixed so two exports of an
/// unchanged canvas are byte-identical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RasterOptions {
    pub scale: f32,
    pub padding: f64,
    pub background: bool,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            padding: 0.0,
            background: false,
        }
    }
}
