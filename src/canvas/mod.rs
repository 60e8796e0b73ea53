pub mod memory;
pub mod snapshotter;
pub mod surface;
pub mod types;

pub use snapshotter::{CanvasSnapshotter, Capture};
pub use surface::CanvasSurface;
pub use types::{
    AssetId, Bounds, MutationEvent, MutationSource, RasterOptions, Shape, ShapeId, ShapeKind,
    ShapePatch,
};
