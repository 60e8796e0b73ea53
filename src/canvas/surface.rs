use tokio::sync::broadcast;

use super::types::{AssetId, Bounds, MutationEvent, RasterOptions, Shape, ShapeId, ShapePatch};
use crate::error::CanvasError;

/// The capability surface the pipeline consumes from the external drawing
/// editor. Deliberately small: shape enumeration, viewport, deterministic
/// raster export, asset/shape CRUD, mutation events, document snapshot.
/// Everything else the editor can do is none of our business.
pub trait CanvasSurface: Send + Sync {
    fn shape_ids(&self) -> Vec<ShapeId>;

    fn shape(&self, id: ShapeId) -> Option<Shape>;

    /// Current viewport bounds in document space.
    fn viewport(&self) -> Bounds;

    /// Render the given shape subset within `bounds` to raster bytes.
    /// Determinism contract: same shapes + same bounds + same options must
    /// yield byte-identical output. The fingerprint short-circuit depends on
    /// this.
    fn export_raster(
        &self,
        ids: &[ShapeId],
        bounds: Bounds,
        opts: &RasterOptions,
    ) -> Result<Vec<u8>, CanvasError>;

    fn create_asset(&self, bytes: Vec<u8>) -> AssetId;

    fn create_shape(&self, shape: Shape);

    fn update_shape(&self, id: ShapeId, patch: ShapePatch) -> Result<(), CanvasError>;

    fn delete_shape(&self, id: ShapeId) -> Result<(), CanvasError>;

    /// Mutation feed. Delivery is asynchronous: an event may arrive a tick
    /// after the write that caused it.
    fn subscribe(&self) -> broadcast::Receiver<MutationEvent>;

    /// Serialize the full document for persistence.
    fn document_snapshot(&self) -> Result<serde_json::Value, CanvasError>;
}
