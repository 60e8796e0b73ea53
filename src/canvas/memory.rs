use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;

use super::surface::CanvasSurface;
use super::types::{
    AssetId, Bounds, MutationEvent, MutationSource, RasterOptions, Shape, ShapeId, ShapeKind,
    ShapePatch,
};
use crate::error::CanvasError;

const EVENT_CAPACITY: usize = 64;

/// In-memory canvas used by the harness binary and the test suite. Stands in
/// for the real editor binding; the raster export is a canonical byte encoding
/// of the included geometry rather than actual pixels, which preserves the one
/// property the pipeline relies on (content-equal captures are byte-equal).
pub struct InMemoryCanvas {
    doc: Mutex<Doc>,
    viewport: Mutex<Bounds>,
    events: broadcast::Sender<MutationEvent>,
}

#[derive(Default)]
struct Doc {
    shapes: Vec<Shape>,
    assets: HashMap<AssetId, Vec<u8>>,
}

/// Projection of a shape into the raster encoding. Excludes transient flags
/// that do not affect rendered content equality.
#[derive(Serialize)]
struct RasterShape<'a> {
    id: ShapeId,
    kind: &'a ShapeKind,
    bounds: Bounds,
    opacity: f32,
}

#[derive(Serialize)]
struct RasterFrame<'a> {
    bounds: Bounds,
    opts: RasterOptions,
    shapes: Vec<RasterShape<'a>>,
}

impl InMemoryCanvas {
    pub fn new(viewport: Bounds) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            doc: Mutex::new(Doc::default()),
            viewport: Mutex::new(viewport),
            events,
        }
    }

    pub fn set_viewport(&self, bounds: Bounds) {
        *self.viewport.lock().unwrap() = bounds;
    }

    /// Convenience for tests and the harness: add a hand-drawn stroke.
    pub fn add_stroke(&self, points: Vec<(f64, f64)>) -> ShapeId {
        let (min_x, min_y, max_x, max_y) = points.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(ax, ay, bx, by), &(x, y)| (ax.min(x), ay.min(y), bx.max(x), by.max(y)),
        );
        let shape = Shape {
            id: ShapeId::fresh(),
            kind: ShapeKind::Stroke { points },
            bounds: Bounds::new(min_x, min_y, max_x - min_x, max_y - min_y),
            opacity: 1.0,
            locked: false,
            provisional: false,
        };
        let id = shape.id;
        self.create_shape(shape);
        id
    }

    pub fn shape_count(&self) -> usize {
        self.doc.lock().unwrap().shapes.len()
    }

    fn emit(&self) {
        // Local writes are indistinguishable from hand-drawn ones.
        let _ = self.events.send(MutationEvent {
            source: MutationSource::User,
        });
    }
}

impl CanvasSurface for InMemoryCanvas {
    fn shape_ids(&self) -> Vec<ShapeId> {
        self.doc.lock().unwrap().shapes.iter().map(|s| s.id).collect()
    }

    fn shape(&self, id: ShapeId) -> Option<Shape> {
        self.doc
            .lock()
            .unwrap()
            .shapes
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    fn viewport(&self) -> Bounds {
        *self.viewport.lock().unwrap()
    }

    fn export_raster(
        &self,
        ids: &[ShapeId],
        bounds: Bounds,
        opts: &RasterOptions,
    ) -> Result<Vec<u8>, CanvasError> {
        let doc = self.doc.lock().unwrap();
        let mut included: Vec<&Shape> = doc
            .shapes
            .iter()
            .filter(|s| ids.contains(&s.id))
            .collect();
        // Document order is insertion order; sort by id for a stable encoding
        // independent of z-reordering noise.
        included.sort_by_key(|s| s.id);
        let frame = RasterFrame {
            bounds,
            opts: *opts,
            shapes: included
                .iter()
                .map(|s| RasterShape {
                    id: s.id,
                    kind: &s.kind,
                    bounds: s.bounds,
                    opacity: s.opacity,
                })
                .collect(),
        };
        serde_json::to_vec(&frame).map_err(|e| CanvasError::Export(e.to_string()))
    }

    fn create_asset(&self, bytes: Vec<u8>) -> AssetId {
        let id = AssetId::fresh();
        self.doc.lock().unwrap().assets.insert(id, bytes);
        id
    }

    fn create_shape(&self, shape: Shape) {
        self.doc.lock().unwrap().shapes.push(shape);
        self.emit();
    }

    fn update_shape(&self, id: ShapeId, patch: ShapePatch) -> Result<(), CanvasError> {
        {
            let mut doc = self.doc.lock().unwrap();
            let shape = doc
                .shapes
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(CanvasError::ShapeNotFound(id))?;
            // Editor rule: content fields of a locked shape cannot be patched.
            let touches_content = patch.opacity.is_some() || patch.provisional.is_some();
            if shape.locked && touches_content && patch.locked != Some(false) {
                return Err(CanvasError::ShapeLocked(id));
            }
            if let Some(locked) = patch.locked {
                shape.locked = locked;
            }
            if let Some(opacity) = patch.opacity {
                shape.opacity = opacity;
            }
            if let Some(provisional) = patch.provisional {
                shape.provisional = provisional;
            }
        }
        self.emit();
        Ok(())
    }

    fn delete_shape(&self, id: ShapeId) -> Result<(), CanvasError> {
        {
            let mut doc = self.doc.lock().unwrap();
            let idx = doc
                .shapes
                .iter()
                .position(|s| s.id == id)
                .ok_or(CanvasError::ShapeNotFound(id))?;
            if doc.shapes[idx].locked {
                return Err(CanvasError::ShapeLocked(id));
            }
            doc.shapes.remove(idx);
        }
        self.emit();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    fn document_snapshot(&self) -> Result<serde_json::Value, CanvasError> {
        let doc = self.doc.lock().unwrap();
        serde_json::to_value(&doc.shapes).map_err(|e| CanvasError::Snapshot(e.to_string()))
    }
}
