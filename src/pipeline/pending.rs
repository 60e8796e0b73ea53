use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::activity::{SuppressGuard, SUPPRESS_GRACE};
use crate::canvas::{AssetId, CanvasSurface, ShapeId, ShapePatch};
use crate::error::CanvasError;

/// A provisional AI overlay awaiting user review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingArtifact {
    pub shape: ShapeId,
    pub asset: AssetId,
}

/// Tracks ghost overlays and resolves them. Accept commits the shape at full
/// opacity (still locked, non-selectable); reject deletes it. Both wrap their
/// canvas writes in the suppression guard so the debouncer does not read the
/// resolution as fresh user activity.
pub struct PendingArtifactManager {
    surface: Arc<dyn CanvasSurface>,
    suppress: Arc<SuppressGuard>,
    pending: Mutex<Vec<PendingArtifact>>,
}

impl PendingArtifactManager {
    pub fn new(surface: Arc<dyn CanvasSurface>, suppress: Arc<SuppressGuard>) -> Self {
        Self {
            surface,
            suppress,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, shape: ShapeId, asset: AssetId) {
        self.pending.lock().unwrap().push(PendingArtifact { shape, asset });
    }

    /// Most recently added pending artifact; the one the UI surfaces by
    /// default.
    pub fn latest(&self) -> Option<PendingArtifact> {
        self.pending.lock().unwrap().last().copied()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }

    pub fn accept(&self, id: ShapeId) -> Result<(), CanvasError> {
        let Some(artifact) = self.take(id) else {
            debug!(?id, "accept of unknown pending artifact ignored");
            return Ok(());
        };
        self.suppress.hold(SUPPRESS_GRACE);
        self.commit(artifact.shape)
    }

    /// Batch variant: commits every pending artifact, oldest first.
    pub fn accept_all(&self) -> Result<(), CanvasError> {
        let drained: Vec<_> = self.pending.lock().unwrap().drain(..).collect();
        if drained.is_empty() {
            return Ok(());
        }
        self.suppress.hold(SUPPRESS_GRACE + Duration::from_millis(50 * drained.len() as u64));
        for artifact in drained {
            self.commit(artifact.shape)?;
        }
        Ok(())
    }

    pub fn reject(&self, id: ShapeId) -> Result<(), CanvasError> {
        let Some(artifact) = self.take(id) else {
            debug!(?id, "reject of unknown pending artifact ignored");
            return Ok(());
        };
        self.suppress.hold(SUPPRESS_GRACE);
        // The editor refuses to delete locked shapes; unlock first. The asset
        // is orphaned with the shape.
        self.surface
            .update_shape(artifact.shape, ShapePatch { locked: Some(false), ..Default::default() })?;
        self.surface.delete_shape(artifact.shape)
    }

    fn take(&self, id: ShapeId) -> Option<PendingArtifact> {
        let mut pending = self.pending.lock().unwrap();
        let idx = pending.iter().position(|a| a.shape == id)?;
        Some(pending.remove(idx))
    }

    /// Unlock, raise to full opacity and drop the provisional flag, relock.
    fn commit(&self, shape: ShapeId) -> Result<(), CanvasError> {
        self.surface
            .update_shape(shape, ShapePatch { locked: Some(false), ..Default::default() })?;
        self.surface.update_shape(
            shape,
            ShapePatch {
                opacity: Some(1.0),
                provisional: Some(false),
                ..Default::default()
            },
        )?;
        self.surface
            .update_shape(shape, ShapePatch { locked: Some(true), ..Default::default() })
    }
}
