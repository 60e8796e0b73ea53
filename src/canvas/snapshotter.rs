use super::surface::CanvasSurface;
use super::types::{Bounds, RasterOptions};
use crate::error::CanvasError;

/// One captured frame: the raster bytes plus the viewport they were taken in.
#[derive(Debug, Clone)]
pub struct Capture {
    pub bytes: Vec<u8>,
    pub viewport: Bounds,
}

/// Renders the current non-provisional shape set to a deterministic raster.
/// Provisional overlays are excluded so an accept/reject cycle does not
/// perturb the fingerprint used for change detection.
#[derive(Debug, Clone, Default)]
pub struct CanvasSnapshotter {
    opts: RasterOptions,
}

impl CanvasSnapshotter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when there is nothing to capture (empty inclusion set).
    /// That is a "nothing to do" signal, not an error.
    pub fn capture(&self, surface: &dyn CanvasSurface) -> Result<Option<Capture>, CanvasError> {
        let included: Vec<_> = surface
            .shape_ids()
            .into_iter()
            .filter(|&id| surface.shape(id).is_some_and(|s| !s.provisional))
            .collect();
        if included.is_empty() {
            return Ok(None);
        }
        let viewport = surface.viewport();
        let bytes = surface.export_raster(&included, viewport, &self.opts)?;
        Ok(Some(Capture { bytes, viewport }))
    }
}
