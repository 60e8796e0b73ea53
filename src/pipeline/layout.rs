use crate::canvas::Bounds;

/// Place a generated image within the viewport: uniform scale
/// `min(vw/iw, vh/ih)` so the overlay fits without distortion, centered.
pub fn fit_in_viewport(viewport: Bounds, img_w: u32, img_h: u32) -> Bounds {
    let scale = (viewport.w / img_w as f64).min(viewport.h / img_h as f64);
    let w = img_w as f64 * scale;
    let h = img_h as f64 * scale;
    Bounds {
        x: viewport.x + (viewport.w - w) / 2.0,
        y: viewport.y + (viewport.h - h) / 2.0,
        w,
        h,
    }
}
