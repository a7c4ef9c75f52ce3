// Aspect-ratio viewport policy and source->target coordinate mapping (part of C3/C6).
//
// Kept free of any D3D11 types so the letterbox/pillarbox math and the cursor-position
// mapping it feeds can be unit-tested without a GPU, the same separation drawn
// elsewhere in this codebase between pure geometry helpers and device-owning types.

/// A target-space rectangle, in pixels, that the source image is drawn into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Compute the destination rectangle for the source image given the aspect-ratio
/// policy: stretch fills the whole target; preserve-aspect letterboxes or pillarboxes
/// around a centered rectangle that fits the source's aspect ratio.
pub fn compute_viewport(preserve_aspect: bool, target_w: u32, target_h: u32, source_w: u32, source_h: u32) -> Viewport {
    let target_w = target_w as f32;
    let target_h = target_h as f32;

    if !preserve_aspect || source_w == 0 || source_h == 0 {
        return Viewport { x: 0.0, y: 0.0, width: target_w, height: target_h };
    }

    let target_aspect = target_w / target_h;
    let source_aspect = source_w as f32 / source_h as f32;

    if source_aspect > target_aspect {
        // Source is relatively wider than the target: fit width, letterbox top/bottom.
        let height = target_w / source_aspect;
        let y = (target_h - height) / 2.0;
        Viewport { x: 0.0, y, width: target_w, height }
    } else {
        // Source is relatively taller than the target: fit height, pillarbox left/right.
        let width = target_h * source_aspect;
        let x = (target_w - width) / 2.0;
        Viewport { x, y: 0.0, width, height: target_h }
    }
}

/// Map a point in source-image pixel space into clip-space NDC, routed through the
/// given viewport so a cursor position tracks the letterboxed/pillarboxed image rather
/// than the raw target window.
pub fn source_point_to_ndc(viewport: Viewport, target_w: u32, target_h: u32, source_w: u32, source_h: u32, x: f32, y: f32) -> (f32, f32) {
    let u = if source_w == 0 { 0.0 } else { x / source_w as f32 };
    let v = if source_h == 0 { 0.0 } else { y / source_h as f32 };

    let px = viewport.x + u * viewport.width;
    let py = viewport.y + v * viewport.height;

    let ndc_x = (px / target_w as f32) * 2.0 - 1.0;
    let ndc_y = 1.0 - (py / target_h as f32) * 2.0;
    (ndc_x, ndc_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stretch_fills_target_regardless_of_source_shape() {
        let vp = compute_viewport(false, 1920, 1080, 3840, 2160);
        assert_eq!(vp, Viewport { x: 0.0, y: 0.0, width: 1920.0, height: 1080.0 });
    }

    #[test]
    fn matching_aspect_fills_target_exactly() {
        let vp = compute_viewport(true, 1920, 1080, 3840, 2160);
        assert_eq!(vp, Viewport { x: 0.0, y: 0.0, width: 1920.0, height: 1080.0 });
    }

    #[test]
    fn wider_source_letterboxes_top_and_bottom() {
        // 21:9 source into a 16:9 target: fits width, bars above/below.
        let vp = compute_viewport(true, 1920, 1080, 2560, 1080);
        assert_eq!(vp.x, 0.0);
        assert_eq!(vp.width, 1920.0);
        assert!(vp.height < 1080.0);
        assert!(vp.y > 0.0);
    }

    #[test]
    fn taller_source_pillarboxes_left_and_right() {
        // 4:3 source into a 16:9 target: fits height, bars left/right.
        let vp = compute_viewport(true, 1920, 1080, 1024, 768);
        assert_eq!(vp.y, 0.0);
        assert_eq!(vp.height, 1080.0);
        assert!(vp.width < 1920.0);
        assert!(vp.x > 0.0);
    }

    #[test]
    fn source_corners_map_to_viewport_corners() {
        let vp = compute_viewport(true, 1920, 1080, 1024, 768);
        let (x0, y0) = source_point_to_ndc(vp, 1920, 1080, 1024, 768, 0.0, 0.0);
        assert!((x0 - (-1.0 + 2.0 * vp.x / 1920.0)).abs() < 1e-4);
        assert!((y0 - (1.0 - 2.0 * vp.y / 1080.0)).abs() < 1e-4);

        let (x1, y1) = source_point_to_ndc(vp, 1920, 1080, 1024, 768, 1024.0, 768.0);
        assert!((x1 - (-1.0 + 2.0 * (vp.x + vp.width) / 1920.0)).abs() < 1e-4);
        assert!((y1 - (1.0 - 2.0 * (vp.y + vp.height) / 1080.0)).abs() < 1e-4);
    }

    #[test]
    fn center_of_source_maps_to_center_of_viewport() {
        let vp = compute_viewport(true, 1920, 1080, 1024, 768);
        let (x, y) = source_point_to_ndc(vp, 1920, 1080, 1024, 768, 512.0, 384.0);
        let expected_x = -1.0 + 2.0 * (vp.x + vp.width / 2.0) / 1920.0;
        let expected_y = 1.0 - 2.0 * (vp.y + vp.height / 2.0) / 1080.0;
        assert!((x - expected_x).abs() < 1e-4);
        assert!((y - expected_y).abs() < 1e-4);
    }

    #[test]
    fn zero_sized_source_does_not_panic() {
        let vp = compute_viewport(true, 1920, 1080, 0, 0);
        assert_eq!(vp, Viewport { x: 0.0, y: 0.0, width: 1920.0, height: 1080.0 });
        let (x, y) = source_point_to_ndc(vp, 1920, 1080, 0, 0, 10.0, 10.0);
        assert!(x.is_finite() && y.is_finite());
    }
}
