//! Pan/zoom state and the device ↔ world transform.
//!
//! `origin` is the world point shown at the device top-left corner, so
//! `world = origin + device / zoom`.

use crate::geometry::clamp;
use kurbo::{Affine, Point, Rect, Size, Vec2};

pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
pub const DEFAULT_MAX_ZOOM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub origin: Point,
    pub zoom: f64,
    /// Device surface size in pixels.
    pub device: Size,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin: Point::ZERO,
            zoom: 1.0,
            device: Size::new(width.max(0.0), height.max(0.0)),
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
        }
    }

    /// Replace the zoom bounds and re-clamp the current zoom.
    pub fn with_zoom_bounds(mut self, min: f64, max: f64) -> Self {
        self.set_zoom_bounds(min, max);
        self
    }

    pub fn set_zoom_bounds(&mut self, min: f64, max: f64) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.min_zoom = if min > 0.0 { min } else { DEFAULT_MIN_ZOOM };
        self.max_zoom = max.max(self.min_zoom);
        self.zoom = clamp(self.zoom, self.min_zoom, self.max_zoom);
    }

    pub fn screen_to_world(&self, dx: f64, dy: f64) -> Point {
        Point::new(
            self.origin.x + dx / self.zoom,
            self.origin.y + dy / self.zoom,
        )
    }

    pub fn world_to_screen(&self, wx: f64, wy: f64) -> Point {
        Point::new(
            (wx - self.origin.x) * self.zoom,
            (wy - self.origin.y) * self.zoom,
        )
    }

    /// Device pixels → world units for lengths (tolerances, ring widths).
    pub fn device_len_to_world(&self, len: f64) -> f64 {
        len / self.zoom
    }

    /// Anchor zoom: the world point under `(dx, dy)` stays put.
    /// Saturates at the zoom bounds; bad factors are ignored.
    pub fn zoom_at(&mut self, dx: f64, dy: f64, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            log::debug!("ignoring zoom factor {factor}");
            return;
        }
        let anchor = self.screen_to_world(dx, dy);
        self.zoom = clamp(self.zoom * factor, self.min_zoom, self.max_zoom);
        self.origin = Point::new(anchor.x - dx / self.zoom, anchor.y - dy / self.zoom);
    }

    /// Move the canvas by a device-space delta (content follows the pointer).
    pub fn pan(&mut self, ddx: f64, ddy: f64) {
        self.origin -= Vec2::new(ddx, ddy) / self.zoom;
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.device = Size::new(width.max(0.0), height.max(0.0));
    }

    /// Command-surface setter. Zoom is clamped like every other path.
    pub fn set(&mut self, origin: Point, zoom: f64) {
        if origin.x.is_finite() && origin.y.is_finite() {
            self.origin = origin;
        }
        if zoom.is_finite() && zoom > 0.0 {
            self.zoom = clamp(zoom, self.min_zoom, self.max_zoom);
        }
    }

    /// Visible world size (`device / zoom`).
    pub fn visible_size(&self) -> Size {
        Size::new(self.device.width / self.zoom, self.device.height / self.zoom)
    }

    pub fn visible_world_rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.visible_size())
    }

    /// World → device affine: one group-level transform for the whole scene.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.zoom) * Affine::translate(-self.origin.to_vec2())
    }

    /// Device center, used for keyboard zoom.
    pub fn device_center(&self) -> Point {
        Point::new(self.device.width / 2.0, self.device.height / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a - b).hypot() < 1e-9
    }

    #[test]
    fn roundtrip_under_arbitrary_state() {
        let mut vp = Viewport::new(1024.0, 768.0);
        vp.pan(-37.0, 112.5);
        vp.zoom_at(300.0, 200.0, 2.7);
        for p in [
            Point::new(0.0, 0.0),
            Point::new(-1234.5, 987.25),
            Point::new(1e5, -3e4),
        ] {
            let s = vp.world_to_screen(p.x, p.y);
            assert!(close(vp.screen_to_world(s.x, s.y), p));
        }
    }

    #[test]
    fn zoom_at_keeps_anchor_fixed() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.pan(40.0, -20.0);
        let before = vp.screen_to_world(250.0, 130.0);
        vp.zoom_at(250.0, 130.0, 1.75);
        let after = vp.screen_to_world(250.0, 130.0);
        assert!(close(before, after));
        assert!((vp.zoom - 1.75).abs() < 1e-12);
    }

    #[test]
    fn zoom_saturates_at_bounds() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.zoom_at(0.0, 0.0, 100.0);
        assert_eq!(vp.zoom, DEFAULT_MAX_ZOOM);
        vp.zoom_at(0.0, 0.0, 1e-6);
        assert_eq!(vp.zoom, DEFAULT_MIN_ZOOM);
        // Anchor still holds when saturated.
        let before = vp.screen_to_world(10.0, 10.0);
        vp.zoom_at(10.0, 10.0, 0.5);
        assert!(close(before, vp.screen_to_world(10.0, 10.0)));
    }

    #[test]
    fn invalid_factor_is_ignored() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.zoom_at(5.0, 5.0, f64::NAN);
        vp.zoom_at(5.0, 5.0, -2.0);
        assert_eq!(vp.zoom, 1.0);
        assert_eq!(vp.origin, Point::ZERO);
    }

    #[test]
    fn pan_scales_by_zoom() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.set(Point::ZERO, 2.0);
        vp.pan(100.0, 50.0);
        assert!(close(vp.origin, Point::new(-50.0, -25.0)));
    }

    #[test]
    fn visible_size_is_device_over_zoom() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.set(Point::new(10.0, 10.0), 4.0);
        assert_eq!(vp.visible_size(), Size::new(200.0, 150.0));
        assert_eq!(vp.visible_world_rect(), Rect::new(10.0, 10.0, 210.0, 160.0));
    }

    #[test]
    fn transform_matches_world_to_screen() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.set(Point::new(-30.0, 12.0), 1.5);
        let p = Point::new(42.0, -7.0);
        assert!(close(vp.transform() * p, vp.world_to_screen(p.x, p.y)));
    }
}
