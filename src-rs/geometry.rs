//! Page, viewport and device-pixel coordinate types.
//!
//! Page coordinates are relative to the document origin (scroll included),
//! client coordinates are relative to the visible viewport, and device
//! coordinates index into a raw bitmap after device-pixel-ratio scaling.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClientPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ClientPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_page(self, scroll: ScrollOffset) -> PagePoint {
        PagePoint {
            x: self.x + scroll.x,
            y: self.y + scroll.y,
        }
    }
}

/// Rectangle in page coordinates. Width and height are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Normalized rectangle spanning two corners dragged in any direction.
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
        )
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, point: PagePoint) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Grows the rectangle by `margin` on every side.
    pub fn inflate(&self, margin: f64) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }
}

/// Integer rectangle inside a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Sampling rectangle in device pixels before clamping. Components may be
/// negative or exceed the bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DeviceRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Where to sample from a raw grab and where the samples land in the crop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropPlan {
    pub requested: DeviceRect,
    pub source: PixelRect,
    pub dest_x: u32,
    pub dest_y: u32,
    pub dest_width: u32,
    pub dest_height: u32,
}

impl CropPlan {
    /// True when the sampled area is smaller than the destination.
    pub fn is_clamped(&self) -> bool {
        self.source.width != self.dest_width || self.source.height != self.dest_height
    }

    /// Where the sampled pixels sit inside the `dest_width`×`dest_height` crop.
    pub fn sampled_area(&self) -> PixelRect {
        PixelRect {
            x: self.dest_x,
            y: self.dest_y,
            width: self.source.width,
            height: self.source.height,
        }
    }
}

pub fn sanitize_ratio(device_pixel_ratio: f64) -> f64 {
    if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    }
}

/// Maps a page rectangle to a sampling plan inside a `bitmap_w`×`bitmap_h`
/// grab of the viewport.
///
/// The requested source rectangle is `((x-sx)*d, (y-sy)*d, w*d, h*d)`.
/// Out-of-range components are clamped to the bitmap edge, which shrinks the
/// sampled area; the destination keeps the full `(w*d, h*d)` size and the
/// samples are placed at the offset the clamp removed, so geometry inside the
/// crop stays exact.
pub fn plan_crop(
    rect: &PageRect,
    scroll: ScrollOffset,
    device_pixel_ratio: f64,
    bitmap_w: u32,
    bitmap_h: u32,
) -> CropPlan {
    let d = sanitize_ratio(device_pixel_ratio);
    let requested = DeviceRect {
        x: (rect.x - scroll.x) * d,
        y: (rect.y - scroll.y) * d,
        width: rect.width * d,
        height: rect.height * d,
    };

    let dest_width = requested.width.round().max(0.0) as u32;
    let dest_height = requested.height.round().max(0.0) as u32;

    let (src_x, src_w, dest_x) = clamp_axis(requested.x, dest_width, bitmap_w);
    let (src_y, src_h, dest_y) = clamp_axis(requested.y, dest_height, bitmap_h);

    CropPlan {
        requested,
        source: PixelRect {
            x: src_x,
            y: src_y,
            width: src_w,
            height: src_h,
        },
        dest_x,
        dest_y,
        dest_width,
        dest_height,
    }
}

fn clamp_axis(start: f64, span: u32, limit: u32) -> (u32, u32, u32) {
    let start = start.round() as i64;
    let end = start + i64::from(span);
    let limit = i64::from(limit);

    let lo = start.clamp(0, limit);
    let hi = end.clamp(0, limit);
    let sampled = (hi - lo).max(0);
    let shift = (lo - start).clamp(0, i64::from(span));

    (lo as u32, sampled as u32, shift as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_normalize_reverse_drags() {
        let rect = PageRect::from_corners(
            PagePoint { x: 50.0, y: 80.0 },
            PagePoint { x: 10.0, y: 20.0 },
        );
        assert_eq!(rect, PageRect::new(10.0, 20.0, 40.0, 60.0));
    }

    #[test]
    fn negative_sizes_are_zeroed() {
        let rect = PageRect::new(0.0, 0.0, -5.0, 3.0);
        assert_eq!(rect.width, 0.0);
        assert!(rect.is_empty());
    }

    #[test]
    fn unclamped_plan_matches_requested_size() {
        let rect = PageRect::new(100.0, 300.0, 50.0, 20.0);
        let plan = plan_crop(&rect, ScrollOffset { x: 0.0, y: 200.0 }, 1.0, 1280, 720);
        assert_eq!(
            plan.source,
            PixelRect {
                x: 100,
                y: 100,
                width: 50,
                height: 20
            }
        );
        assert_eq!((plan.dest_width, plan.dest_height), (50, 20));
        assert_eq!((plan.dest_x, plan.dest_y), (0, 0));
        assert!(!plan.is_clamped());
    }

    #[test]
    fn negative_viewport_offset_clamps_to_zero() {
        // element at (160, 380) with a 40px margin, scrolled 200px down, dpr 2
        let element = PageRect::new(160.0, 380.0, 100.0, 60.0);
        let rect = element.inflate(40.0);
        assert_eq!((rect.x, rect.y), (120.0, 340.0));

        let plan = plan_crop(&rect, ScrollOffset { x: 200.0, y: 200.0 }, 2.0, 2560, 1440);
        assert_eq!(plan.requested.x, (120.0 - 200.0) * 2.0);
        assert_eq!(plan.requested.y, (340.0 - 200.0) * 2.0);
        assert_eq!(plan.source.x, 0);
        assert_eq!(plan.source.y, 280);
        assert_eq!(plan.dest_width, 360);
        assert_eq!(plan.dest_height, 280);
        assert_eq!(plan.dest_x, 160);
        assert_eq!(plan.source.width, 200);
        assert!(plan.is_clamped());
    }

    #[test]
    fn far_out_of_range_plan_samples_nothing() {
        let rect = PageRect::new(5000.0, 5000.0, 10.0, 10.0);
        let plan = plan_crop(&rect, ScrollOffset::default(), 1.0, 100, 100);
        assert!(plan.source.is_empty());
        assert_eq!((plan.dest_width, plan.dest_height), (10, 10));
    }

    #[test]
    fn bogus_ratio_falls_back_to_one() {
        assert_eq!(sanitize_ratio(0.0), 1.0);
        assert_eq!(sanitize_ratio(f64::NAN), 1.0);
        assert_eq!(sanitize_ratio(1.5), 1.5);
    }
}
