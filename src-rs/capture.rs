//! Suppress, grab, restore, then crop/pad/highlight into screenshots.

use chrono::{DateTime, Utc};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::compare::parse_color;
use crate::dom::Document;
use crate::error::CaptureError;
use crate::geometry::{plan_crop, CropPlan, PageRect, PixelRect};
use crate::raster::{self, HighlightStyle};
use crate::selection::SelectionTarget;
use crate::suppress::Suppression;
use crate::surface::CaptureSurface;
use crate::viewport::{PageMetadata, Viewport};

const FALLBACK_PADDING: Rgba<u8> = Rgba([242, 242, 242, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
}

impl AspectRatio {
    pub fn ratio(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            raster::DEFAULT_ASPECT
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Tunables for the capture pipeline, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureOptions {
    /// Logical pixels added around an element before cropping.
    pub element_margin: f64,
    pub pad_to_aspect: bool,
    pub aspect: AspectRatio,
    pub min_frame: FrameSize,
    pub padding_fill: String,
    pub highlight_color: String,
    pub highlight_width: u32,
    pub highlight_fill_alpha: u8,
    /// Emit the highlighted copy alongside the plain element crop.
    pub highlighted_variant: bool,
    pub hidden_z_index_threshold: i32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            element_margin: 40.0,
            pad_to_aspect: true,
            aspect: AspectRatio {
                width: 16.0,
                height: 9.0,
            },
            min_frame: FrameSize {
                width: 640,
                height: 360,
            },
            padding_fill: "#F2F2F2".to_string(),
            highlight_color: "#FF3B30".to_string(),
            highlight_width: 3,
            highlight_fill_alpha: 36,
            highlighted_variant: true,
            hidden_z_index_threshold: 2_147_483_000,
        }
    }
}

impl CaptureOptions {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn padding_rgba(&self) -> Rgba<u8> {
        parse_color(&self.padding_fill).map_or(FALLBACK_PADDING, |c| c.to_rgba())
    }

    pub fn highlight_style(&self) -> HighlightStyle {
        let defaults = HighlightStyle::default();
        HighlightStyle {
            color: parse_color(&self.highlight_color).map_or(defaults.color, |c| c.to_rgba()),
            width: self.highlight_width,
            fill_alpha: self.highlight_fill_alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureKind {
    Element,
    Region,
    FullSurface,
}

impl CaptureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureKind::Element => "element",
            CaptureKind::Region => "region",
            CaptureKind::FullSurface => "full_surface",
        }
    }
}

impl From<&SelectionTarget> for CaptureKind {
    fn from(target: &SelectionTarget) -> Self {
        match target {
            SelectionTarget::Element { .. } => CaptureKind::Element,
            SelectionTarget::Region(_) => CaptureKind::Region,
            SelectionTarget::FullSurface => CaptureKind::FullSurface,
        }
    }
}

/// One finished capture. The highlighted variant is a separate value.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub pixels: RgbaImage,
    pub captured_at: DateTime<Utc>,
    pub kind: CaptureKind,
    pub page: PageMetadata,
    pub highlighted: bool,
    /// Where the selected subject sits inside `pixels`.
    pub subject: PixelRect,
    pub crop: CropPlan,
}

impl Screenshot {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn sidecar(&self) -> Value {
        json!({
            "captured_at": self.captured_at.to_rfc3339(),
            "captured_at_epoch_ms": self.captured_at.timestamp_millis(),
            "kind": self.kind,
            "highlighted": self.highlighted,
            "image_size": {
                "w": self.width(),
                "h": self.height(),
                "units": "px",
            },
            "subject": {
                "x": self.subject.x,
                "y": self.subject.y,
                "w": self.subject.width,
                "h": self.subject.height,
                "units": "px",
            },
            "crop": {
                "requested": self.crop.requested,
                "source": self.crop.source,
                "clamped": self.crop.is_clamped(),
            },
            "page": self.page,
            "capture_sidecar_version": 1,
        })
    }
}

/// Drives a [`CaptureSurface`] through the suppress/grab/restore bracket.
pub struct CaptureOrchestrator<S> {
    surface: S,
    options: CaptureOptions,
}

impl<S: CaptureSurface> CaptureOrchestrator<S> {
    pub fn new(surface: S, options: CaptureOptions) -> Self {
        Self { surface, options }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Returns one screenshot, or plain then highlighted for elements.
    /// The page is back in its original shape before this returns,
    /// whatever the outcome.
    pub fn capture(
        &mut self,
        doc: &mut Document,
        viewport: &Viewport,
        target: &SelectionTarget,
    ) -> Result<Vec<Screenshot>, CaptureError> {
        let grabbed = {
            let suppression = Suppression::apply(doc, self.options.hidden_z_index_threshold);
            let grabbed = self.surface.grab(suppression.document(), viewport);
            suppression.restore();
            grabbed
        };
        let bitmap = grabbed.map_err(|err| {
            warn!(%err, kind = CaptureKind::from(target).as_str(), "full-surface grab failed");
            CaptureError::from(err)
        })?;
        let captured_at = Utc::now();

        let kind = CaptureKind::from(target);
        let area = self.capture_area(viewport, target);
        let d = bitmap.device_pixel_ratio;
        let plan = plan_crop(
            &area,
            viewport.scroll,
            d,
            bitmap.pixels.width(),
            bitmap.pixels.height(),
        );
        if plan.is_clamped() {
            debug!(
                requested = ?plan.requested,
                source = ?plan.source,
                "crop clamped to grab bounds"
            );
        }
        let cropped = raster::crop(&bitmap.pixels, &plan);
        drop(bitmap);

        let pad = self.options.pad_to_aspect && kind != CaptureKind::FullSurface;
        let (pixels, offset_x, offset_y) = if pad {
            let min = (self.options.min_frame.width, self.options.min_frame.height);
            let padded = raster::pad_to_aspect(
                &cropped,
                plan.sampled_area(),
                self.options.aspect.ratio(),
                min,
                self.options.padding_rgba(),
            );
            (padded.image, padded.offset_x, padded.offset_y)
        } else {
            (cropped, 0, 0)
        };

        let subject = match target {
            SelectionTarget::Element { rect, .. } => PixelRect {
                x: offset_x + to_px((rect.x - area.x) * d),
                y: offset_y + to_px((rect.y - area.y) * d),
                width: to_px(rect.width * d),
                height: to_px(rect.height * d),
            },
            _ => PixelRect {
                x: offset_x,
                y: offset_y,
                width: plan.dest_width,
                height: plan.dest_height,
            },
        };

        let plain = Screenshot {
            pixels,
            captured_at,
            kind,
            page: viewport.page_metadata(),
            highlighted: false,
            subject,
            crop: plan,
        };

        if kind != CaptureKind::Element || !self.options.highlighted_variant {
            return Ok(vec![plain]);
        }

        let mut pixels = plain.pixels.clone();
        raster::draw_highlight(&mut pixels, subject, &self.options.highlight_style());
        let highlighted = Screenshot {
            pixels,
            captured_at: plain.captured_at,
            kind: plain.kind,
            page: plain.page.clone(),
            highlighted: true,
            subject: plain.subject,
            crop: plain.crop,
        };
        Ok(vec![plain, highlighted])
    }

    fn capture_area(&self, viewport: &Viewport, target: &SelectionTarget) -> PageRect {
        match target {
            SelectionTarget::Element { rect, .. } => rect.inflate(self.options.element_margin),
            SelectionTarget::Region(rect) => *rect,
            SelectionTarget::FullSurface => viewport.visible_rect(),
        }
    }
}

fn to_px(v: f64) -> u32 {
    v.round().max(0.0) as u32
}
