//! Cropping, aspect padding and highlight compositing on RGBA bitmaps.

use image::{imageops, Pixel, Rgba, RgbaImage};

use crate::geometry::{CropPlan, PixelRect};

pub const DEFAULT_ASPECT: f64 = 16.0 / 9.0;

/// Copies the planned source area into a transparent `(w*d, h*d)` canvas.
/// Pixels are never resampled.
pub fn crop(bitmap: &RgbaImage, plan: &CropPlan) -> RgbaImage {
    let mut out = RgbaImage::new(plan.dest_width, plan.dest_height);
    if plan.source.is_empty() || out.width() == 0 || out.height() == 0 {
        return out;
    }
    let sampled = imageops::crop_imm(
        bitmap,
        plan.source.x,
        plan.source.y,
        plan.source.width,
        plan.source.height,
    )
    .to_image();
    imageops::replace(
        &mut out,
        &sampled,
        i64::from(plan.dest_x),
        i64::from(plan.dest_y),
    );
    out
}

/// Crop re-centered inside a larger canvas; `offset_*` is where the crop's
/// top-left landed.
#[derive(Debug, Clone)]
pub struct Padded {
    pub image: RgbaImage,
    pub offset_x: u32,
    pub offset_y: u32,
}

/// Canvas size for a `w`×`h` crop at `aspect`, never smaller than `min`.
/// A crop with one zero side still gets a frame sized from the other.
pub fn frame_size(w: u32, h: u32, aspect: f64, min: (u32, u32)) -> (u32, u32) {
    let aspect = if aspect.is_finite() && aspect > 0.0 {
        aspect
    } else {
        DEFAULT_ASPECT
    };
    let (min_w, min_h) = min;

    // 0/0 is NaN and lands in the second arm with a zero frame.
    let (mut fw, mut fh) = if f64::from(w) / f64::from(h) > aspect {
        (w, (f64::from(w) / aspect).round() as u32)
    } else {
        ((f64::from(h) * aspect).round() as u32, h)
    };

    if fw < min_w || fh < min_h {
        fw = fw.max(min_w);
        fh = (f64::from(fw) / aspect).round() as u32;
        if fh < min_h {
            fh = min_h;
            fw = (f64::from(fh) * aspect).round() as u32;
        }
    }
    (fw.max(w), fh.max(h))
}

/// Pads `img` symmetrically with `fill` until it reaches `aspect`. Only the
/// `sampled` part of `img` is copied; the rest of the frame shows `fill`.
pub fn pad_to_aspect(
    img: &RgbaImage,
    sampled: PixelRect,
    aspect: f64,
    min: (u32, u32),
    fill: Rgba<u8>,
) -> Padded {
    let (w, h) = img.dimensions();
    let (fw, fh) = frame_size(w, h, aspect, min);
    let offset_x = (fw - w) / 2;
    let offset_y = (fh - h) / 2;

    let mut image = RgbaImage::from_pixel(fw, fh, fill);
    if !sampled.is_empty() {
        let inner =
            imageops::crop_imm(img, sampled.x, sampled.y, sampled.width, sampled.height).to_image();
        imageops::replace(
            &mut image,
            &inner,
            i64::from(offset_x + sampled.x),
            i64::from(offset_y + sampled.y),
        );
    }
    Padded {
        image,
        offset_x,
        offset_y,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    pub color: Rgba<u8>,
    pub width: u32,
    pub fill_alpha: u8,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: Rgba([255, 59, 48, 255]),
            width: 3,
            fill_alpha: 36,
        }
    }
}

/// Tinted fill, then a solid stroke of `style.width` rings starting on the
/// rect's own edge pixels, wrapped in a translucent halo that contrasts
/// with the stroke color.
pub fn draw_highlight(img: &mut RgbaImage, rect: PixelRect, style: &HighlightStyle) {
    if rect.is_empty() || img.width() == 0 || img.height() == 0 {
        return;
    }
    let left = i64::from(rect.x);
    let top = i64::from(rect.y);
    let right = left + i64::from(rect.width) - 1;
    let bottom = top + i64::from(rect.height) - 1;

    let stroke = i64::from(style.width.max(1));
    let halo = ((f64::from(style.width.max(1)) * 0.6).round() as i64).max(2) * 2;
    let halo_color = halo_for(style.color);
    let [r, g, b, _] = style.color.0;
    let tint = Rgba([r, g, b, style.fill_alpha]);

    let reach = stroke + halo;
    let clip = |lo: i64, hi: i64, size: u32| lo.max(0)..=hi.min(i64::from(size) - 1);
    for y in clip(top - reach, bottom + reach, img.height()) {
        for x in clip(left - reach, right + reach, img.width()) {
            // Ring index: 0 on the rect border, negative inside, growing outward.
            let ring = (left - x).max(x - right).max(top - y).max(y - bottom);
            let pixel = img.get_pixel_mut(x as u32, y as u32);
            if ring < 0 {
                if style.fill_alpha > 0 {
                    pixel.blend(&tint);
                }
            } else if ring < stroke {
                *pixel = style.color;
            } else if ring < reach {
                pixel.blend(&halo_color);
            }
        }
    }
}

fn halo_for(stroke: Rgba<u8>) -> Rgba<u8> {
    if stroke.to_luma().0[0] > 153 {
        Rgba([0, 0, 0, 220])
    } else {
        Rgba([255, 255, 255, 220])
    }
}
