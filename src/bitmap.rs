//! Raster primitives shared by the stroke, fill and selection engines.
//!
//! Every layer bitmap is a straight-alpha `RgbaImage` in the fixed logical
//! canvas space. Masks are `GrayImage`s where 0 means "outside".

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use egui::{Color32, Pos2, Vec2};
use image::{GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::BitmapError;

pub const CANVAS_WIDTH: u32 = 1280;
pub const CANVAS_HEIGHT: u32 = 720;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// A fully transparent canvas-sized bitmap.
pub fn blank_canvas() -> RgbaImage {
    RgbaImage::new(CANVAS_WIDTH, CANVAS_HEIGHT)
}

/// Places `img` at the canvas origin on a canvas-sized bitmap, clipping anything
/// past the edges. Canvas-sized input is returned as is.
pub fn fit_to_canvas(img: RgbaImage) -> RgbaImage {
    if img.dimensions() == (CANVAS_WIDTH, CANVAS_HEIGHT) {
        return img;
    }
    let mut out = blank_canvas();
    image::imageops::replace(&mut out, &img, 0, 0);
    out
}

/// Clamps a logical coordinate onto the canvas. Out-of-bounds input is never rejected.
pub fn clamp_to_canvas(pos: Pos2) -> Pos2 {
    egui::pos2(
        pos.x.clamp(0.0, (CANVAS_WIDTH - 1) as f32),
        pos.y.clamp(0.0, (CANVAS_HEIGHT - 1) as f32),
    )
}

pub fn color_to_rgba(color: Color32) -> Rgba<u8> {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    Rgba([r, g, b, a])
}

/// Source-over blend of a straight-alpha pixel, with its alpha scaled by `opacity`.
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>, opacity: f32) {
    let sa = src[3] as f32 / 255.0 * opacity.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= f32::EPSILON {
        *dst = TRANSPARENT;
        return;
    }
    for c in 0..3 {
        let blended = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / out_a;
        dst[c] = blended.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Destination-out: removes `coverage` (0..=1) of the pixel's alpha.
pub fn erase_pixel(dst: &mut Rgba<u8>, coverage: f32) {
    let remaining = dst[3] as f32 * (1.0 - coverage.clamp(0.0, 1.0));
    dst[3] = remaining.round() as u8;
    if dst[3] == 0 {
        *dst = TRANSPARENT;
    }
}

/// Composites `src` onto `dst` with its top-left corner at (`x`, `y`); pixels
/// falling outside `dst` are dropped.
pub fn composite_at(dst: &mut RgbaImage, src: &RgbaImage, x: i64, y: i64, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    let (dw, dh) = (dst.width() as i64, dst.height() as i64);
    for (sx, sy, px) in src.enumerate_pixels() {
        let tx = x + sx as i64;
        let ty = y + sy as i64;
        if tx < 0 || ty < 0 || tx >= dw || ty >= dh || px[3] == 0 {
            continue;
        }
        blend_over(dst.get_pixel_mut(tx as u32, ty as u32), *px, opacity);
    }
}

/// Destination-in against a mask of the same size: keeps only what lies inside.
pub fn keep_inside(img: &mut RgbaImage, mask: &GrayImage) {
    for (x, y, px) in img.enumerate_pixels_mut() {
        let m = mask.get_pixel_checked(x, y).map_or(0, |l| l[0]);
        if m == 0 {
            *px = TRANSPARENT;
        } else if m < 255 {
            px[3] = ((px[3] as u16 * m as u16) / 255) as u8;
        }
    }
}

/// Rasterises a closed polygon (even-odd rule, sampled at pixel centres) into a mask.
pub fn fill_polygon(width: u32, height: u32, points: &[Pos2]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if points.len() < 3 {
        return mask;
    }
    let mut crossings: Vec<f32> = Vec::with_capacity(points.len());
    for row in 0..height {
        let yc = row as f32 + 0.5;
        crossings.clear();
        for (i, a) in points.iter().enumerate() {
            let b = points[(i + 1) % points.len()];
            let crosses = (a.y <= yc && yc < b.y) || (b.y <= yc && yc < a.y);
            if crosses {
                crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        crossings.sort_by(|l, r| l.total_cmp(r));
        for span in crossings.chunks_exact(2) {
            let from = (span[0] - 0.5).ceil().max(0.0) as u32;
            let to = ((span[1] - 0.5).ceil().max(0.0) as u32).min(width);
            for col in from..to {
                mask.put_pixel(col, row, Luma([255]));
            }
        }
    }
    mask
}

/// Draws `src` stretched to `size`, rotated by `rotation` radians around `center`,
/// source-over onto `dst`. Nearest-neighbour sampling.
pub fn draw_transformed(dst: &mut RgbaImage, src: &RgbaImage, center: Pos2, size: Vec2, rotation: f32) {
    if size.x < 1.0 || size.y < 1.0 || src.width() == 0 || src.height() == 0 {
        return;
    }
    let (sin, cos) = rotation.sin_cos();
    let half = size * 0.5;
    // Axis-aligned bounds of the rotated box.
    let ext_x = half.x * cos.abs() + half.y * sin.abs();
    let ext_y = half.x * sin.abs() + half.y * cos.abs();
    let min_x = (center.x - ext_x).floor().max(0.0) as u32;
    let min_y = (center.y - ext_y).floor().max(0.0) as u32;
    let max_x = ((center.x + ext_x).ceil().max(0.0) as u32).min(dst.width());
    let max_y = ((center.y + ext_y).ceil().max(0.0) as u32).min(dst.height());

    let scale_u = src.width() as f32 / size.x;
    let scale_v = src.height() as f32 / size.y;
    for y in min_y..max_y {
        for x in min_x..max_x {
            let dx = x as f32 + 0.5 - center.x;
            let dy = y as f32 + 0.5 - center.y;
            // Inverse rotation into the box's local frame.
            let lx = dx * cos + dy * sin + half.x;
            let ly = -dx * sin + dy * cos + half.y;
            if lx < 0.0 || ly < 0.0 || lx >= size.x || ly >= size.y {
                continue;
            }
            let u = ((lx * scale_u) as u32).min(src.width() - 1);
            let v = ((ly * scale_v) as u32).min(src.height() - 1);
            let px = *src.get_pixel(u, v);
            if px[3] != 0 {
                blend_over(dst.get_pixel_mut(x, y), px, 1.0);
            }
        }
    }
}

pub fn encode_png(img: &RgbaImage) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

pub fn decode_png(bytes: &[u8]) -> image::ImageResult<RgbaImage> {
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8())
}

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A bitmap as stored: a `data:` URL (or bare base64) string, or raw PNG bytes
/// as a number array from older payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedBitmap {
    DataUrl(String),
    Bytes(Vec<u8>),
}

impl EncodedBitmap {
    pub fn encode(img: &RgbaImage) -> Result<Self, BitmapError> {
        let png = encode_png(img)?;
        Ok(Self::DataUrl(format!("{PNG_DATA_URL_PREFIX}{}", BASE64_STANDARD.encode(png))))
    }

    pub fn decode(&self) -> Result<RgbaImage, BitmapError> {
        match self {
            Self::DataUrl(text) => {
                // Any `data:<mime>;base64,` header is accepted; the format is sniffed.
                let payload = match text.split_once(',') {
                    Some((header, body)) if header.starts_with("data:") => body,
                    _ => text.as_str(),
                };
                let bytes = BASE64_STANDARD.decode(payload.trim())?;
                Ok(image::load_from_memory(&bytes)?.to_rgba8())
            }
            Self::Bytes(bytes) => Ok(decode_png(bytes)?),
        }
    }
}

/// Serde adapter storing an optional bitmap as a PNG data URL.
pub mod png_opt {
    use image::RgbaImage;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::EncodedBitmap;

    pub fn serialize<S: Serializer>(img: &Option<RgbaImage>, s: S) -> Result<S::Ok, S::Error> {
        match img {
            Some(img) => {
                let encoded = EncodedBitmap::encode(img).map_err(serde::ser::Error::custom)?;
                s.serialize_some(&encoded)
            }
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RgbaImage>, D::Error> {
        Option::<EncodedBitmap>::deserialize(d)?
            .map(|encoded| encoded.decode().map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_over_opaque_replaces() {
        let mut dst = Rgba([10, 20, 30, 255]);
        blend_over(&mut dst, Rgba([200, 100, 0, 255]), 1.0);
        assert_eq!(dst, Rgba([200, 100, 0, 255]));
    }

    #[test]
    fn test_blend_over_half_opacity_onto_transparent() {
        let mut dst = TRANSPARENT;
        blend_over(&mut dst, Rgba([255, 0, 0, 255]), 0.5);
        assert_eq!(dst[0], 255);
        assert_eq!(dst[3], 128);
    }

    #[test]
    fn test_fill_polygon_square() {
        let square = [
            egui::pos2(2.0, 2.0),
            egui::pos2(6.0, 2.0),
            egui::pos2(6.0, 6.0),
            egui::pos2(2.0, 6.0),
        ];
        let mask = fill_polygon(10, 10, &square);
        let inside = mask.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(inside, 16);
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
        assert_eq!(mask.get_pixel(7, 7)[0], 0);
    }

    #[test]
    fn test_fit_to_canvas_pads_and_clips() {
        let mut small = RgbaImage::new(4, 4);
        small.put_pixel(3, 3, Rgba([1, 1, 1, 255]));
        let fitted = fit_to_canvas(small);
        assert_eq!(fitted.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert_eq!(fitted.get_pixel(3, 3)[3], 255);

        let mut wide = RgbaImage::new(CANVAS_WIDTH + 10, 10);
        wide.put_pixel(CANVAS_WIDTH + 5, 0, Rgba([1, 1, 1, 255]));
        wide.put_pixel(CANVAS_WIDTH - 1, 0, Rgba([2, 2, 2, 255]));
        let fitted = fit_to_canvas(wide);
        assert_eq!(fitted.dimensions(), (CANVAS_WIDTH, CANVAS_HEIGHT));
        assert_eq!(fitted.get_pixel(CANVAS_WIDTH - 1, 0).0, [2, 2, 2, 255]);
    }

    #[test]
    fn test_bitmap_is_stored_as_data_url() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(2, 1, Rgba([9, 8, 7, 255]));
        let EncodedBitmap::DataUrl(url) = EncodedBitmap::encode(&img).unwrap() else {
            panic!("expected a data URL");
        };
        assert!(url.starts_with("data:image/png;base64,"));

        let back = serde_json::from_value::<EncodedBitmap>(serde_json::Value::String(url)).unwrap();
        assert_eq!(back.decode().unwrap(), img);
    }

    #[test]
    fn test_byte_array_bitmaps_still_decode() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let bytes = serde_json::to_value(encode_png(&img).unwrap()).unwrap();
        let stored: EncodedBitmap = serde_json::from_value(bytes).unwrap();
        assert!(matches!(stored, EncodedBitmap::Bytes(_)));
        assert_eq!(stored.decode().unwrap(), img);
        assert!(EncodedBitmap::DataUrl("data:image/png;base64,@@@".into()).decode().is_err());
    }

    #[test]
    fn test_png_roundtrip_preserves_pixels() {
        let mut img = RgbaImage::new(4, 3);
        img.put_pixel(1, 2, Rgba([1, 2, 3, 4]));
        let back = decode_png(&encode_png(&img).unwrap()).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn test_draw_transformed_identity_copies() {
        let mut src = RgbaImage::new(2, 2);
        for px in src.pixels_mut() {
            *px = Rgba([9, 9, 9, 255]);
        }
        let mut dst = RgbaImage::new(6, 6);
        draw_transformed(&mut dst, &src, egui::pos2(3.0, 3.0), egui::vec2(2.0, 2.0), 0.0);
        assert_eq!(*dst.get_pixel(2, 2), Rgba([9, 9, 9, 255]));
        assert_eq!(*dst.get_pixel(3, 3), Rgba([9, 9, 9, 255]));
        assert_eq!(*dst.get_pixel(4, 4), TRANSPARENT);
    }
}
