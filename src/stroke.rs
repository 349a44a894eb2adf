//! Pressure-sensitive stroke rendering.
//!
//! Samples are smoothed with quadratic Bézier segments over a sliding buffer of
//! three points: each new sample closes a curve running from the midpoint of the
//! previous pair to the midpoint of the latest pair, with the middle sample as
//! control point. The curve is filled by stamping discs (or squares) whose
//! radius follows `size × pressure²`.

use egui::{Color32, Pos2};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::bitmap::{self, blank_canvas, clamp_to_canvas, erase_pixel};

const MIN_RADIUS: f32 = 0.5;
const GLOW_RADIUS_FACTOR: f32 = 3.0;
const GLOW_ALPHA: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PointerKind {
    #[default]
    Mouse,
    Pen,
    Touch,
}

/// One pointer sample in logical canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeSample {
    pub pos: Pos2,
    /// Raw device pressure, if the device reports one
    pub pressure: Option<f32>,
    pub pointer: PointerKind,
}

impl StrokeSample {
    pub fn new(pos: Pos2, pressure: Option<f32>, pointer: PointerKind) -> Self {
        Self { pos, pressure, pointer }
    }

    pub fn mouse(pos: Pos2) -> Self {
        Self::new(pos, None, PointerKind::Mouse)
    }

    /// Pressure in `0..=1`; devices without pressure draw at full pressure.
    pub fn effective_pressure(&self) -> f32 {
        match self.pointer {
            PointerKind::Mouse => 1.0,
            PointerKind::Pen | PointerKind::Touch => self.pressure.unwrap_or(1.0).clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapStyle {
    Round,
    Square,
}

/// Named drawing presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrushPreset {
    #[default]
    Pencil,
    Ink,
    Marker,
    Highlighter,
    Neon,
}

/// Fixed parameters of a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresetParams {
    pub size: f32,
    pub alpha: f32,
    pub cap: CapStyle,
    pub glow: bool,
}

impl BrushPreset {
    pub const ALL: [BrushPreset; 5] = [
        BrushPreset::Pencil,
        BrushPreset::Ink,
        BrushPreset::Marker,
        BrushPreset::Highlighter,
        BrushPreset::Neon,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BrushPreset::Pencil => "Pencil",
            BrushPreset::Ink => "Ink",
            BrushPreset::Marker => "Marker",
            BrushPreset::Highlighter => "Highlighter",
            BrushPreset::Neon => "Neon",
        }
    }

    pub fn params(&self) -> PresetParams {
        match self {
            BrushPreset::Pencil => PresetParams { size: 2.0, alpha: 1.0, cap: CapStyle::Round, glow: false },
            BrushPreset::Ink => PresetParams { size: 4.0, alpha: 1.0, cap: CapStyle::Round, glow: false },
            BrushPreset::Marker => PresetParams { size: 12.0, alpha: 0.6, cap: CapStyle::Square, glow: false },
            BrushPreset::Highlighter => PresetParams { size: 20.0, alpha: 0.35, cap: CapStyle::Square, glow: false },
            BrushPreset::Neon => PresetParams { size: 5.0, alpha: 1.0, cap: CapStyle::Round, glow: true },
        }
    }
}

/// Resolved appearance of one stroke.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Color32,
    pub size: f32,
    /// Preset alpha, applied when the overlay is composited
    pub alpha: f32,
    pub cap: CapStyle,
    pub glow: bool,
}

impl StrokeStyle {
    pub fn from_preset(preset: BrushPreset, color: Color32, size: Option<f32>) -> Self {
        let params = preset.params();
        Self {
            color,
            size: size.unwrap_or(params.size).max(MIN_RADIUS),
            alpha: params.alpha,
            cap: params.cap,
            glow: params.glow,
        }
    }

    pub fn eraser(size: f32) -> Self {
        Self {
            color: Color32::TRANSPARENT,
            size: size.max(MIN_RADIUS),
            alpha: 1.0,
            cap: CapStyle::Round,
            glow: false,
        }
    }

    pub fn radius_for(&self, sample: &StrokeSample) -> f32 {
        let p = sample.effective_pressure();
        (self.size * p * p).max(MIN_RADIUS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeMode {
    /// Draws into a scratch overlay that is composited on finish.
    Paint,
    /// Erases straight from the layer.
    Erase,
}

/// Incremental renderer for one stroke gesture.
#[derive(Clone)]
pub struct StrokeRenderer {
    style: StrokeStyle,
    mode: StrokeMode,
    buffer: Vec<(Pos2, f32)>,
    last_mid: Option<(Pos2, f32)>,
    overlay: Option<RgbaImage>,
}

impl std::fmt::Debug for StrokeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrokeRenderer")
            .field("style", &self.style)
            .field("mode", &self.mode)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl StrokeRenderer {
    pub fn new(style: StrokeStyle, mode: StrokeMode) -> Self {
        Self {
            style,
            mode,
            buffer: Vec::with_capacity(3),
            last_mid: None,
            overlay: match mode {
                StrokeMode::Paint => Some(blank_canvas()),
                StrokeMode::Erase => None,
            },
        }
    }

    pub fn mode(&self) -> StrokeMode {
        self.mode
    }

    pub fn style(&self) -> &StrokeStyle {
        &self.style
    }

    /// The in-progress paint overlay, for previews.
    pub fn overlay(&self) -> Option<&RgbaImage> {
        self.overlay.as_ref()
    }

    /// Feeds one sample. Paint strokes only touch the overlay; erase strokes cut into `layer`.
    pub fn push(&mut self, sample: StrokeSample, layer: &mut RgbaImage) {
        let pos = clamp_to_canvas(sample.pos);
        let radius = self.style.radius_for(&sample);
        self.buffer.push((pos, radius));

        match self.buffer.len() {
            1 => self.stamp(pos, radius, layer),
            2 => {
                let (a, b) = (self.buffer[0], self.buffer[1]);
                let mid = midpoint(a, b);
                self.line(a, mid, layer);
                self.last_mid = Some(mid);
            }
            _ => {
                let (a, b, c) = (self.buffer[0], self.buffer[1], self.buffer[2]);
                let from = self.last_mid.unwrap_or_else(|| midpoint(a, b));
                let to = midpoint(b, c);
                self.quad(from, b, to, layer);
                self.last_mid = Some(to);
                self.buffer.remove(0);
            }
        }
    }

    /// Draws the tail and, for paint strokes, composites the overlay into `layer`
    /// at `preset alpha × user_opacity`.
    pub fn finish(mut self, layer: &mut RgbaImage, user_opacity: f32) {
        if self.buffer.len() >= 2 {
            if let (Some(mid), Some(&last)) = (self.last_mid, self.buffer.last()) {
                self.line(mid, last, layer);
            }
        }
        if let Some(overlay) = self.overlay.take() {
            bitmap::composite_at(layer, &overlay, 0, 0, self.style.alpha * user_opacity.clamp(0.0, 1.0));
        }
    }

    fn line(&mut self, from: (Pos2, f32), to: (Pos2, f32), layer: &mut RgbaImage) {
        let length = from.0.distance(to.0);
        let steps = self.steps_for(length, from.1.min(to.1));
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let pos = from.0.lerp(to.0, t);
            let radius = egui::lerp(from.1..=to.1, t);
            self.stamp(pos, radius, layer);
        }
    }

    fn quad(&mut self, from: (Pos2, f32), ctrl: (Pos2, f32), to: (Pos2, f32), layer: &mut RgbaImage) {
        // Control polygon length bounds the curve length.
        let length = from.0.distance(ctrl.0) + ctrl.0.distance(to.0);
        let steps = self.steps_for(length, from.1.min(to.1));
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let u = 1.0 - t;
            let pos = egui::pos2(
                u * u * from.0.x + 2.0 * u * t * ctrl.0.x + t * t * to.0.x,
                u * u * from.0.y + 2.0 * u * t * ctrl.0.y + t * t * to.0.y,
            );
            let radius = egui::lerp(from.1..=to.1, t);
            self.stamp(pos, radius, layer);
        }
    }

    fn steps_for(&self, length: f32, radius: f32) -> usize {
        let spacing = (radius * 0.3).max(0.5);
        ((length / spacing).ceil() as usize).max(1)
    }

    fn stamp(&mut self, center: Pos2, radius: f32, layer: &mut RgbaImage) {
        let cap = self.style.cap;
        match self.mode {
            StrokeMode::Paint => {
                let Some(overlay) = self.overlay.as_mut() else {
                    return;
                };
                let color = bitmap::color_to_rgba(self.style.color.to_opaque());
                if self.style.glow {
                    stamp_max(overlay, center, radius * GLOW_RADIUS_FACTOR, cap, color, GLOW_ALPHA);
                }
                stamp_max(overlay, center, radius, cap, color, 1.0);
            }
            StrokeMode::Erase => {
                for_each_covered(layer.width(), layer.height(), center, radius, cap, |x, y, coverage| {
                    erase_pixel(layer.get_pixel_mut(x, y), coverage);
                });
            }
        }
    }
}

fn midpoint(a: (Pos2, f32), b: (Pos2, f32)) -> (Pos2, f32) {
    (a.0.lerp(b.0, 0.5), (a.1 + b.1) * 0.5)
}

/// Max-alpha union into the overlay: overlapping stamps never darken each other.
fn stamp_max(overlay: &mut RgbaImage, center: Pos2, radius: f32, cap: CapStyle, color: Rgba<u8>, strength: f32) {
    let (w, h) = overlay.dimensions();
    for_each_covered(w, h, center, radius, cap, |x, y, coverage| {
        let alpha = (coverage * strength * 255.0).round() as u8;
        let px = overlay.get_pixel_mut(x, y);
        if alpha > px[3] {
            *px = Rgba([color[0], color[1], color[2], alpha]);
        }
    });
}

/// Visits every pixel touched by a disc or square, with an anti-aliased coverage.
fn for_each_covered(
    width: u32,
    height: u32,
    center: Pos2,
    radius: f32,
    cap: CapStyle,
    mut visit: impl FnMut(u32, u32, f32),
) {
    let reach = radius + 1.0;
    let min_x = (center.x - reach).floor().max(0.0) as u32;
    let min_y = (center.y - reach).floor().max(0.0) as u32;
    let max_x = ((center.x + reach).ceil().max(0.0) as u32).min(width);
    let max_y = ((center.y + reach).ceil().max(0.0) as u32).min(height);
    for y in min_y..max_y {
        for x in min_x..max_x {
            let dx = x as f32 + 0.5 - center.x;
            let dy = y as f32 + 0.5 - center.y;
            let d = match cap {
                CapStyle::Round => (dx * dx + dy * dy).sqrt(),
                CapStyle::Square => dx.abs().max(dy.abs()),
            };
            let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
            if coverage > 0.0 {
                visit(x, y, coverage);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(samples: &[(f32, f32)], style: StrokeStyle) -> RgbaImage {
        let mut layer = blank_canvas();
        let mut renderer = StrokeRenderer::new(style, StrokeMode::Paint);
        for &(x, y) in samples {
            renderer.push(StrokeSample::mouse(egui::pos2(x, y)), &mut layer);
        }
        renderer.finish(&mut layer, 1.0);
        layer
    }

    #[test]
    fn test_paint_leaves_layer_untouched_until_finish() {
        let style = StrokeStyle::from_preset(BrushPreset::Ink, Color32::BLACK, None);
        let mut layer = blank_canvas();
        let mut renderer = StrokeRenderer::new(style, StrokeMode::Paint);
        renderer.push(StrokeSample::mouse(egui::pos2(10.0, 10.0)), &mut layer);
        renderer.push(StrokeSample::mouse(egui::pos2(50.0, 10.0)), &mut layer);
        assert!(layer.pixels().all(|p| p[3] == 0));
        assert!(renderer.overlay().unwrap().get_pixel(10, 10)[3] > 0);
        renderer.finish(&mut layer, 1.0);
        assert_eq!(layer.get_pixel(30, 10)[3], 255);
    }

    #[test]
    fn test_stroke_is_continuous() {
        let style = StrokeStyle::from_preset(BrushPreset::Ink, Color32::BLACK, None);
        let layer = paint(&[(10.0, 100.0), (60.0, 100.0), (110.0, 100.0), (160.0, 100.0)], style);
        for x in 10..=160 {
            assert!(layer.get_pixel(x, 100)[3] > 0, "gap at x={x}");
        }
    }

    #[test]
    fn test_pressure_squares_radius() {
        let style = StrokeStyle::from_preset(BrushPreset::Ink, Color32::BLACK, Some(10.0));
        let half = StrokeSample::new(egui::pos2(0.0, 0.0), Some(0.5), PointerKind::Pen);
        assert!((style.radius_for(&half) - 2.5).abs() < 1e-6);
        assert_eq!(style.radius_for(&StrokeSample::mouse(egui::pos2(0.0, 0.0))), 10.0);
    }

    #[test]
    fn test_preset_alpha_and_user_opacity_multiply() {
        let style = StrokeStyle::from_preset(BrushPreset::Marker, Color32::RED, None);
        let mut layer = blank_canvas();
        let mut renderer = StrokeRenderer::new(style, StrokeMode::Paint);
        renderer.push(StrokeSample::mouse(egui::pos2(100.0, 100.0)), &mut layer);
        renderer.finish(&mut layer, 0.5);
        let alpha = layer.get_pixel(100, 100)[3] as i32;
        assert!((alpha - 77).abs() <= 1, "alpha was {alpha}");
    }

    #[test]
    fn test_eraser_cuts_directly() {
        let mut layer = blank_canvas();
        for px in layer.pixels_mut() {
            *px = Rgba([0, 0, 0, 255]);
        }
        let mut renderer = StrokeRenderer::new(StrokeStyle::eraser(6.0), StrokeMode::Erase);
        renderer.push(StrokeSample::mouse(egui::pos2(200.0, 200.0)), &mut layer);
        assert_eq!(layer.get_pixel(200, 200)[3], 0);
        assert!(renderer.overlay().is_none());
        renderer.finish(&mut layer, 1.0);
        assert_eq!(layer.get_pixel(300, 300)[3], 255);
    }

    #[test]
    fn test_out_of_bounds_is_clamped() {
        let style = StrokeStyle::from_preset(BrushPreset::Ink, Color32::BLACK, None);
        let layer = paint(&[(-50.0, -50.0)], style);
        assert!(layer.get_pixel(0, 0)[3] > 0);
    }
}
