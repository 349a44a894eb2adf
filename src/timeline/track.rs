//! Items living on the four free-positioned timeline lanes.
//!
//! Frames form the fifth lane but are contiguous and owned by the
//! [`Document`](crate::document::Document); their edits live in `ops`.

use egui::{Pos2, Vec2};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::bitmap;
use crate::id_generator::generate_id;
use crate::layer::Layer;
use crate::timeline::keyframe::{self, Keyframe};

/// Shortest duration of a frame.
pub const FRAME_MIN_DURATION: f64 = 1000.0;
/// Split points must leave at least this much of a frame on either side.
pub const FRAME_SPLIT_MARGIN: f64 = 100.0;

/// Common surface of a time-windowed track item.
pub trait TrackItem: Clone {
    /// Trims never push the duration below this.
    const MIN_DURATION: f64;
    /// Minimum distance between a split point and either end.
    const SPLIT_MARGIN: f64 = Self::MIN_DURATION;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn start(&self) -> f64;
    fn set_start(&mut self, start: f64);
    fn duration(&self) -> f64;
    fn set_duration(&mut self, duration: f64);

    fn end(&self) -> f64 {
        self.start() + self.duration()
    }

    /// Half-open visibility window `[start, end)`.
    fn is_active_at(&self, t: f64) -> bool {
        t >= self.start() && t < self.end()
    }

    /// Lowest start a left-edge trim may reach.
    fn min_trim_start(&self) -> f64 {
        0.0
    }

    /// Called after a left-edge trim moved the start by `delta` ms.
    fn on_trim_start(&mut self, _delta: f64) {}

    /// Fixes up both halves of a split at `local` ms. Both start out as copies of
    /// the original; timing and ids are already set.
    fn on_split(_head: &mut Self, _tail: &mut Self, _local: f64) {}
}

macro_rules! impl_timing {
    () => {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn start(&self) -> f64 {
            self.start_time
        }

        fn set_start(&mut self, start: f64) {
            self.start_time = start;
        }

        fn duration(&self) -> f64 {
            self.duration
        }

        fn set_duration(&mut self, duration: f64) {
            self.duration = duration;
        }
    };
}

/// A spoken line, captioned on the canvas while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialogue {
    pub id: String,
    pub text: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default = "default_caption_x")]
    pub x: f32,
    #[serde(default = "default_caption_y")]
    pub y: f32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_caption_x() -> f32 {
    bitmap::CANVAS_WIDTH as f32 * 0.5
}

fn default_caption_y() -> f32 {
    bitmap::CANVAS_HEIGHT as f32 - 80.0
}

fn default_font_size() -> f32 {
    28.0
}

impl Dialogue {
    pub fn new(text: &str, start_time: f64, duration: f64) -> Self {
        Self {
            id: generate_id(),
            text: text.to_string(),
            start_time,
            duration: duration.max(<Self as TrackItem>::MIN_DURATION),
            x: default_caption_x(),
            y: default_caption_y(),
            font_size: default_font_size(),
        }
    }
}

impl TrackItem for Dialogue {
    const MIN_DURATION: f64 = 500.0;

    impl_timing!();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    pub id: String,
    pub name: String,
    pub url: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Trim-in point into the source audio, ms
    #[serde(default)]
    pub offset: f64,
}

impl AudioClip {
    pub fn new(name: &str, url: &str, start_time: f64, duration: f64) -> Self {
        Self {
            id: generate_id(),
            name: name.to_string(),
            url: url.to_string(),
            start_time,
            duration: duration.max(<Self as TrackItem>::MIN_DURATION),
            volume: 1.0,
            offset: 0.0,
        }
    }

    /// Position in the source audio at timeline time `t`.
    pub fn source_position(&self, t: f64) -> f64 {
        self.offset + (t - self.start_time)
    }
}

impl TrackItem for AudioClip {
    const MIN_DURATION: f64 = 1000.0;

    impl_timing!();

    fn min_trim_start(&self) -> f64 {
        (self.start_time - self.offset).max(0.0)
    }

    fn on_trim_start(&mut self, delta: f64) {
        self.offset = (self.offset + delta).max(0.0);
    }

    fn on_split(_head: &mut Self, tail: &mut Self, local: f64) {
        tail.offset += local;
    }
}

/// Default unscaled size of a reference image, when its natural size is unknown.
pub const DEFAULT_REFERENCE_SIZE: [f32; 2] = [640.0, 360.0];

fn default_volume() -> f32 {
    1.0
}

fn default_scale() -> f32 {
    1.0
}

fn default_opacity() -> f32 {
    1.0
}

fn default_base_size() -> [f32; 2] {
    DEFAULT_REFERENCE_SIZE
}

/// An overlay image placed by an affine transform while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceClip {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub start_time: f64,
    pub duration: f64,
    /// Unrotated top-left corner
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_scale")]
    pub scale_x: f32,
    #[serde(default = "default_scale")]
    pub scale_y: f32,
    /// Radians, about the centre
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Unscaled size the scale factors apply to
    #[serde(default = "default_base_size")]
    pub base_size: [f32; 2],
}

impl ReferenceClip {
    pub fn new(name: &str, image: Option<String>, start_time: f64, duration: f64, base_size: Option<[f32; 2]>) -> Self {
        let base_size = base_size.unwrap_or(DEFAULT_REFERENCE_SIZE);
        Self {
            id: generate_id(),
            name: name.to_string(),
            image,
            start_time,
            duration: duration.max(<Self as TrackItem>::MIN_DURATION),
            x: (bitmap::CANVAS_WIDTH as f32 - base_size[0]) * 0.5,
            y: (bitmap::CANVAS_HEIGHT as f32 - base_size[1]) * 0.5,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            opacity: 1.0,
            base_size,
        }
    }

    pub fn box_transform(&self) -> crate::gizmo::BoxTransform {
        crate::gizmo::BoxTransform {
            x: self.x,
            y: self.y,
            w: self.base_size[0] * self.scale_x,
            h: self.base_size[1] * self.scale_y,
            rotation: self.rotation,
        }
    }

    /// Writes a gizmo result back into the clip's own affine fields.
    pub fn apply_box_transform(&mut self, b: &crate::gizmo::BoxTransform) {
        self.x = b.x;
        self.y = b.y;
        self.scale_x = b.w / self.base_size[0].max(1.0);
        self.scale_y = b.h / self.base_size[1].max(1.0);
        self.rotation = b.rotation;
    }
}

impl TrackItem for ReferenceClip {
    const MIN_DURATION: f64 = 500.0;

    impl_timing!();
}

/// A small raster sprite moved along keyframed positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimaticElement {
    pub id: String,
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// Sorted by time, relative to `start_time`; never empty
    #[serde(default)]
    pub keyframes: Vec<Keyframe>,
}

impl AnimaticElement {
    /// A sprite made of one bitmap, resting at `position` from its first keyframe.
    pub fn from_bitmap(name: &str, sprite: RgbaImage, start_time: f64, duration: f64, position: Pos2) -> Self {
        let mut layer = Layer::new("Sprite");
        layer.data = Some(sprite);
        Self {
            id: generate_id(),
            name: name.to_string(),
            start_time,
            duration: duration.max(<Self as TrackItem>::MIN_DURATION),
            layers: vec![layer],
            keyframes: vec![Keyframe::new(0.0, position)],
        }
    }

    /// Visible layers flattened into one sprite bitmap.
    pub fn sprite(&self) -> Option<RgbaImage> {
        let (w, h) = self
            .layers
            .iter()
            .filter_map(|l| l.data.as_ref().map(|d| d.dimensions()))
            .fold((0, 0), |(w, h), (lw, lh)| (w.max(lw), h.max(lh)));
        if w == 0 || h == 0 {
            return None;
        }
        let mut out = RgbaImage::new(w, h);
        for data in self.layers.iter().filter(|l| l.visible).filter_map(|l| l.data.as_ref()) {
            bitmap::composite_at(&mut out, data, 0, 0, 1.0);
        }
        Some(out)
    }

    /// Fingerprint of the sprite content, for caching its texture.
    pub fn sprite_revision(&self) -> u64 {
        use std::hash::{Hash, Hasher};

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for layer in &self.layers {
            layer.id.hash(&mut hasher);
            layer.visible.hash(&mut hasher);
            if let Some(data) = &layer.data {
                data.dimensions().hash(&mut hasher);
                data.as_raw().hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    pub fn sprite_size(&self) -> Vec2 {
        self.layers
            .iter()
            .filter_map(|l| l.data.as_ref())
            .fold(Vec2::ZERO, |acc, d| acc.max(egui::vec2(d.width() as f32, d.height() as f32)))
    }
}

impl TrackItem for AnimaticElement {
    const MIN_DURATION: f64 = 300.0;

    impl_timing!();

    fn on_trim_start(&mut self, delta: f64) {
        // Keep the motion pinned to absolute time.
        keyframe::shift(&mut self.keyframes, -delta);
    }

    fn on_split(head: &mut Self, tail: &mut Self, local: f64) {
        let (before, after) = keyframe::split_at(&head.keyframes, local);
        head.keyframes = before;
        tail.keyframes = after;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_box_roundtrip_through_scale() {
        let mut clip = ReferenceClip::new("ref", None, 0.0, 1000.0, Some([200.0, 100.0]));
        let mut b = clip.box_transform();
        assert_eq!((b.w, b.h), (200.0, 100.0));
        b.w = 400.0;
        b.rotation = 0.5;
        clip.apply_box_transform(&b);
        assert_eq!(clip.scale_x, 2.0);
        assert_eq!(clip.scale_y, 1.0);
        assert_eq!(clip.rotation, 0.5);
    }

    #[test]
    fn test_audio_source_position_follows_offset() {
        let mut clip = AudioClip::new("vo", "https://cdn/vo.mp3", 2000.0, 3000.0);
        clip.offset = 500.0;
        assert_eq!(clip.source_position(2500.0), 1000.0);
    }

    #[test]
    fn test_minimum_durations_on_construction() {
        assert_eq!(Dialogue::new("hi", 0.0, 10.0).duration, 500.0);
        assert_eq!(AudioClip::new("a", "u", 0.0, 10.0).duration, 1000.0);
    }

    #[test]
    fn test_sprite_revision_follows_pixels() {
        let mut element = AnimaticElement::from_bitmap("ball", RgbaImage::new(4, 4), 0.0, 1000.0, Pos2::ZERO);
        let before = element.sprite_revision();
        assert_eq!(element.clone().sprite_revision(), before);

        element.layers[0].bitmap_mut().put_pixel(1, 1, image::Rgba([255, 0, 0, 255]));

        assert_ne!(element.sprite_revision(), before);
    }
}
