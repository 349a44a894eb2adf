pub mod keyframe;
pub mod ops;
pub mod playback;
pub mod track;

use serde::{Deserialize, Serialize};

use crate::document::Document;
pub use keyframe::Keyframe;
pub use playback::{PlayState, PlaybackClock, TickOutcome};
pub use track::{AnimaticElement, AudioClip, Dialogue, ReferenceClip, TrackItem};

pub const MIN_PIXELS_PER_SECOND: f32 = 10.0;
pub const MAX_PIXELS_PER_SECOND: f32 = 200.0;
pub const DEFAULT_PIXELS_PER_SECOND: f32 = 50.0;

/// The five lanes of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Frames,
    Dialogue,
    Audio,
    Reference,
    Animatic,
}

impl TrackKind {
    pub const ALL: [TrackKind; 5] = [
        TrackKind::Frames,
        TrackKind::Dialogue,
        TrackKind::Audio,
        TrackKind::Reference,
        TrackKind::Animatic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrackKind::Frames => "Frames",
            TrackKind::Dialogue => "Dialogue",
            TrackKind::Audio => "Audio",
            TrackKind::Reference => "Reference",
            TrackKind::Animatic => "Animatic",
        }
    }
}

/// A reference to one item on one lane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Frame(usize),
    Dialogue(String),
    Audio(String),
    Reference(String),
    Animatic(String),
}

impl ElementRef {
    pub fn kind(&self) -> TrackKind {
        match self {
            ElementRef::Frame(_) => TrackKind::Frames,
            ElementRef::Dialogue(_) => TrackKind::Dialogue,
            ElementRef::Audio(_) => TrackKind::Audio,
            ElementRef::Reference(_) => TrackKind::Reference,
            ElementRef::Animatic(_) => TrackKind::Animatic,
        }
    }
}

/// The four free-positioned lanes. Frames live in the [`Document`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tracks {
    #[serde(default)]
    pub dialogues: Vec<Dialogue>,
    #[serde(default, rename = "audioTracks", alias = "audio")]
    pub audio: Vec<AudioClip>,
    #[serde(default, rename = "referenceTracks", alias = "references")]
    pub references: Vec<ReferenceClip>,
    #[serde(default)]
    pub animatics: Vec<AnimaticElement>,
}

impl Tracks {
    pub fn visible_dialogues(&self, t: f64) -> impl Iterator<Item = &Dialogue> {
        self.dialogues.iter().filter(move |d| d.is_active_at(t))
    }

    pub fn visible_references(&self, t: f64) -> impl Iterator<Item = &ReferenceClip> {
        self.references.iter().filter(move |r| r.is_active_at(t))
    }

    pub fn visible_animatics(&self, t: f64) -> impl Iterator<Item = &AnimaticElement> {
        self.animatics.iter().filter(move |a| a.is_active_at(t))
    }

    /// Clips sounding at `t`, each with its position in the source audio.
    pub fn audible_clips(&self, t: f64) -> impl Iterator<Item = (&AudioClip, f64)> {
        self.audio
            .iter()
            .filter(move |c| c.is_active_at(t))
            .map(move |c| (c, c.source_position(t)))
    }

    /// Latest end time over the four lanes.
    pub fn max_end(&self) -> f64 {
        let ends = self
            .dialogues
            .iter()
            .map(TrackItem::end)
            .chain(self.audio.iter().map(TrackItem::end))
            .chain(self.references.iter().map(TrackItem::end))
            .chain(self.animatics.iter().map(TrackItem::end));
        ends.fold(0.0, f64::max)
    }

    pub fn contains(&self, element: &ElementRef) -> bool {
        match element {
            ElementRef::Frame(_) => false,
            ElementRef::Dialogue(id) => self.dialogues.iter().any(|i| &i.id == id),
            ElementRef::Audio(id) => self.audio.iter().any(|i| &i.id == id),
            ElementRef::Reference(id) => self.references.iter().any(|i| &i.id == id),
            ElementRef::Animatic(id) => self.animatics.iter().any(|i| &i.id == id),
        }
    }

    /// Start and duration of a lane item.
    pub fn timing(&self, element: &ElementRef) -> Option<(f64, f64)> {
        fn find<T: TrackItem>(items: &[T], id: &str) -> Option<(f64, f64)> {
            items.iter().find(|i| i.id() == id).map(|i| (i.start(), i.duration()))
        }
        match element {
            ElementRef::Frame(_) => None,
            ElementRef::Dialogue(id) => find(&self.dialogues, id),
            ElementRef::Audio(id) => find(&self.audio, id),
            ElementRef::Reference(id) => find(&self.references, id),
            ElementRef::Animatic(id) => find(&self.animatics, id),
        }
    }

    pub fn animatic_mut(&mut self, id: &str) -> Option<&mut AnimaticElement> {
        ops::find_mut(&mut self.animatics, id)
    }

    pub fn reference_mut(&mut self, id: &str) -> Option<&mut ReferenceClip> {
        ops::find_mut(&mut self.references, id)
    }
}

/// Total scene length: the latest end over all five lanes.
pub fn scene_duration(doc: &Document, tracks: &Tracks) -> f64 {
    doc.total_duration().max(tracks.max_end())
}

/// Horizontal mapping between time and timeline pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineView {
    pixels_per_second: f32,
}

impl Default for TimelineView {
    fn default() -> Self {
        Self::new(DEFAULT_PIXELS_PER_SECOND)
    }
}

impl TimelineView {
    pub fn new(pixels_per_second: f32) -> Self {
        Self {
            pixels_per_second: pixels_per_second.clamp(MIN_PIXELS_PER_SECOND, MAX_PIXELS_PER_SECOND),
        }
    }

    pub fn pixels_per_second(&self) -> f32 {
        self.pixels_per_second
    }

    pub fn set_pixels_per_second(&mut self, pps: f32) {
        self.pixels_per_second = pps.clamp(MIN_PIXELS_PER_SECOND, MAX_PIXELS_PER_SECOND);
    }

    /// Ruler drag: one pixel to the right zooms in by half a pixel per second.
    pub fn zoom_by_drag(&mut self, delta_px: f32) {
        self.set_pixels_per_second(self.pixels_per_second + delta_px * 0.5);
    }

    pub fn time_to_x(&self, t: f64) -> f32 {
        (t / 1000.0) as f32 * self.pixels_per_second
    }

    pub fn x_to_time(&self, x: f32) -> f64 {
        (x / self.pixels_per_second) as f64 * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_is_clamped() {
        let mut view = TimelineView::default();
        view.zoom_by_drag(10_000.0);
        assert_eq!(view.pixels_per_second(), MAX_PIXELS_PER_SECOND);
        view.zoom_by_drag(-10_000.0);
        assert_eq!(view.pixels_per_second(), MIN_PIXELS_PER_SECOND);
    }

    #[test]
    fn test_visibility_windows_are_half_open() {
        let tracks = Tracks {
            dialogues: vec![Dialogue::new("hello", 1000.0, 1000.0)],
            ..Default::default()
        };
        assert_eq!(tracks.visible_dialogues(999.0).count(), 0);
        assert_eq!(tracks.visible_dialogues(1000.0).count(), 1);
        assert_eq!(tracks.visible_dialogues(2000.0).count(), 0);
    }

    #[test]
    fn test_scene_duration_spans_all_lanes() {
        let doc = Document::new();
        let mut tracks = Tracks::default();
        assert_eq!(scene_duration(&doc, &tracks), 1000.0);
        tracks.audio.push(AudioClip::new("a", "u", 2000.0, 1500.0));
        assert_eq!(scene_duration(&doc, &tracks), 3500.0);
    }
}
