//! Trim, split, duplicate, delete and drag over timeline lanes.
//!
//! Refusals are silent: each operation reports whether it took effect.

use crate::document::Document;
use crate::id_generator::generate_id;
use crate::timeline::track::{FRAME_MIN_DURATION, FRAME_SPLIT_MARGIN, TrackItem};

/// Clamps a trimmed duration to `floor`; an item already shorter than the floor
/// may keep its length but never shrinks further.
fn floor_clamp(new: f64, floor: f64, original: f64) -> f64 {
    new.max(floor.min(original))
}

/// Right-edge trim: changes the duration only.
pub fn trim_end<T: TrackItem>(item: &mut T, new_duration: f64) {
    let duration = floor_clamp(new_duration, T::MIN_DURATION, item.duration());
    item.set_duration(duration);
}

/// Left-edge trim: moves the start with the end fixed. Past the floor the start
/// stops instead of the duration shrinking.
pub fn trim_start<T: TrackItem>(item: &mut T, new_start: f64) {
    let end = item.end();
    let min_duration = T::MIN_DURATION.min(item.duration());
    let start = new_start.max(item.min_trim_start()).min(end - min_duration);
    let delta = start - item.start();
    if delta == 0.0 {
        return;
    }
    item.set_start(start);
    item.set_duration(end - start);
    item.on_trim_start(delta);
}

/// Horizontal drag: `start = origin + Δpx / pps × 1000`, never below zero.
pub fn drag_to(item: &mut impl TrackItem, origin_start: f64, delta_px: f32, pixels_per_second: f32) {
    let delta_ms = delta_px as f64 / pixels_per_second.max(f32::EPSILON) as f64 * 1000.0;
    item.set_start((origin_start + delta_ms).max(0.0));
}

/// Splits item `id` at absolute time `t`. The original keeps the head; a new item
/// starting at `t` is inserted right after it. Returns the new item's id.
pub fn split<T: TrackItem>(items: &mut Vec<T>, id: &str, t: f64) -> Option<String> {
    let index = items.iter().position(|i| i.id() == id)?;
    let local = t - items[index].start();
    let duration = items[index].duration();
    if !(local > T::SPLIT_MARGIN && local < duration - T::SPLIT_MARGIN) {
        log::debug!("split of {id} at {t} outside its margins");
        return None;
    }

    let mut head = items[index].clone();
    let mut tail = items[index].clone();
    head.set_duration(local);
    tail.set_id(generate_id());
    tail.set_start(t);
    tail.set_duration(duration - local);
    T::on_split(&mut head, &mut tail, local);

    let new_id = tail.id().to_string();
    items[index] = head;
    items.insert(index + 1, tail);
    Some(new_id)
}

/// Copies item `id` to start at its end, pushing every later item on the lane
/// back by the copied duration. Returns the copy's id.
pub fn duplicate<T: TrackItem>(items: &mut Vec<T>, id: &str) -> Option<String> {
    let index = items.iter().position(|i| i.id() == id)?;
    let original = &items[index];
    let (start, duration) = (original.start(), original.duration());

    let mut copy = original.clone();
    copy.set_id(generate_id());
    copy.set_start(start + duration);

    for item in items.iter_mut() {
        if item.start() > start {
            item.set_start(item.start() + duration);
        }
    }
    let new_id = copy.id().to_string();
    items.insert(index + 1, copy);
    Some(new_id)
}

pub fn delete<T: TrackItem>(items: &mut Vec<T>, id: &str) -> bool {
    let before = items.len();
    items.retain(|i| i.id() != id);
    items.len() != before
}

pub fn find_mut<'a, T: TrackItem>(items: &'a mut [T], id: &str) -> Option<&'a mut T> {
    items.iter_mut().find(|i| i.id() == id)
}

// --- Frames: contiguous, owned by the document ---

/// Right-edge trim of frame `index`.
pub fn trim_frame_end(doc: &mut Document, index: usize, new_duration: f64) -> bool {
    let Some(current) = doc.frame(index).map(|f| f.duration) else {
        return false;
    };
    let duration = floor_clamp(new_duration, FRAME_MIN_DURATION, current);
    doc.set_frame_duration(index, duration, 0.0);
    true
}

/// Left-edge trim of frame `index` to start at `new_start`. Frames have no gaps,
/// so this resizes the previous frame's right edge; the first frame cannot move.
pub fn trim_frame_start(doc: &mut Document, index: usize, new_start: f64) -> bool {
    if index == 0 || index >= doc.frame_count() {
        return false;
    }
    let prev_start = doc.frame_start(index - 1);
    trim_frame_end(doc, index - 1, new_start - prev_start)
}

/// Splits frame `index` at `local` ms into its duration. Both halves carry a full
/// copy of the bitmaps. Returns the index of the new second half.
pub fn split_frame(doc: &mut Document, index: usize, local: f64) -> Option<usize> {
    let frame = doc.frame(index)?;
    if !(local > FRAME_SPLIT_MARGIN && local < frame.duration - FRAME_SPLIT_MARGIN) {
        log::debug!("frame split at {local} outside its margins");
        return None;
    }
    let mut tail = frame.deep_copy();
    tail.duration = frame.duration - local;
    doc.set_frame_duration(index, local, 0.0);
    doc.insert_frame(index + 1, tail);
    Some(index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::track::{AudioClip, Dialogue};

    #[test]
    fn test_trim_end_floor() {
        let mut d = Dialogue::new("a", 0.0, 2000.0);
        trim_end(&mut d, 100.0);
        assert_eq!(d.duration, 500.0);
        trim_end(&mut d, 3000.0);
        assert_eq!(d.duration, 3000.0);
    }

    #[test]
    fn test_trim_start_clamps_start_not_duration() {
        let mut d = Dialogue::new("a", 1000.0, 2000.0);
        trim_start(&mut d, 2900.0);
        assert_eq!(d.start_time, 2500.0);
        assert_eq!(d.duration, 500.0);
        trim_start(&mut d, -400.0);
        assert_eq!(d.start_time, 0.0);
        assert_eq!(d.end(), 3000.0);
    }

    #[test]
    fn test_audio_trim_start_moves_offset() {
        let mut clip = AudioClip::new("a", "u", 1000.0, 4000.0);
        trim_start(&mut clip, 1500.0);
        assert_eq!(clip.offset, 500.0);
        assert_eq!(clip.duration, 3500.0);
        // Can't reveal audio before the source start.
        trim_start(&mut clip, 0.0);
        assert_eq!(clip.start_time, 1000.0);
        assert_eq!(clip.offset, 0.0);
    }

    #[test]
    fn test_split_margins() {
        let mut items = vec![Dialogue::new("a", 0.0, 2000.0)];
        let id = items[0].id.clone();
        assert!(split(&mut items, &id, 400.0).is_none());
        assert!(split(&mut items, &id, 1600.0).is_none());
        let new_id = split(&mut items, &id, 1200.0).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, new_id);
        assert_eq!(items[0].duration + items[1].duration, 2000.0);
        assert_eq!(items[1].start_time, 1200.0);
    }

    #[test]
    fn test_split_audio_advances_tail_offset() {
        let mut items = vec![AudioClip::new("a", "u", 500.0, 5000.0)];
        let id = items[0].id.clone();
        split(&mut items, &id, 2500.0).unwrap();
        assert_eq!(items[1].offset, 2000.0);
        assert_eq!(items[0].offset, 0.0);
    }

    #[test]
    fn test_drag_never_negative() {
        let mut d = Dialogue::new("a", 500.0, 1000.0);
        drag_to(&mut d, 500.0, 50.0, 100.0);
        assert_eq!(d.start_time, 1000.0);
        drag_to(&mut d, 500.0, -500.0, 100.0);
        assert_eq!(d.start_time, 0.0);
    }

    #[test]
    fn test_frame_left_edge_redirects_to_previous() {
        let mut doc = Document::new();
        doc.add_frame(crate::document::FrameInsert::After);
        assert!(!trim_frame_start(&mut doc, 0, 200.0));
        assert!(trim_frame_start(&mut doc, 1, 1500.0));
        assert_eq!(doc.frames()[0].duration, 1500.0);
        assert_eq!(doc.frames()[1].duration, 1000.0);
        trim_frame_start(&mut doc, 1, 10.0);
        assert_eq!(doc.frames()[0].duration, FRAME_MIN_DURATION);
    }
}
