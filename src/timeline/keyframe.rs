//! Linear keyframe interpolation for animatic sprites.
//!
//! Keyframe times are relative to the owning element's start.

use egui::Pos2;
use serde::{Deserialize, Serialize};

use crate::id_generator::generate_id;
use crate::timeline::track::{AnimaticElement, TrackItem};

/// Setting a keyframe this close to an existing one overwrites it.
pub const SNAP_MS: f64 = 10.0;
/// Setting a keyframe grows the element to at least this far past the key.
pub const EXPAND_PAD_MS: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyframe {
    pub id: String,
    pub time_ms: f64,
    pub value: Pos2,
}

impl Keyframe {
    pub fn new(time_ms: f64, value: Pos2) -> Self {
        Self {
            id: generate_id(),
            time_ms,
            value,
        }
    }
}

/// Position at local time `t`. Clamps to the first and last keys, never extrapolates.
pub fn interpolate(keyframes: &[Keyframe], t: f64) -> Option<Pos2> {
    let first = keyframes.first()?;
    if t <= first.time_ms {
        return Some(first.value);
    }
    // First key at or after `t`; of two keys sharing a time, the earlier one wins.
    let Some(next) = keyframes.iter().position(|k| k.time_ms >= t) else {
        return keyframes.last().map(|k| k.value);
    };
    let b = &keyframes[next];
    if b.time_ms == t {
        return Some(b.value);
    }
    let a = &keyframes[next - 1];
    let span = b.time_ms - a.time_ms;
    let weight = if span > 0.0 { ((t - a.time_ms) / span) as f32 } else { 0.0 };
    Some(a.value + (b.value - a.value) * weight)
}

pub fn sort(keyframes: &mut [Keyframe]) {
    keyframes.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
}

pub fn shift(keyframes: &mut [Keyframe], delta: f64) {
    for k in keyframes {
        k.time_ms += delta;
    }
}

/// Cuts a keyframe list at local time `at`. Both halves get a key exactly at the
/// cut carrying the interpolated position, and the second half is rebased to 0.
pub fn split_at(keyframes: &[Keyframe], at: f64) -> (Vec<Keyframe>, Vec<Keyframe>) {
    let Some(value) = interpolate(keyframes, at) else {
        return (Vec::new(), Vec::new());
    };

    let mut head: Vec<Keyframe> = keyframes.iter().filter(|k| k.time_ms < at - SNAP_MS).cloned().collect();
    head.push(Keyframe::new(at, value));

    let mut tail = vec![Keyframe::new(0.0, value)];
    tail.extend(
        keyframes
            .iter()
            .filter(|k| k.time_ms > at + SNAP_MS)
            .map(|k| Keyframe::new(k.time_ms - at, k.value)),
    );
    (head, tail)
}

impl AnimaticElement {
    /// Sprite position at absolute timeline time `t`.
    pub fn position_at(&self, t: f64) -> Pos2 {
        interpolate(&self.keyframes, t - self.start_time).unwrap_or(Pos2::ZERO)
    }

    /// Overwrites the key within the snap window of `local`, or inserts a new one.
    /// Returns the id of the key that now holds `value`.
    pub fn set_keyframe(&mut self, local: f64, value: Pos2) -> String {
        let local = local.max(0.0);
        let id = match self.keyframes.iter_mut().find(|k| (k.time_ms - local).abs() <= SNAP_MS) {
            Some(existing) => {
                existing.value = value;
                existing.id.clone()
            }
            None => {
                let key = Keyframe::new(local, value);
                let id = key.id.clone();
                self.keyframes.push(key);
                id
            }
        };
        sort(&mut self.keyframes);
        let needed = (local + EXPAND_PAD_MS).max(Self::MIN_DURATION);
        if self.duration < needed {
            self.duration = needed;
        }
        id
    }

    /// Keys the current interpolated position at `local`.
    pub fn capture_keyframe(&mut self, local: f64) -> String {
        let value = interpolate(&self.keyframes, local).unwrap_or(Pos2::ZERO);
        self.set_keyframe(local, value)
    }

    /// Refuses to remove the last remaining key.
    pub fn delete_keyframe(&mut self, id: &str) -> bool {
        if self.keyframes.len() <= 1 {
            return false;
        }
        let before = self.keyframes.len();
        self.keyframes.retain(|k| k.id != id);
        self.keyframes.len() != before
    }
}
