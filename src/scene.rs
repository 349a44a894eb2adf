//! The scene payload and the load-time adapter that turns any stored shape of it
//! into the canonical one.

use egui::Pos2;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bitmap::EncodedBitmap;
use crate::document::{DEFAULT_FRAME_DURATION, Document, Frame};
use crate::error::SceneError;
use crate::id_generator::generate_id;
use crate::layer::{self, Layer};
use crate::timeline::keyframe::{self, Keyframe};
use crate::timeline::{TrackItem, Tracks};

/// Everything persisted for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePayload {
    pub frames: Vec<Frame>,
    #[serde(flatten)]
    pub tracks: Tracks,
}

impl Default for ScenePayload {
    fn default() -> Self {
        Self {
            frames: vec![Frame::blank()],
            tracks: Tracks::default(),
        }
    }
}

impl ScenePayload {
    pub fn from_parts(doc: &Document, tracks: &Tracks) -> Self {
        Self {
            frames: doc.frames().to_vec(),
            tracks: tracks.clone(),
        }
    }

    pub fn into_parts(self) -> (Document, Tracks) {
        (Document::from_frames(self.frames), self.tracks)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// A frame as it may have been stored: either a layer list or a single bitmap.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFrame {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    layers: Option<Vec<Layer>>,
    #[serde(default)]
    data: Option<EncodedBitmap>,
    #[serde(default)]
    image: Option<EncodedBitmap>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    action: Option<String>,
}

impl StoredFrame {
    fn into_frame(self, index: usize) -> Result<Frame, SceneError> {
        let legacy_bitmap = self
            .data
            .or(self.image)
            .map(|encoded| encoded.decode())
            .transpose()
            .map_err(|source| SceneError::Bitmap {
                location: format!("frame {index}"),
                source,
            })?;
        Ok(Frame {
            id: self.id.unwrap_or_else(generate_id),
            layers: layer::normalize_layers(self.layers, legacy_bitmap),
            duration: self
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .unwrap_or(DEFAULT_FRAME_DURATION),
            action: self.action,
        })
    }
}

/// Normalises a stored value for `scene_key` into the canonical payload.
///
/// Accepts the canonical payload, a per-scene map `{"scenes": {key: payload}}`
/// and legacy flat payloads whose frames carry one bitmap instead of layers.
/// `null` or a missing scene yields a fresh one-frame scene.
pub fn normalize_payload(value: Value, scene_key: &str) -> Result<ScenePayload, SceneError> {
    let value = match value {
        Value::Null => return Ok(ScenePayload::default()),
        Value::Object(mut map) => match map.remove("scenes") {
            Some(Value::Object(mut scenes)) => {
                log::info!("Loading scene {scene_key:?} from a per-scene map");
                match scenes.remove(scene_key) {
                    Some(Value::Object(scene)) => scene,
                    Some(Value::Null) | None => return Ok(ScenePayload::default()),
                    Some(_) => return Err(SceneError::NotAnObject),
                }
            }
            _ => map,
        },
        _ => return Err(SceneError::NotAnObject),
    };

    let stored_frames: Vec<StoredFrame> = match value.get("frames") {
        Some(frames) if !frames.is_null() => {
            Vec::<StoredFrame>::deserialize(frames).map_err(|source| SceneError::Malformed {
                field: "frames",
                source,
            })?
        }
        _ => Vec::new(),
    };
    let mut tracks = Tracks::deserialize(&Value::Object(value)).map_err(|source| SceneError::Malformed {
        field: "tracks",
        source,
    })?;

    let mut frames = stored_frames
        .into_iter()
        .enumerate()
        .map(|(i, stored)| stored.into_frame(i))
        .collect::<Result<Vec<Frame>, _>>()?;
    if frames.is_empty() {
        frames.push(Frame::blank());
    }
    let template = frames[0].layers.clone();
    for frame in frames.iter_mut().skip(1) {
        frame.layers = layer::align_to(&template, std::mem::take(&mut frame.layers));
    }

    sanitize_tracks(&mut tracks);
    Ok(ScenePayload { frames, tracks })
}

fn sanitize_items<T: TrackItem>(items: &mut [T]) {
    for item in items {
        if !(item.start().is_finite() && item.start() >= 0.0) {
            item.set_start(0.0);
        }
        if !(item.duration().is_finite() && item.duration() > 0.0) {
            item.set_duration(T::MIN_DURATION);
        }
    }
}

fn sanitize_tracks(tracks: &mut Tracks) {
    sanitize_items(&mut tracks.dialogues);
    sanitize_items(&mut tracks.audio);
    sanitize_items(&mut tracks.references);
    sanitize_items(&mut tracks.animatics);

    for clip in &mut tracks.audio {
        clip.offset = clip.offset.max(0.0);
    }
    for element in &mut tracks.animatics {
        keyframe::sort(&mut element.keyframes);
        if element.keyframes.is_empty() {
            element.keyframes.push(Keyframe::new(0.0, Pos2::ZERO));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_a_fresh_scene() {
        let payload = normalize_payload(Value::Null, "s1").unwrap();
        assert_eq!(payload.frames.len(), 1);
        assert!(payload.tracks.dialogues.is_empty());
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(matches!(normalize_payload(json!([1, 2]), "s1"), Err(SceneError::NotAnObject)));
    }

    #[test]
    fn test_per_scene_map_picks_key() {
        let value = json!({
            "scenes": {
                "a": { "frames": [{ "duration": 1500 }] },
                "b": { "frames": [{ "duration": 700 }, { "duration": 800 }] }
            }
        });
        let payload = normalize_payload(value.clone(), "b").unwrap();
        assert_eq!(payload.frames.len(), 2);
        assert_eq!(payload.frames[0].duration, 700.0);
        let missing = normalize_payload(value, "zzz").unwrap();
        assert_eq!(missing.frames.len(), 1);
    }

    #[test]
    fn test_negative_starts_and_empty_keyframes_are_fixed() {
        let value = json!({
            "frames": [],
            "dialogues": [{ "id": "d", "text": "hi", "startTime": -300, "duration": 800 }],
            "animatics": [{ "id": "an", "name": "ball", "startTime": 0, "duration": 1000,
                            "layers": [], "keyframes": [] }]
        });
        let payload = normalize_payload(value, "s").unwrap();
        assert_eq!(payload.frames.len(), 1);
        assert_eq!(payload.tracks.dialogues[0].start_time, 0.0);
        assert_eq!(payload.tracks.animatics[0].keyframes.len(), 1);
    }

    #[test]
    fn test_legacy_data_url_frame_is_read() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([5, 6, 7, 255]));
        let url = serde_json::to_value(EncodedBitmap::encode(&img).unwrap()).unwrap();
        let payload = normalize_payload(json!({ "frames": [{ "image": url }] }), "s").unwrap();
        let data = payload.frames[0].layers[0].data.as_ref().unwrap();
        assert_eq!(data.get_pixel(1, 1).0, [5, 6, 7, 255]);
    }

    #[test]
    fn test_undecodable_legacy_bitmap_is_reported() {
        let value = json!({ "frames": [{ "duration": 500 }, { "data": "data:image/png;base64,bm90IGEgcG5n" }] });
        match normalize_payload(value, "s") {
            Err(SceneError::Bitmap { location, .. }) => assert_eq!(location, "frame 1"),
            other => panic!("expected a bitmap error, got {other:?}"),
        }
    }
}
