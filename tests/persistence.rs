use std::collections::VecDeque;
use std::sync::Arc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use serde_json::{Value, json};

use storyboard_studio::bitmap::encode_png;
use storyboard_studio::document::FrameInsert;
use storyboard_studio::error::{StoreError, StoreResult};
use storyboard_studio::scene::{ScenePayload, normalize_payload};
use storyboard_studio::settings::EditorSettings;
use storyboard_studio::state::{EditorContext, MemoryProjectStore, ProjectStore, SaveQueue};
use storyboard_studio::timeline::ElementRef;
use storyboard_studio::upload::{AssetKind, UploadedAsset};
use storyboard_studio::UploadError;

fn png_bytes(img: &RgbaImage) -> Value {
    serde_json::to_value(encode_png(img).unwrap()).unwrap()
}

fn editor_on(store: &MemoryProjectStore, key: &str) -> EditorContext {
    let mut editor = EditorContext::new(Arc::new(store.clone()), &EditorSettings::default());
    editor.open_scene(key);
    editor
}

#[test]
fn test_legacy_single_bitmap_frames_become_layers() {
    let mut img = RgbaImage::new(4, 4);
    img.put_pixel(1, 1, Rgba([9, 8, 7, 255]));
    let value = json!({
        "frames": [
            { "data": png_bytes(&img), "duration": 1200 },
            { "duration": 0 }
        ]
    });

    let payload = normalize_payload(value, "legacy").unwrap();

    assert_eq!(payload.frames.len(), 2);
    assert_eq!(payload.frames[0].duration, 1200.0);
    assert_eq!(payload.frames[1].duration, 1000.0);
    let first = &payload.frames[0].layers;
    let second = &payload.frames[1].layers;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].data.as_ref().unwrap().get_pixel(1, 1).0, [9, 8, 7, 255]);
    // Every frame shares the first frame's layer structure.
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert!(second[0].data.is_none());
}

#[test]
fn test_missing_tracks_and_lane_aliases() {
    let bare = normalize_payload(json!({ "frames": [{}] }), "s").unwrap();
    assert!(bare.tracks.dialogues.is_empty());
    assert!(bare.tracks.audio.is_empty());

    let value = json!({
        "audio": [{ "id": "a1", "name": "vo", "url": "file://vo.wav", "startTime": 0, "duration": 2000 }],
        "references": [{ "id": "r1", "name": "ref", "startTime": 500, "duration": 1000, "x": 0, "y": 0 }]
    });
    let payload = normalize_payload(value, "s").unwrap();

    assert_eq!(payload.frames.len(), 1);
    assert_eq!(payload.tracks.audio[0].id, "a1");
    assert_eq!(payload.tracks.audio[0].volume, 1.0);
    assert_eq!(payload.tracks.references[0].start_time, 500.0);
    assert_eq!(payload.tracks.references[0].scale_x, 1.0);
}

#[test]
fn test_canonical_payload_survives_json() {
    let store = MemoryProjectStore::new();
    let mut editor = editor_on(&store, "roundtrip");
    editor.add_frame(FrameInsert::After);
    editor.add_dialogue("hello");

    let payload = editor.payload();
    let value = payload.to_value().unwrap();
    assert!(value.get("audioTracks").is_some());
    assert!(value.get("referenceTracks").is_some());

    let back = normalize_payload(value, "roundtrip").unwrap();
    assert_eq!(back, payload);
}

#[test]
fn test_scene_switch_saves_and_reload_restores() {
    let store = MemoryProjectStore::new();
    let mut editor = editor_on(&store, "s1");
    let dialogue = editor.add_dialogue("first line");
    editor.add_frame(FrameInsert::After);

    editor.open_scene("s2");
    assert_eq!(editor.scene_key(), "s2");
    assert!(store.get_raw("s1").is_some());
    assert_eq!(editor.document().frame_count(), 1);
    assert!(editor.tracks().dialogues.is_empty());

    editor.open_scene("s1");
    assert!(!editor.is_loading());
    assert_eq!(editor.document().frame_count(), 2);
    assert_eq!(editor.tracks().dialogues[0].id, dialogue);
    assert!(!editor.can_undo());
}

#[test]
fn test_per_scene_map_is_read_by_key() {
    let store = MemoryProjectStore::new();
    store.insert_raw(
        "project",
        json!({
            "scenes": {
                "intro": { "frames": [{ "duration": 1500 }, { "duration": 2500 }] },
                "outro": { "frames": [] }
            }
        }),
    );

    let payload = normalize_payload(store.get_raw("project").unwrap(), "intro").unwrap();

    assert_eq!(payload.frames.len(), 2);
    assert_eq!(payload.frames[1].duration, 2500.0);
}

#[test]
fn test_debounced_save_after_quiet_period() {
    let store = MemoryProjectStore::new();
    let mut editor = editor_on(&store, "quiet");
    editor.tick(0.0);

    editor.add_dialogue("line");
    editor.tick(100.0);
    editor.tick(1000.0);
    assert!(store.get_raw("quiet").is_none());

    editor.tick(1700.0);
    let saved = normalize_payload(store.get_raw("quiet").unwrap(), "quiet").unwrap();
    assert_eq!(saved.tracks.dialogues.len(), 1);
}

#[test]
fn test_failed_save_is_retried() {
    let store = MemoryProjectStore::new();
    let mut editor = editor_on(&store, "flaky");
    store.set_offline(true);

    editor.add_dialogue("line");
    editor.tick(0.0);
    editor.tick(1600.0);
    assert!(store.get_raw("flaky").is_none());
    assert!(!editor.is_saving());

    store.set_offline(false);
    editor.tick(2000.0);
    assert!(store.get_raw("flaky").is_none());
    editor.tick(3200.0);
    assert!(store.get_raw("flaky").is_some());
}

#[test]
fn test_failed_load_starts_blank_without_saving() {
    let store = MemoryProjectStore::new();
    store.set_offline(true);
    let mut editor = editor_on(&store, "offline");
    store.set_offline(false);

    assert!(!editor.is_loading());
    assert_eq!(editor.document().frame_count(), 1);
    editor.tick(0.0);
    editor.tick(10_000.0);
    assert!(store.get_raw("offline").is_none());
}

#[test]
fn test_uploaded_audio_lands_at_playhead() {
    let store = MemoryProjectStore::new();
    let mut editor = editor_on(&store, "uploads");
    editor.scrub(500.0, 0.0);

    let (tx, rx) = oneshot::channel();
    let future = async move {
        match rx.await {
            Ok(()) => Ok(UploadedAsset {
                url: "file://vo.wav".to_string(),
                duration_ms: Some(2500.0),
                size: None,
            }),
            Err(_) => Err(UploadError::Cancelled),
        }
    };
    editor.begin_upload(AssetKind::Audio, "vo.wav", future.boxed());
    editor.tick(0.0);
    assert_eq!(editor.pending_uploads(), 1);

    tx.send(()).unwrap();
    editor.tick(16.0);

    assert_eq!(editor.pending_uploads(), 0);
    let clip = &editor.tracks().audio[0];
    assert_eq!(clip.start_time, 500.0);
    assert_eq!(clip.duration, 2500.0);
    assert_eq!(editor.active_element(), Some(&ElementRef::Audio(clip.id.clone())));
}

#[test]
fn test_failed_upload_raises_notice() {
    let store = MemoryProjectStore::new();
    let mut editor = editor_on(&store, "uploads");
    let future = async { Err::<UploadedAsset, _>(UploadError::Rejected("not an image".into())) };

    editor.begin_upload(AssetKind::Image, "notes.txt", future.boxed());
    editor.tick(0.0);

    assert!(editor.tracks().references.is_empty());
    assert_eq!(editor.notices().len(), 1);
    assert!(editor.notices()[0].message.contains("notes.txt"));
}

/// A store whose saves finish only when the test releases them.
#[derive(Default)]
struct GatedStore {
    gates: Mutex<VecDeque<oneshot::Sender<()>>>,
    started: Mutex<Vec<String>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl GatedStore {
    fn release_next(&self) {
        if let Some(gate) = self.gates.lock().pop_front() {
            let _ = gate.send(());
        }
    }
}

impl ProjectStore for GatedStore {
    fn load(&self, _key: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        futures::future::ready(Ok(None)).boxed()
    }

    fn save(&self, key: &str, _payload: ScenePayload) -> BoxFuture<'static, StoreResult<()>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(tx);
        self.started.lock().push(key.to_string());
        let written = self.written.clone();
        let key = key.to_string();
        async move {
            rx.await.map_err(|_| StoreError::Offline)?;
            written.lock().push(key);
            Ok::<(), StoreError>(())
        }
        .boxed()
    }
}

#[test]
fn test_saves_run_one_at_a_time_in_order() {
    let store = Arc::new(GatedStore::default());
    let mut queue = SaveQueue::new(store.clone());

    queue.enqueue("a", ScenePayload::default());
    queue.enqueue("b", ScenePayload::default());
    assert!(queue.poll().is_empty());
    assert_eq!(*store.started.lock(), vec!["a".to_string()]);
    assert_eq!(queue.pending(), 2);

    store.release_next();
    let done = queue.poll();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].key, "a");
    assert_eq!(*store.started.lock(), vec!["a".to_string(), "b".to_string()]);

    store.release_next();
    let done = queue.poll();
    assert_eq!(done[0].key, "b");
    assert!(!queue.is_saving());
    assert_eq!(*store.written.lock(), vec!["a".to_string(), "b".to_string()]);
}

/// A memory store whose load of one key waits until the test lets it finish.
struct SlowLoadStore {
    inner: MemoryProjectStore,
    slow_key: String,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    saved: Mutex<Vec<String>>,
}

impl ProjectStore for SlowLoadStore {
    fn load(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        if key != self.slow_key {
            return self.inner.load(key);
        }
        let Some(rx) = self.gate.lock().take() else {
            return self.inner.load(key);
        };
        let rest = self.inner.load(key);
        async move {
            rx.await.map_err(|_| StoreError::Offline)?;
            rest.await
        }
        .boxed()
    }

    fn save(&self, key: &str, payload: ScenePayload) -> BoxFuture<'static, StoreResult<()>> {
        self.saved.lock().push(key.to_string());
        self.inner.save(key, payload)
    }
}

#[test]
fn test_edits_during_pending_load_are_not_saved_under_new_key() {
    let (tx, rx) = oneshot::channel();
    let store = Arc::new(SlowLoadStore {
        inner: MemoryProjectStore::new(),
        slow_key: "b".to_string(),
        gate: Mutex::new(Some(rx)),
        saved: Mutex::new(Vec::new()),
    });
    let mut editor = EditorContext::new(store.clone(), &EditorSettings::default());
    editor.open_scene("a");
    editor.add_dialogue("scene a");

    editor.open_scene("b");
    assert!(editor.is_loading());
    assert_eq!(*store.saved.lock(), vec!["a".to_string()]);

    editor.add_dialogue("typed while loading");
    editor.tick(0.0);
    editor.tick(10_000.0);
    editor.flush();
    assert!(!store.saved.lock().iter().any(|k| k == "b"));
    assert!(store.inner.get_raw("b").is_none());

    let _ = tx.send(());
    editor.tick(20_000.0);
    assert!(!editor.is_loading());
    assert!(editor.tracks().dialogues.is_empty());
    editor.tick(30_000.0);
    assert!(store.inner.get_raw("b").is_none());
}

#[cfg(not(target_arch = "wasm32"))]
#[test]
fn test_file_store_roundtrip() {
    use storyboard_studio::state::JsonFileStore;

    let dir = std::env::temp_dir().join(format!("storyboard-test-{}", uuid::Uuid::new_v4()));
    let store = JsonFileStore::new(&dir);

    let mut payload = ScenePayload::default();
    payload.frames[0].duration = 1750.0;
    futures::executor::block_on(store.save("scene-a", payload.clone())).unwrap();
    let loaded = futures::executor::block_on(store.load("scene-a")).unwrap().unwrap();
    let missing = futures::executor::block_on(store.load("scene-b")).unwrap();

    assert_eq!(normalize_payload(loaded, "scene-a").unwrap(), payload);
    assert!(missing.is_none());
    let _ = std::fs::remove_dir_all(dir);
}
