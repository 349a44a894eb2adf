//! The editor facade the UI talks to.
//!
//! `EditorContext` owns one open scene (frame store plus timeline lanes), the
//! playback clock, the undo history, the active tool and the single active
//! gesture. Pointer input arrives already mapped to logical canvas coordinates;
//! wall-clock time is passed in explicitly so the whole editor is deterministic
//! under test.

use std::sync::Arc;
use std::task::Poll;

use egui::Pos2;
use futures::future::BoxFuture;
use serde_json::Value;

use super::editor_state::{Gesture, TimelineDrag, TimelineDragKind, TransformTarget};
use super::persistence::{ProjectStore, SaveDebounce, SaveQueue, poll_once};
use crate::bitmap::{self, clamp_to_canvas};
use crate::document::{Document, Frame, FrameInsert};
use crate::error::StoreResult;
use crate::fill;
use crate::gizmo::{BoxTransform, DragKind, TransformDrag};
use crate::history::UndoHistory;
use crate::input::Shortcut;
use crate::layer::LayerId;
use crate::scene::{ScenePayload, normalize_payload};
use crate::selection::{FloatingSelection, Selection, SelectionMode};
use crate::settings::EditorSettings;
use crate::stroke::{StrokeMode, StrokeRenderer, StrokeSample};
use crate::timeline::{
    self, AnimaticElement, AudioClip, Dialogue, ElementRef, PlaybackClock, ReferenceClip, TickOutcome,
    TimelineView, TrackItem, Tracks, ops,
};
use crate::tool::{ToolKind, ToolSettings};
use crate::upload::{AssetKind, Notice, UploadFuture, UploadQueue};

/// Length given to new dialogue lines, reference images and sprites.
pub const DEFAULT_ITEM_DURATION: f64 = 2000.0;

pub struct EditorContext {
    document: Document,
    tracks: Tracks,
    clock: PlaybackClock,
    pub view: TimelineView,
    history: UndoHistory,
    tool: ToolKind,
    pub tool_settings: ToolSettings,
    gesture: Gesture,
    selection: Option<Selection>,
    floating: Option<FloatingSelection>,
    active_element: Option<ElementRef>,
    /// (animatic id, keyframe id)
    selected_keyframe: Option<(String, String)>,
    notices: Vec<Notice>,
    scene_key: String,
    saves: SaveQueue,
    debounce: SaveDebounce,
    tracks_dirty: bool,
    uploads: UploadQueue,
    pending_load: Option<(String, BoxFuture<'static, StoreResult<Option<Value>>>)>,
    /// Whether `scene_key` has been loaded from the store
    loaded: bool,
    /// Frames as they were when a frame trim drag began
    trim_before: Option<Vec<Frame>>,
}

impl std::fmt::Debug for EditorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorContext")
            .field("scene_key", &self.scene_key)
            .field("tool", &self.tool)
            .field("gesture", &self.gesture.name())
            .field("frames", &self.document.frame_count())
            .field("time", &self.clock.current_time())
            .finish_non_exhaustive()
    }
}

impl EditorContext {
    /// A context holding a fresh one-frame scene. Call [`Self::open_scene`] to load.
    pub fn new(store: Arc<dyn ProjectStore>, settings: &EditorSettings) -> Self {
        Self {
            document: Document::new(),
            tracks: Tracks::default(),
            clock: PlaybackClock::new(),
            view: TimelineView::new(settings.timeline_zoom),
            history: UndoHistory::new(settings.undo_depth),
            tool: ToolKind::default(),
            tool_settings: settings.tools.clone(),
            gesture: Gesture::Idle,
            selection: None,
            floating: None,
            active_element: None,
            selected_keyframe: None,
            notices: Vec::new(),
            scene_key: settings.scene_key.clone(),
            saves: SaveQueue::new(store),
            debounce: SaveDebounce::new(settings.save_debounce_ms),
            tracks_dirty: false,
            uploads: UploadQueue::default(),
            pending_load: None,
            loaded: false,
            trim_before: None,
        }
    }

    // --- Accessors ---

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tracks(&self) -> &Tracks {
        &self.tracks
    }

    /// Mutable lane access for direct edits (caption text, volume, opacity).
    pub fn tracks_mut(&mut self) -> &mut Tracks {
        self.tracks_dirty = true;
        &mut self.tracks
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    pub fn scene_duration(&self) -> f64 {
        timeline::scene_duration(&self.document, &self.tracks)
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn floating(&self) -> Option<&FloatingSelection> {
        self.floating.as_ref()
    }

    pub fn active_element(&self) -> Option<&ElementRef> {
        self.active_element.as_ref()
    }

    pub fn set_active_element(&mut self, element: Option<ElementRef>) {
        self.active_element = element;
    }

    pub fn selected_keyframe(&self) -> Option<(&str, &str)> {
        self.selected_keyframe
            .as_ref()
            .map(|(a, k)| (a.as_str(), k.as_str()))
    }

    pub fn select_keyframe(&mut self, animatic_id: &str, keyframe_id: &str) {
        self.selected_keyframe = Some((animatic_id.to_string(), keyframe_id.to_string()));
        self.active_element = Some(ElementRef::Animatic(animatic_id.to_string()));
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn dismiss_notice(&mut self, index: usize) {
        if index < self.notices.len() {
            self.notices.remove(index);
        }
    }

    pub fn scene_key(&self) -> &str {
        &self.scene_key
    }

    pub fn is_saving(&self) -> bool {
        self.saves.is_saving()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    /// Edits are waiting out the debounce window.
    pub fn has_unsaved_changes(&self) -> bool {
        self.debounce.is_armed()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.len()
    }

    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    // --- Tools ---

    /// Switches tools. A gesture in progress is finished as if released, and
    /// leaving the Transform tool commits the floating selection.
    pub fn set_tool(&mut self, tool: ToolKind) {
        if tool == self.tool {
            return;
        }
        if !self.gesture.is_idle() {
            log::info!("Tool switch to {:?} mid-{}; committing", tool, self.gesture.name());
            self.finish_gesture();
        }
        if self.tool == ToolKind::Transform {
            self.commit_floating();
        }
        log::info!("Tool: {:?} -> {:?}", self.tool, tool);
        self.tool = tool;

        match tool {
            ToolKind::Transform => self.lift_selection(),
            ToolKind::Brush | ToolKind::Eraser | ToolKind::Bucket => self.selection = None,
            _ => {}
        }
    }

    // --- Canvas pointer input ---

    /// Press on the canvas. Ignored while another gesture is active.
    pub fn pointer_down(&mut self, sample: StrokeSample) {
        if !self.gesture.is_idle() {
            return;
        }
        let pos = clamp_to_canvas(sample.pos);
        match self.tool {
            ToolKind::Brush => self.begin_stroke(sample, StrokeMode::Paint),
            ToolKind::Eraser => self.begin_stroke(sample, StrokeMode::Erase),
            ToolKind::Bucket => {
                self.bucket_fill(pos);
            }
            ToolKind::RectSelect | ToolKind::Lasso => {
                if let Some(mode) = self.tool.selection_mode() {
                    self.selection = None;
                    self.gesture = Gesture::Selecting {
                        mode,
                        start: pos,
                        current: pos,
                        points: vec![pos],
                    };
                }
            }
            ToolKind::MagicWand => self.magic_select(pos),
            ToolKind::Transform => self.begin_transform(sample.pos),
        }
    }

    pub fn pointer_move(&mut self, sample: StrokeSample) {
        let pos = clamp_to_canvas(sample.pos);
        match &mut self.gesture {
            Gesture::Stroking { renderer, frame, layer } => {
                let erase = renderer.mode() == StrokeMode::Erase;
                let Some(target) = self
                    .document
                    .frame_mut(*frame)
                    .and_then(|f| f.layer_mut(layer))
                else {
                    return;
                };
                renderer.push(sample, target.bitmap_mut());
                if erase {
                    self.document.touch();
                }
            }
            Gesture::Selecting { current, points, .. } => {
                *current = pos;
                points.push(pos);
            }
            Gesture::Transforming { drag, target } => {
                let moved = drag.apply(sample.pos);
                match target {
                    TransformTarget::Floating => {
                        if let Some(floating) = self.floating.as_mut() {
                            floating.transform = moved;
                        }
                    }
                    TransformTarget::Reference(id) => {
                        if let Some(clip) = self.tracks.reference_mut(id) {
                            clip.apply_box_transform(&moved);
                            self.tracks_dirty = true;
                        }
                    }
                    TransformTarget::Animatic(id) => {
                        let t = self.clock.current_time();
                        if let Some(element) = self.tracks.animatic_mut(id) {
                            let key = element.set_keyframe(t - element.start_time, egui::pos2(moved.x, moved.y));
                            self.selected_keyframe = Some((id.clone(), key));
                            self.tracks_dirty = true;
                        }
                    }
                }
            }
            Gesture::Idle | Gesture::TimelineDrag(_) => {}
        }
    }

    pub fn pointer_up(&mut self) {
        if !self.gesture.is_timeline_drag() {
            self.finish_gesture();
        }
    }

    /// Leaving the canvas ends a canvas gesture exactly like a release.
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    fn begin_stroke(&mut self, sample: StrokeSample, mode: StrokeMode) {
        let frame = self.document.active_frame_index();
        let Some(layer) = self.document.active_layer().filter(|l| l.visible).map(|l| l.id.clone()) else {
            log::debug!("Stroke ignored: active layer hidden or missing");
            return;
        };
        let style = match mode {
            StrokeMode::Paint => self.tool_settings.brush_style(),
            StrokeMode::Erase => self.tool_settings.eraser_style(),
        };
        self.history.push_snapshot(self.document.frames());
        let mut renderer = StrokeRenderer::new(style, mode);
        if let Some(target) = self.document.frame_mut(frame).and_then(|f| f.layer_mut(&layer)) {
            renderer.push(sample, target.bitmap_mut());
        }
        if mode == StrokeMode::Erase {
            self.document.touch();
        }
        self.transition(Gesture::Stroking { renderer, frame, layer });
    }

    fn bucket_fill(&mut self, pos: Pos2) -> bool {
        let color = bitmap::color_to_rgba(self.tool_settings.color);
        let Some(layer) = self.document.active_layer().filter(|l| l.visible) else {
            return false;
        };
        let seed = layer
            .data
            .as_ref()
            .and_then(|d| d.get_pixel_checked(pos.x as u32, pos.y as u32).copied())
            .unwrap_or(bitmap::TRANSPARENT);
        if seed == color {
            return false;
        }
        self.history.push_snapshot(self.document.frames());
        let filled = self
            .document
            .active_layer_mut()
            .is_some_and(|l| fill::bucket_fill(l.bitmap_mut(), pos, self.tool_settings.color));
        if filled {
            self.document.touch();
        }
        filled
    }

    fn magic_select(&mut self, pos: Pos2) {
        let Some(layer) = self.document.active_layer() else {
            return;
        };
        let tolerance = self.tool_settings.tolerance;
        self.selection = match &layer.data {
            Some(data) => Selection::magic(data, pos, tolerance, layer.id.clone()),
            None => Selection::magic(&bitmap::blank_canvas(), pos, tolerance, layer.id.clone()),
        };
    }

    fn begin_transform(&mut self, pos: Pos2) {
        if self.floating.is_none() {
            self.lift_selection();
        }
        if let Some(floating) = &self.floating {
            let drag = TransformDrag::begin(floating.transform, pos);
            self.transition(Gesture::Transforming { drag, target: TransformTarget::Floating });
            return;
        }

        let t = self.clock.current_time();
        match self.active_element.clone() {
            Some(ElementRef::Reference(id)) => {
                let Some(clip) = self.tracks.references.iter().find(|r| r.id == id && r.is_active_at(t)) else {
                    return;
                };
                let drag = TransformDrag::begin(clip.box_transform(), pos);
                self.transition(Gesture::Transforming { drag, target: TransformTarget::Reference(id) });
            }
            Some(ElementRef::Animatic(id)) => {
                let Some(element) = self.tracks.animatics.iter().find(|a| a.id == id && a.is_active_at(t)) else {
                    return;
                };
                let at = element.position_at(t);
                let size = element.sprite_size();
                let drag = TransformDrag {
                    kind: DragKind::Move,
                    origin: pos,
                    start: BoxTransform::new(at.x, at.y, size.x, size.y),
                };
                self.transition(Gesture::Transforming { drag, target: TransformTarget::Animatic(id) });
            }
            _ => {}
        }
    }

    fn transition(&mut self, next: Gesture) {
        if self.gesture.can_transition_to(&next) {
            self.gesture = next;
        } else {
            log::debug!("Ignored gesture {} while {}", next.name(), self.gesture.name());
        }
    }

    /// Runs the teardown of the active gesture and returns to idle.
    fn finish_gesture(&mut self) {
        match std::mem::take(&mut self.gesture) {
            Gesture::Stroking { renderer, frame, layer } => {
                if let Some(target) = self.document.frame_mut(frame).and_then(|f| f.layer_mut(&layer)) {
                    renderer.finish(target.bitmap_mut(), self.tool_settings.opacity);
                }
                self.document.touch();
            }
            Gesture::Selecting { mode, start, current, points } => {
                let layer = self.document.active_layer_id().clone();
                self.selection = match mode {
                    SelectionMode::Rectangle => {
                        Some(Selection::rectangle(start, current, layer)).filter(|s| s.bounds().is_some())
                    }
                    SelectionMode::Freehand => Selection::freehand(points, layer),
                    SelectionMode::Magic => None,
                };
            }
            Gesture::TimelineDrag(_) => self.record_frame_trim(),
            Gesture::Transforming { .. } | Gesture::Idle => {}
        }
    }

    // --- Selection & floating ---

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Lifts the current selection into a floating selection. The undo snapshot is
    /// taken here, so one undo reverts the lift together with its later commit.
    fn lift_selection(&mut self) {
        if self.floating.is_some() {
            return;
        }
        let Some(selection) = self.selection.clone() else {
            return;
        };
        if selection.bounds().is_none() {
            return;
        }
        let frame = self.document.active_frame_index();
        let visible = self
            .document
            .frame(frame)
            .and_then(|f| f.layer(&selection.layer))
            .is_some_and(|l| l.visible);
        if !visible {
            return;
        }
        self.history.push_snapshot(self.document.frames());
        let Some(target_frame) = self.document.frame_mut(frame) else {
            return;
        };
        let frame_id = target_frame.id.clone();
        let Some(target) = target_frame.layer_mut(&selection.layer) else {
            return;
        };
        self.floating = FloatingSelection::lift(target.bitmap_mut(), &selection, &frame_id);
        self.document.touch();
        log::debug!("Lifted selection on frame {frame}");
    }

    /// Draws the floating selection back into its layer.
    pub fn commit_floating(&mut self) -> bool {
        if self.gesture.is_transforming() {
            self.finish_gesture();
        }
        let Some(floating) = self.floating.take() else {
            return false;
        };
        self.selection = None;
        // Frames may have moved since the lift, so the target is found by id.
        let Some(index) = self.document.frame_index_of(&floating.frame) else {
            log::warn!("Frame {} no longer exists; dropping floating selection", floating.frame);
            return false;
        };
        let layer = floating.layer.clone();
        if let Some(target) = self.document.frame_mut(index).and_then(|f| f.layer_mut(&layer)) {
            floating.commit(target.bitmap_mut());
        }
        self.document.touch();
        log::info!("Committed floating selection on frame {index}");
        true
    }

    /// Copies the floating pixels into a new animatic sprite at the playhead.
    pub fn animatic_from_floating(&mut self, name: &str) -> Option<String> {
        let floating = self.floating.as_ref()?;
        let element = AnimaticElement::from_bitmap(
            name,
            floating.image.clone(),
            self.clock.current_time(),
            DEFAULT_ITEM_DURATION,
            egui::pos2(floating.transform.x, floating.transform.y),
        );
        let id = element.id.clone();
        self.tracks.animatics.push(element);
        self.tracks_dirty = true;
        self.active_element = Some(ElementRef::Animatic(id.clone()));
        Some(id)
    }

    // --- Undo ---

    /// Restores the latest snapshot. A pending floating selection is dropped.
    pub fn undo(&mut self) -> bool {
        self.finish_gesture();
        if self.floating.take().is_some() {
            self.selection = None;
        }
        let Some(frames) = self.history.undo() else {
            return false;
        };
        self.document.replace_frames(frames);
        if let Some(ElementRef::Frame(i)) = self.active_element {
            if i >= self.document.frame_count() {
                self.active_element = None;
            }
        }
        true
    }

    /// Runs a frame-array mutation, recording an undo snapshot only if it took effect.
    fn with_snapshot(&mut self, op: impl FnOnce(&mut Document) -> bool) -> bool {
        let before = self.document.frames().to_vec();
        if op(&mut self.document) {
            self.history.push_snapshot(&before);
            true
        } else {
            false
        }
    }

    // --- Frames & layers ---

    pub fn add_frame(&mut self, insert: FrameInsert) -> usize {
        let mut index = 0;
        self.with_snapshot(|doc| {
            index = doc.add_frame(insert);
            true
        });
        self.follow_active_frame();
        index
    }

    pub fn delete_frame(&mut self, index: usize) -> bool {
        let deleted = self.with_snapshot(|doc| doc.delete_frame(index));
        if deleted {
            self.follow_active_frame();
        }
        deleted
    }

    pub fn duplicate_frame(&mut self, index: usize) -> Option<usize> {
        let mut copy = None;
        self.with_snapshot(|doc| {
            copy = doc.duplicate_frame(index);
            copy.is_some()
        });
        self.follow_active_frame();
        copy
    }

    pub fn reorder_frame(&mut self, from: usize, to: usize) -> bool {
        self.with_snapshot(|doc| doc.reorder_frame(from, to))
    }

    /// Splits frame `index` at `local` ms into it.
    pub fn split_frame(&mut self, index: usize, local: f64) -> Option<usize> {
        let mut tail = None;
        self.with_snapshot(|doc| {
            tail = ops::split_frame(doc, index, local);
            tail.is_some()
        });
        tail
    }

    pub fn set_frame_duration(&mut self, index: usize, duration: f64) -> bool {
        self.with_snapshot(|doc| ops::trim_frame_end(doc, index, duration))
    }

    pub fn set_frame_action(&mut self, index: usize, action: Option<String>) {
        self.document.set_frame_action(index, action);
    }

    pub fn add_layer(&mut self) -> Option<LayerId> {
        let mut id = None;
        self.with_snapshot(|doc| {
            id = doc.add_layer();
            id.is_some()
        });
        id
    }

    pub fn delete_layer(&mut self, id: &LayerId) -> bool {
        self.with_snapshot(|doc| doc.delete_layer(id))
    }

    pub fn toggle_layer_visibility(&mut self, id: &LayerId) -> bool {
        self.document.toggle_visible(id)
    }

    pub fn rename_layer(&mut self, id: &LayerId, name: &str) -> bool {
        self.document.rename_layer(id, name)
    }

    pub fn select_layer(&mut self, id: &LayerId) -> bool {
        self.document.select_layer(id)
    }

    // --- Timeline elements ---

    /// Adds a caption line at the playhead.
    pub fn add_dialogue(&mut self, text: &str) -> String {
        let dialogue = Dialogue::new(text, self.clock.current_time(), DEFAULT_ITEM_DURATION);
        let id = dialogue.id.clone();
        self.tracks.dialogues.push(dialogue);
        self.tracks_dirty = true;
        self.active_element = Some(ElementRef::Dialogue(id.clone()));
        id
    }

    pub fn duplicate_element(&mut self, element: &ElementRef) -> Option<ElementRef> {
        let copy = match element {
            ElementRef::Frame(i) => {
                let copy = self.duplicate_frame(*i).map(ElementRef::Frame);
                if copy.is_some() {
                    self.active_element = copy.clone();
                }
                return copy;
            }
            ElementRef::Dialogue(id) => ops::duplicate(&mut self.tracks.dialogues, id).map(ElementRef::Dialogue),
            ElementRef::Audio(id) => ops::duplicate(&mut self.tracks.audio, id).map(ElementRef::Audio),
            ElementRef::Reference(id) => ops::duplicate(&mut self.tracks.references, id).map(ElementRef::Reference),
            ElementRef::Animatic(id) => ops::duplicate(&mut self.tracks.animatics, id).map(ElementRef::Animatic),
        }?;
        self.tracks_dirty = true;
        self.active_element = Some(copy.clone());
        Some(copy)
    }

    pub fn delete_element(&mut self, element: &ElementRef) -> bool {
        let deleted = match element {
            ElementRef::Frame(i) => {
                let deleted = self.delete_frame(*i);
                if deleted {
                    self.active_element = Some(ElementRef::Frame(self.document.active_frame_index()));
                }
                return deleted;
            }
            ElementRef::Dialogue(id) => ops::delete(&mut self.tracks.dialogues, id),
            ElementRef::Audio(id) => ops::delete(&mut self.tracks.audio, id),
            ElementRef::Reference(id) => ops::delete(&mut self.tracks.references, id),
            ElementRef::Animatic(id) => ops::delete(&mut self.tracks.animatics, id),
        };
        if deleted {
            self.tracks_dirty = true;
            if self.active_element.as_ref() == Some(element) {
                self.active_element = None;
            }
            let owns_keyframe = match (element, &self.selected_keyframe) {
                (ElementRef::Animatic(id), Some((owner, _))) => owner == id,
                _ => false,
            };
            if owns_keyframe {
                self.selected_keyframe = None;
            }
        }
        deleted
    }

    /// Splits `element` at the playhead.
    pub fn split_element_at_playhead(&mut self, element: &ElementRef) -> Option<ElementRef> {
        let t = self.clock.current_time();
        let tail = match element {
            ElementRef::Frame(i) => {
                let local = t - self.document.frame_start(*i);
                return self.split_frame(*i, local).map(ElementRef::Frame);
            }
            ElementRef::Dialogue(id) => ops::split(&mut self.tracks.dialogues, id, t).map(ElementRef::Dialogue),
            ElementRef::Audio(id) => ops::split(&mut self.tracks.audio, id, t).map(ElementRef::Audio),
            ElementRef::Reference(id) => ops::split(&mut self.tracks.references, id, t).map(ElementRef::Reference),
            ElementRef::Animatic(id) => ops::split(&mut self.tracks.animatics, id, t).map(ElementRef::Animatic),
        }?;
        self.tracks_dirty = true;
        Some(tail)
    }

    // --- Timeline pointer input ---

    /// Press on the timeline. `x` is in timeline pixels, where 0 is time 0.
    pub fn timeline_press(&mut self, kind: TimelineDragKind, element: Option<ElementRef>, x: f32, now_ms: f64) {
        if !self.gesture.is_idle() {
            return;
        }
        let (origin_start, origin_duration) = match &element {
            Some(ElementRef::Frame(i)) => (
                self.document.frame_start(*i),
                self.document.frame(*i).map_or(0.0, |f| f.duration),
            ),
            Some(other) => self.tracks.timing(other).unwrap_or((0.0, 0.0)),
            None => (0.0, 0.0),
        };
        if element.is_some() {
            self.active_element = element.clone();
        }
        let trims_frame = matches!(kind, TimelineDragKind::TrimStart | TimelineDragKind::TrimEnd)
            && matches!(element, Some(ElementRef::Frame(_)));
        if trims_frame {
            self.trim_before = Some(self.document.frames().to_vec());
        }
        self.transition(Gesture::TimelineDrag(TimelineDrag {
            kind,
            element,
            origin_x: x,
            origin_start,
            origin_duration,
            last_x: x,
        }));
        if kind == TimelineDragKind::Scrub {
            self.scrub(self.view.x_to_time(x), now_ms);
        }
    }

    pub fn timeline_drag(&mut self, x: f32, now_ms: f64) {
        let Gesture::TimelineDrag(drag) = &mut self.gesture else {
            return;
        };
        let last_x = std::mem::replace(&mut drag.last_x, x);
        let drag = drag.clone();
        let dx = x - drag.origin_x;
        let dt = self.view.x_to_time(dx);
        let pps = self.view.pixels_per_second();

        match (drag.kind, &drag.element) {
            (TimelineDragKind::Zoom, _) => self.view.zoom_by_drag(x - last_x),
            (TimelineDragKind::Scrub, _) => self.scrub(self.view.x_to_time(x), now_ms),
            // Frames are reordered on release.
            (TimelineDragKind::Move, Some(ElementRef::Frame(_))) => {}
            (TimelineDragKind::TrimEnd, Some(ElementRef::Frame(i))) => {
                ops::trim_frame_end(&mut self.document, *i, drag.origin_duration + dt);
            }
            (TimelineDragKind::TrimStart, Some(ElementRef::Frame(i))) => {
                ops::trim_frame_start(&mut self.document, *i, drag.origin_start + dt);
            }
            (kind, Some(element)) => {
                let edit = LaneEdit { kind, drag: &drag, dt, dx, pps };
                let changed = match element {
                    ElementRef::Dialogue(id) => edit.apply(&mut self.tracks.dialogues, id),
                    ElementRef::Audio(id) => edit.apply(&mut self.tracks.audio, id),
                    ElementRef::Reference(id) => edit.apply(&mut self.tracks.references, id),
                    ElementRef::Animatic(id) => edit.apply(&mut self.tracks.animatics, id),
                    ElementRef::Frame(_) => false,
                };
                self.tracks_dirty |= changed;
            }
            (_, None) => {}
        }
    }

    pub fn timeline_release(&mut self) {
        let Gesture::TimelineDrag(drag) = std::mem::take(&mut self.gesture) else {
            return;
        };
        self.record_frame_trim();
        if let (TimelineDragKind::Move, Some(ElementRef::Frame(from))) = (drag.kind, &drag.element) {
            let dropped_at = drag.origin_start + self.view.x_to_time(drag.last_x - drag.origin_x);
            let to = self.document.frame_index_at(dropped_at.max(0.0));
            if to != *from && self.reorder_frame(*from, to) {
                self.active_element = Some(ElementRef::Frame(to));
            }
        }
    }

    /// One undo step for a whole frame trim drag, recorded only if a duration changed.
    fn record_frame_trim(&mut self) {
        let Some(before) = self.trim_before.take() else {
            return;
        };
        let changed = before.len() != self.document.frame_count()
            || before.iter().zip(self.document.frames()).any(|(a, b)| a.duration != b.duration);
        if changed {
            self.history.push_snapshot(&before);
        }
    }

    // --- Playback ---

    pub fn toggle_play(&mut self, now_ms: f64) {
        let total = self.scene_duration();
        self.clock.toggle(now_ms, total);
        self.follow_playhead();
    }

    pub fn set_looping(&mut self, looping: bool, now_ms: f64) {
        self.clock.set_looping(looping, now_ms);
    }

    pub fn scrub(&mut self, t: f64, now_ms: f64) {
        let total = self.scene_duration();
        self.clock.scrub(t, total, now_ms);
        self.follow_playhead();
    }

    /// Makes frame `index` active and moves the playhead to its start.
    pub fn set_active_frame(&mut self, index: usize, now_ms: f64) {
        self.document.set_active_frame(index);
        let start = self.document.frame_start(self.document.active_frame_index());
        let total = self.scene_duration();
        self.clock.scrub(start, total, now_ms);
    }

    /// Steps one frame back or forward, pausing playback.
    pub fn step_frame(&mut self, forward: bool, now_ms: f64) {
        let total = self.scene_duration();
        self.clock.pause(now_ms, total);
        let current = self.document.active_frame_index();
        let next = if forward {
            (current + 1).min(self.document.frame_count() - 1)
        } else {
            current.saturating_sub(1)
        };
        self.set_active_frame(next, now_ms);
    }

    fn follow_playhead(&mut self) {
        let index = self.document.frame_index_at(self.clock.current_time());
        if index != self.document.active_frame_index() {
            self.document.set_active_frame(index);
        }
    }

    /// After a frame-array edit, keep the playhead on the active frame while paused.
    fn follow_active_frame(&mut self) {
        if !self.clock.is_playing() {
            let start = self.document.frame_start(self.document.active_frame_index());
            let total = self.scene_duration();
            self.clock.scrub(start, total, 0.0);
        }
    }

    // --- Keyframes ---

    /// Keys animatic `id` at the playhead, either with `value` or with its current
    /// interpolated position.
    pub fn set_keyframe_at_playhead(&mut self, id: &str, value: Option<Pos2>) -> Option<String> {
        let t = self.clock.current_time();
        let element = self.tracks.animatic_mut(id)?;
        let local = t - element.start_time;
        let key = match value {
            Some(value) => element.set_keyframe(local, value),
            None => element.capture_keyframe(local),
        };
        self.tracks_dirty = true;
        self.selected_keyframe = Some((id.to_string(), key.clone()));
        Some(key)
    }

    pub fn delete_selected_keyframe(&mut self) -> bool {
        let Some((animatic, key)) = self.selected_keyframe.clone() else {
            return false;
        };
        let deleted = self
            .tracks
            .animatic_mut(&animatic)
            .is_some_and(|a| a.delete_keyframe(&key));
        if deleted {
            self.selected_keyframe = None;
            self.tracks_dirty = true;
        }
        deleted
    }

    // --- Keyboard ---

    pub fn handle_shortcut(&mut self, shortcut: Shortcut, now_ms: f64) {
        match shortcut {
            Shortcut::Undo => {
                self.undo();
            }
            Shortcut::DuplicateElement => {
                if let Some(element) = self.active_element.clone() {
                    self.duplicate_element(&element);
                }
            }
            Shortcut::DeleteElement => {
                if let Some(element) = self.active_element.clone() {
                    self.delete_element(&element);
                }
            }
            Shortcut::TogglePlay => self.toggle_play(now_ms),
            Shortcut::PreviousFrame => self.step_frame(false, now_ms),
            Shortcut::NextFrame => self.step_frame(true, now_ms),
            Shortcut::DeleteKeyframe => {
                self.delete_selected_keyframe();
            }
            Shortcut::CommitFloating => {
                self.commit_floating();
            }
        }
    }

    // --- Uploads ---

    /// Hands the core an upload in progress. The clip lands at the current playhead.
    pub fn begin_upload(&mut self, kind: AssetKind, name: &str, future: UploadFuture) {
        self.uploads.push(kind, name, self.clock.current_time(), future);
    }

    fn poll_uploads(&mut self) {
        for done in self.uploads.poll() {
            match done.result {
                Ok(asset) => {
                    let element = match done.kind {
                        AssetKind::Audio => {
                            let duration = asset
                                .duration_ms
                                .map_or(AudioClip::MIN_DURATION, |d| d.max(AudioClip::MIN_DURATION));
                            let clip = AudioClip::new(&done.name, &asset.url, done.at_ms, duration);
                            let id = clip.id.clone();
                            self.tracks.audio.push(clip);
                            ElementRef::Audio(id)
                        }
                        AssetKind::Image => {
                            let size = asset.size.map(|[w, h]| [w as f32, h as f32]);
                            let clip = ReferenceClip::new(&done.name, Some(asset.url), done.at_ms, DEFAULT_ITEM_DURATION, size);
                            let id = clip.id.clone();
                            self.tracks.references.push(clip);
                            ElementRef::Reference(id)
                        }
                    };
                    self.tracks_dirty = true;
                    self.active_element = Some(element);
                }
                Err(err) => {
                    log::warn!("Upload of {:?} failed: {err}", done.name);
                    self.notices.push(Notice::new("Upload failed", format!("{}: {err}", done.name)));
                }
            }
        }
    }

    // --- Persistence ---

    /// The payload to persist. A pending floating selection is included as if committed.
    pub fn payload(&self) -> ScenePayload {
        let mut payload = ScenePayload::from_parts(&self.document, &self.tracks);
        if let Some(floating) = &self.floating {
            if let Some(target) = payload
                .frames
                .iter_mut()
                .find(|f| f.id == floating.frame)
                .and_then(|f: &mut Frame| f.layer_mut(&floating.layer))
            {
                floating.clone().commit(target.bitmap_mut());
            }
        }
        payload
    }

    /// Saves pending edits now and switches to scene `key`.
    pub fn open_scene(&mut self, key: &str) {
        if self.loaded && self.pending_load.is_none() && key == self.scene_key {
            return;
        }
        self.flush();
        log::info!("Opening scene {key:?}");
        self.scene_key = key.to_string();
        self.loaded = false;
        let load = self.saves.store().load(key);
        self.pending_load = Some((key.to_string(), load));
        self.poll_load();
    }

    /// Queues a save of the open scene right away if anything changed.
    pub fn flush(&mut self) {
        if self.gesture.is_stroking() {
            self.finish_gesture();
        }
        let doc_dirty = self.document.take_dirty();
        let tracks_dirty = std::mem::take(&mut self.tracks_dirty);
        let due = self.debounce.take() || doc_dirty || tracks_dirty;
        // Until the load lands, the document does not belong to `scene_key`.
        if due && self.loaded {
            let payload = self.payload();
            self.saves.enqueue(&self.scene_key, payload);
            self.saves.poll();
        }
    }

    fn poll_load(&mut self) {
        let Some((key, fut)) = self.pending_load.as_mut() else {
            return;
        };
        let Poll::Ready(result) = poll_once(fut) else {
            return;
        };
        let key = std::mem::take(key);
        self.pending_load = None;

        let payload = match result {
            Ok(value) => match normalize_payload(value.unwrap_or(Value::Null), &key) {
                Ok(payload) => payload,
                Err(err) => {
                    log::error!("Scene {key:?} could not be read: {err}");
                    ScenePayload::default()
                }
            },
            Err(err) => {
                log::warn!("Loading scene {key:?} failed: {err}");
                ScenePayload::default()
            }
        };
        self.install(payload);
    }

    fn install(&mut self, payload: ScenePayload) {
        let (document, tracks) = payload.into_parts();
        self.document = document;
        self.tracks = tracks;
        self.history.clear();
        self.clock.stop();
        self.gesture = Gesture::Idle;
        self.selection = None;
        self.floating = None;
        self.active_element = None;
        self.selected_keyframe = None;
        self.tracks_dirty = false;
        self.debounce.take();
        self.trim_before = None;
        self.loaded = true;
    }

    /// Per-frame update: advances playback, applies finished uploads and loads,
    /// and drives the debounced save queue.
    pub fn tick(&mut self, now_ms: f64) {
        self.poll_load();

        let total = self.scene_duration();
        match self.clock.tick(now_ms, total) {
            TickOutcome::Idle => {}
            TickOutcome::Advanced | TickOutcome::Wrapped | TickOutcome::Ended => self.follow_playhead(),
        }

        self.poll_uploads();

        let doc_dirty = self.document.take_dirty();
        let tracks_dirty = std::mem::take(&mut self.tracks_dirty);
        if !self.loaded {
            // Edits made while a scene is loading are replaced when it lands.
            self.debounce.take();
        } else if doc_dirty || tracks_dirty {
            self.debounce.mark(now_ms);
        }
        if self.gesture.is_idle() && self.debounce.take_due(now_ms) {
            let payload = self.payload();
            self.saves.enqueue(&self.scene_key, payload);
        }
        for outcome in self.saves.poll() {
            if outcome.result.is_err() && outcome.key == self.scene_key {
                // Retry on the next quiet period.
                self.debounce.mark(now_ms);
            }
        }
    }
}

/// A move or trim of one lane item during a timeline drag.
struct LaneEdit<'a> {
    kind: TimelineDragKind,
    drag: &'a TimelineDrag,
    dt: f64,
    dx: f32,
    pps: f32,
}

impl LaneEdit<'_> {
    fn apply<T: TrackItem>(&self, items: &mut [T], id: &str) -> bool {
        let Some(item) = ops::find_mut(items, id) else {
            return false;
        };
        match self.kind {
            TimelineDragKind::Move => ops::drag_to(item, self.drag.origin_start, self.dx, self.pps),
            TimelineDragKind::TrimStart => ops::trim_start(item, self.drag.origin_start + self.dt),
            TimelineDragKind::TrimEnd => ops::trim_end(item, self.drag.origin_duration + self.dt),
            TimelineDragKind::Zoom | TimelineDragKind::Scrub => return false,
        }
        true
    }
}
