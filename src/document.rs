use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::bitmap;
use crate::id_generator::generate_id;
use crate::layer::{default_layers, Layer, LayerId, MAX_LAYERS};

pub const DEFAULT_FRAME_DURATION: f64 = 1000.0;

/// One storyboard panel: an ordered layer stack shown for `duration` ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: String,
    pub layers: Vec<Layer>,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Frame {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self {
            id: generate_id(),
            layers,
            duration: DEFAULT_FRAME_DURATION,
            action: None,
        }
    }

    pub fn blank() -> Self {
        Self::new(default_layers())
    }

    /// A frame with this frame's layer structure and empty bitmaps.
    pub fn cleared_copy(&self) -> Self {
        Self::new(self.layers.iter().map(Layer::cleared).collect())
    }

    /// A deep copy under a fresh frame id. Layer ids are kept.
    pub fn deep_copy(&self) -> Self {
        Self {
            id: generate_id(),
            ..self.clone()
        }
    }

    pub fn layer(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    pub fn layer_mut(&mut self, id: &LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| &l.id == id)
    }

    /// Flattens the visible layers bottom to top.
    pub fn composite(&self) -> RgbaImage {
        let mut out = bitmap::blank_canvas();
        for layer in self.layers.iter().filter(|l| l.visible) {
            if let Some(data) = &layer.data {
                bitmap::composite_at(&mut out, data, 0, 0, 1.0);
            }
        }
        out
    }
}

/// Where `add_frame` puts the new frame relative to the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameInsert {
    Before,
    After,
}

/// The frame store of one scene: frames with aligned layer stacks, the active
/// frame and layer, and a dirty flag consumed by the save debounce.
#[derive(Debug, Clone)]
pub struct Document {
    frames: Vec<Frame>,
    active_frame: usize,
    active_layer: LayerId,
    dirty: bool,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self::from_frames(vec![Frame::blank()])
    }

    /// Frames are expected to be normalised already; an empty list gets one blank frame.
    pub fn from_frames(frames: Vec<Frame>) -> Self {
        let frames = if frames.is_empty() { vec![Frame::blank()] } else { frames };
        let active_layer = frames[0]
            .layers
            .last()
            .map(|l| l.id.clone())
            .unwrap_or_default();
        Self {
            frames,
            active_frame: 0,
            active_layer,
            dirty: false,
            revision: 0,
        }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_index_of(&self, id: &str) -> Option<usize> {
        self.frames.iter().position(|f| f.id == id)
    }

    /// Mutable access to one frame. Callers mutating pixels must call [`Self::touch`].
    pub fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    /// Swaps in a whole frame array (undo restore). Keeps the active indices valid.
    pub fn replace_frames(&mut self, frames: Vec<Frame>) {
        if frames.is_empty() {
            return;
        }
        self.frames = frames;
        self.active_frame = self.active_frame.min(self.frames.len() - 1);
        if self.active_layer().is_none() {
            self.active_layer = self.frames[0]
                .layers
                .last()
                .map(|l| l.id.clone())
                .unwrap_or_default();
        }
        self.touch();
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Marks the store dirty and bumps the revision used for texture caching.
    pub fn touch(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether the store was dirty and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn active_frame_index(&self) -> usize {
        self.active_frame
    }

    pub fn set_active_frame(&mut self, index: usize) {
        self.active_frame = index.min(self.frames.len() - 1);
    }

    pub fn active_frame(&self) -> &Frame {
        &self.frames[self.active_frame]
    }

    pub fn active_layer_id(&self) -> &LayerId {
        &self.active_layer
    }

    pub fn select_layer(&mut self, id: &LayerId) -> bool {
        if self.frames[0].layer(id).is_none() {
            return false;
        }
        self.active_layer = id.clone();
        true
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.frames[self.active_frame].layer(&self.active_layer)
    }

    pub fn active_layer_mut(&mut self) -> Option<&mut Layer> {
        let id = self.active_layer.clone();
        self.frames[self.active_frame].layer_mut(&id)
    }

    /// Layer structure shared by every frame (taken from the first one).
    pub fn layer_template(&self) -> &[Layer] {
        &self.frames[0].layers
    }

    // --- Frames ---

    /// Inserts a frame with the active frame's layer structure (bitmaps cleared)
    /// next to it and makes it active. Returns the new index.
    pub fn add_frame(&mut self, insert: FrameInsert) -> usize {
        let frame = self.frames[self.active_frame].cleared_copy();
        let index = match insert {
            FrameInsert::Before => self.active_frame,
            FrameInsert::After => self.active_frame + 1,
        };
        self.frames.insert(index, frame);
        self.active_frame = index;
        self.touch();
        log::debug!("Added frame at {index}, total: {}", self.frames.len());
        index
    }

    /// Removes a frame; refuses when it is the only one.
    pub fn delete_frame(&mut self, index: usize) -> bool {
        if self.frames.len() <= 1 || index >= self.frames.len() {
            log::debug!("Refusing to delete frame {index} of {}", self.frames.len());
            return false;
        }
        self.frames.remove(index);
        if self.active_frame > index || self.active_frame >= self.frames.len() {
            self.active_frame = self.active_frame.saturating_sub(1);
        }
        self.touch();
        true
    }

    /// Deep-copies frame `index` (bitmaps included) and inserts it right after.
    pub fn duplicate_frame(&mut self, index: usize) -> Option<usize> {
        let copy = self.frames.get(index)?.deep_copy();
        self.frames.insert(index + 1, copy);
        self.active_frame = index + 1;
        self.touch();
        Some(index + 1)
    }

    /// Inserts an already-built frame; used by split.
    pub fn insert_frame(&mut self, index: usize, frame: Frame) {
        let index = index.min(self.frames.len());
        self.frames.insert(index, frame);
        // Keep pointing at the same frame.
        if index <= self.active_frame && self.frames.len() > 1 {
            self.active_frame += 1;
        }
        self.touch();
    }

    /// Array move. The active frame keeps pointing at the frame it pointed at.
    pub fn reorder_frame(&mut self, from: usize, to: usize) -> bool {
        if from >= self.frames.len() || to >= self.frames.len() || from == to {
            return false;
        }
        let active_id = self.frames[self.active_frame].id.clone();
        let frame = self.frames.remove(from);
        self.frames.insert(to, frame);
        self.active_frame = self
            .frames
            .iter()
            .position(|f| f.id == active_id)
            .unwrap_or(to);
        self.touch();
        true
    }

    pub fn set_frame_duration(&mut self, index: usize, duration: f64, floor: f64) {
        if let Some(frame) = self.frames.get_mut(index) {
            frame.duration = duration.max(floor);
            self.touch();
        }
    }

    pub fn set_frame_action(&mut self, index: usize, action: Option<String>) {
        if let Some(frame) = self.frames.get_mut(index) {
            frame.action = action.filter(|a| !a.trim().is_empty());
            self.touch();
        }
    }

    // --- Layers (applied to every frame at once) ---

    /// Adds an empty layer on top of every frame and selects it.
    pub fn add_layer(&mut self) -> Option<LayerId> {
        if self.layer_template().len() >= MAX_LAYERS {
            log::debug!("Layer cap of {MAX_LAYERS} reached");
            return None;
        }
        let layer = Layer::new(&format!("Layer {}", self.layer_template().len() + 1));
        for frame in &mut self.frames {
            frame.layers.push(layer.cleared());
        }
        self.active_layer = layer.id.clone();
        self.touch();
        Some(layer.id)
    }

    /// Removes a layer from every frame; the last remaining layer is kept.
    pub fn delete_layer(&mut self, id: &LayerId) -> bool {
        let Some(pos) = self.layer_template().iter().position(|l| &l.id == id) else {
            return false;
        };
        if self.layer_template().len() <= 1 {
            return false;
        }
        for frame in &mut self.frames {
            frame.layers.retain(|l| &l.id != id);
        }
        if &self.active_layer == id {
            let fallback = pos.min(self.layer_template().len() - 1);
            self.active_layer = self.layer_template()[fallback].id.clone();
        }
        self.touch();
        true
    }

    pub fn toggle_visible(&mut self, id: &LayerId) -> bool {
        let mut found = false;
        for frame in &mut self.frames {
            if let Some(layer) = frame.layer_mut(id) {
                layer.visible = !layer.visible;
                found = true;
            }
        }
        if found {
            self.touch();
        }
        found
    }

    pub fn rename_layer(&mut self, id: &LayerId, name: &str) -> bool {
        let mut found = false;
        for frame in &mut self.frames {
            if let Some(layer) = frame.layer_mut(id) {
                layer.set_name(name.to_string());
                found = true;
            }
        }
        if found {
            self.touch();
        }
        found
    }

    // --- Time ---

    /// Cumulative start offset of frame `index` in ms.
    pub fn frame_start(&self, index: usize) -> f64 {
        self.frames.iter().take(index).map(|f| f.duration).sum()
    }

    pub fn total_duration(&self) -> f64 {
        self.frames.iter().map(|f| f.duration).sum()
    }

    /// Linear scan over cumulative durations; times past the end map to the last frame.
    pub fn frame_index_at(&self, time: f64) -> usize {
        let mut acc = 0.0;
        for (i, frame) in self.frames.iter().enumerate() {
            acc += frame.duration;
            if time < acc {
                return i;
            }
        }
        self.frames.len() - 1
    }

    pub fn composite_frame(&self, index: usize) -> Option<RgbaImage> {
        self.frames.get(index).map(Frame::composite)
    }
}
