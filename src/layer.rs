use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bitmap;
use crate::id_generator::generate_id;

/// Hard cap on layers per frame.
pub const MAX_LAYERS: usize = 5;

/// A unique identifier for a layer. The same id names the "same" layer in
/// every frame of a scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new() -> Self {
        Self(generate_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Represents a single raster layer of a frame
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    /// Unique identifier for the layer
    #[serde(default)]
    pub id: LayerId,
    /// Display name of the layer
    #[serde(default)]
    pub name: String,
    /// Whether the layer is currently visible
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Pixel content; `None` until something is drawn
    #[serde(default, with = "bitmap::png_opt")]
    pub data: Option<RgbaImage>,
}

fn default_visible() -> bool {
    true
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("data", &self.data.as_ref().map(|d| d.dimensions()))
            .finish()
    }
}

impl Layer {
    pub fn new(name: &str) -> Self {
        Self {
            id: LayerId::new(),
            name: name.to_string(),
            visible: true,
            data: None,
        }
    }

    /// Same id, name and visibility with the bitmap cleared.
    pub fn cleared(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            visible: self.visible,
            data: None,
        }
    }

    /// Mutable access to the bitmap, allocating a blank canvas on first use.
    pub fn bitmap_mut(&mut self) -> &mut RgbaImage {
        self.data.get_or_insert_with(bitmap::blank_canvas)
    }

    pub fn is_empty(&self) -> bool {
        self.data
            .as_ref()
            .is_none_or(|d| d.pixels().all(|p| p[3] == 0))
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

/// The canonical layer stack every new scene starts with.
pub fn default_layers() -> Vec<Layer> {
    vec![Layer::new("Layer 1")]
}

/// Produces one canonical layer array from whatever a stored frame carried:
/// an explicit layer list, a single legacy bitmap, or nothing at all. Every
/// bitmap comes out canvas-sized.
pub fn normalize_layers(layers: Option<Vec<Layer>>, legacy_bitmap: Option<RgbaImage>) -> Vec<Layer> {
    let mut layers = match layers {
        Some(mut layers) if !layers.is_empty() => {
            layers.truncate(MAX_LAYERS);
            layers
        }
        _ => {
            let mut layer = Layer::new("Layer 1");
            layer.data = legacy_bitmap;
            vec![layer]
        }
    };
    for layer in &mut layers {
        layer.data = layer.data.take().map(bitmap::fit_to_canvas);
    }
    layers
}

/// Rewrites `layers` so its id-set and order match `template`: missing layers are
/// added empty, unknown layers are dropped, bitmaps of matching ids are kept.
pub fn align_to(template: &[Layer], layers: Vec<Layer>) -> Vec<Layer> {
    let mut layers = layers;
    template
        .iter()
        .map(|t| match layers.iter().position(|l| l.id == t.id) {
            Some(pos) => {
                let mut layer = layers.swap_remove(pos);
                layer.name = t.name.clone();
                layer
            }
            None => t.cleared(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleared_keeps_identity() {
        let mut layer = Layer::new("Ink");
        layer.visible = false;
        layer.bitmap_mut();
        let cleared = layer.cleared();
        assert_eq!(cleared.id, layer.id);
        assert_eq!(cleared.name, "Ink");
        assert!(!cleared.visible);
        assert!(cleared.data.is_none());
    }

    #[test]
    fn test_normalize_legacy_bitmap_becomes_single_layer() {
        let bmp = RgbaImage::new(2, 2);
        let layers = normalize_layers(None, Some(bmp));
        assert_eq!(layers.len(), 1);
        assert_eq!(
            layers[0].data.as_ref().map(|d| d.dimensions()),
            Some((bitmap::CANVAS_WIDTH, bitmap::CANVAS_HEIGHT))
        );
    }

    #[test]
    fn test_align_to_template() {
        let template = vec![Layer::new("A"), Layer::new("B")];
        let mut extra = Layer::new("Stray");
        extra.bitmap_mut();
        let mut b = template[1].clone();
        b.data = Some(RgbaImage::new(1, 1));
        let aligned = align_to(&template, vec![extra, b]);
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].id, template[0].id);
        assert!(aligned[0].data.is_none());
        assert_eq!(aligned[1].id, template[1].id);
        assert!(aligned[1].data.is_some());
    }
}
