use std::collections::HashMap;

use egui::{ColorImage, Context, TextureHandle, TextureId, TextureOptions};
use image::RgbaImage;
use thiserror::Error;

/// Errors that can occur during texture generation
#[derive(Error, Debug)]
pub enum TextureGenerationError {
    #[error("Nothing to draw")]
    Empty,
    #[error("Invalid texture dimensions {0}x{1}")]
    InvalidDimensions(u32, u32),
}

/// Converts a straight-alpha bitmap into an egui image.
pub fn color_image(img: &RgbaImage) -> Result<ColorImage, TextureGenerationError> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(TextureGenerationError::InvalidDimensions(w, h));
    }
    Ok(ColorImage::from_rgba_unmultiplied([w as usize, h as usize], img.as_raw()))
}

/// Caches GPU textures for frame composites and sprites, keyed by
/// (owner id, revision). A new revision simply misses the cache; stale
/// revisions age out through the LRU.
pub struct TextureManager {
    texture_cache: HashMap<(String, u64), TextureHandle>,
    last_used: HashMap<(String, u64), u64>,
    /// Frame counter for LRU tracking
    current_frame: u64,
    max_cache_size: usize,
}

impl std::fmt::Debug for TextureManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureManager")
            .field("cached", &self.texture_cache.len())
            .field("max_cache_size", &self.max_cache_size)
            .finish()
    }
}

impl TextureManager {
    pub fn new(max_cache_size: usize) -> Self {
        Self {
            texture_cache: HashMap::new(),
            last_used: HashMap::new(),
            current_frame: 0,
            max_cache_size: max_cache_size.max(1),
        }
    }

    /// Should be called at the start of each UI frame
    pub fn begin_frame(&mut self) {
        self.current_frame += 1;
    }

    /// Returns the cached texture for `(key, version)` or uploads a new one.
    pub fn get_or_create_texture<F>(
        &mut self,
        key: &str,
        version: u64,
        generator: F,
        ctx: &Context,
    ) -> Result<TextureId, TextureGenerationError>
    where
        F: FnOnce() -> Result<ColorImage, TextureGenerationError>,
    {
        let cache_key = (key.to_string(), version);

        if let Some(handle) = self.texture_cache.get(&cache_key) {
            self.last_used.insert(cache_key, self.current_frame);
            return Ok(handle.id());
        }

        let image = generator()?;
        self.make_room();

        let name = format!("{key}_v{version}");
        let handle = ctx.load_texture(name, image, TextureOptions::LINEAR);
        let id = handle.id();
        self.texture_cache.insert(cache_key.clone(), handle);
        self.last_used.insert(cache_key, self.current_frame);
        Ok(id)
    }

    /// Drops every cached version of `key`.
    pub fn invalidate(&mut self, key: &str) {
        self.texture_cache.retain(|(k, _), _| k != key);
        self.last_used.retain(|(k, _), _| k != key);
    }

    /// Evicts least recently used entries until one more fits.
    fn make_room(&mut self) {
        if self.texture_cache.len() < self.max_cache_size {
            return;
        }
        let mut entries: Vec<((String, u64), u64)> = self
            .last_used
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        entries.sort_by_key(|(_, frame)| *frame);

        let to_remove = self.texture_cache.len() + 1 - self.max_cache_size;
        for (key, _) in entries.into_iter().take(to_remove) {
            self.texture_cache.remove(&key);
            self.last_used.remove(&key);
        }
    }

    pub fn clear_cache(&mut self) {
        self.texture_cache.clear();
        self.last_used.clear();
    }

    pub fn cache_size(&self) -> usize {
        self.texture_cache.len()
    }

    #[cfg(test)]
    fn contains(&self, key: &str, version: u64) -> bool {
        self.texture_cache.contains_key(&(key.to_string(), version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> Result<ColorImage, TextureGenerationError> {
        Ok(ColorImage::new([10, 10], egui::Color32::WHITE))
    }

    #[test]
    fn test_cache_hit() {
        let ctx = Context::default();
        let mut manager = TextureManager::new(10);

        let first = manager.get_or_create_texture("frame-a", 1, generator, &ctx).unwrap();
        let second = manager
            .get_or_create_texture("frame-a", 1, || Err(TextureGenerationError::Empty), &ctx)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.cache_size(), 1);
    }

    #[test]
    fn test_invalidation_drops_all_versions() {
        let ctx = Context::default();
        let mut manager = TextureManager::new(10);
        manager.get_or_create_texture("frame-a", 1, generator, &ctx).unwrap();
        manager.get_or_create_texture("frame-a", 2, generator, &ctx).unwrap();
        manager.get_or_create_texture("frame-b", 1, generator, &ctx).unwrap();

        manager.invalidate("frame-a");

        assert_eq!(manager.cache_size(), 1);
        assert!(manager.contains("frame-b", 1));
    }

    #[test]
    fn test_lru_eviction_stays_within_capacity() {
        let ctx = Context::default();
        let mut manager = TextureManager::new(2);

        manager.get_or_create_texture("a", 1, generator, &ctx).unwrap();
        manager.begin_frame();
        manager.get_or_create_texture("b", 1, generator, &ctx).unwrap();
        manager.begin_frame();
        // Touch "a" so "b" becomes the oldest.
        manager.get_or_create_texture("a", 1, generator, &ctx).unwrap();
        manager.begin_frame();
        manager.get_or_create_texture("c", 1, generator, &ctx).unwrap();

        assert_eq!(manager.cache_size(), 2);
        assert!(manager.contains("a", 1));
        assert!(!manager.contains("b", 1));
        assert!(manager.contains("c", 1));
    }

    #[test]
    fn test_color_image_rejects_empty_bitmap() {
        let img = RgbaImage::new(0, 4);
        assert!(matches!(color_image(&img), Err(TextureGenerationError::InvalidDimensions(0, 4))));
        let img = RgbaImage::new(3, 2);
        assert_eq!(color_image(&img).unwrap().size, [3, 2]);
    }
}
