//! 4-connected flood fills over layer bitmaps.

use egui::{Color32, Pos2};
use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::bitmap::color_to_rgba;

/// The connected region reached by a flood, in the coordinates of the source bitmap.
#[derive(Debug, Clone)]
pub struct FloodRegion {
    /// Full-size mask, 255 inside the region
    pub mask: GrayImage,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
    pub pixel_count: usize,
}

impl FloodRegion {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// Floods from `seed` over every 4-connected pixel accepted by `matches`.
///
/// Returns `None` when the seed is off the bitmap or is itself rejected. The
/// visited set is the output mask, so no pixel is processed twice and the work is
/// bounded by `width × height`.
pub fn flood_region(img: &RgbaImage, seed: (u32, u32), matches: impl Fn(&Rgba<u8>) -> bool) -> Option<FloodRegion> {
    let (w, h) = img.dimensions();
    let (sx, sy) = seed;
    if sx >= w || sy >= h || !matches(img.get_pixel(sx, sy)) {
        return None;
    }

    let mut mask = GrayImage::new(w, h);
    let mut region = FloodRegion {
        mask: GrayImage::new(0, 0),
        min_x: sx,
        min_y: sy,
        max_x: sx,
        max_y: sy,
        pixel_count: 0,
    };

    let mut stack: Vec<(u32, u32)> = Vec::with_capacity(4096);
    mask.put_pixel(sx, sy, Luma([255]));
    stack.push((sx, sy));

    while let Some((x, y)) = stack.pop() {
        region.pixel_count += 1;
        region.min_x = region.min_x.min(x);
        region.max_x = region.max_x.max(x);
        region.min_y = region.min_y.min(y);
        region.max_y = region.max_y.max(y);

        let neighbours = [
            (x > 0).then(|| (x - 1, y)),
            (x + 1 < w).then(|| (x + 1, y)),
            (y > 0).then(|| (x, y - 1)),
            (y + 1 < h).then(|| (x, y + 1)),
        ];
        for (nx, ny) in neighbours.into_iter().flatten() {
            if mask.get_pixel(nx, ny)[0] == 0 && matches(img.get_pixel(nx, ny)) {
                mask.put_pixel(nx, ny, Luma([255]));
                stack.push((nx, ny));
            }
        }
    }

    region.mask = mask;
    Some(region)
}

/// Replaces the exact-colour region under `seed` with `color`.
///
/// Returns `false` (and leaves the bitmap alone) if the seed is outside the
/// bitmap or already has the fill colour.
pub fn bucket_fill(img: &mut RgbaImage, seed: Pos2, color: Color32) -> bool {
    if seed.x < 0.0 || seed.y < 0.0 {
        return false;
    }
    let (sx, sy) = (seed.x as u32, seed.y as u32);
    let Some(target) = img.get_pixel_checked(sx, sy).copied() else {
        return false;
    };
    let fill = color_to_rgba(color);
    if target == fill {
        return false;
    }

    let Some(region) = flood_region(img, (sx, sy), |p| *p == target) else {
        return false;
    };
    for y in region.min_y..=region.max_y {
        for x in region.min_x..=region.max_x {
            if region.mask.get_pixel(x, y)[0] != 0 {
                img.put_pixel(x, y, fill);
            }
        }
    }
    log::debug!("bucket fill: {} px at ({sx}, {sy})", region.pixel_count);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed() -> RgbaImage {
        // 10x10 transparent with a black ring around (2..8, 2..8).
        let mut img = RgbaImage::new(10, 10);
        for i in 2..8 {
            for (x, y) in [(i, 2), (i, 7), (2, i), (7, i)] {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        img
    }

    #[test]
    fn test_fill_stops_at_boundary() {
        let mut img = boxed();
        assert!(bucket_fill(&mut img, egui::pos2(4.5, 4.5), Color32::RED));
        assert_eq!(*img.get_pixel(4, 4), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(3, 6), Rgba([255, 0, 0, 255]));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(*img.get_pixel(2, 2), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_fill_same_colour_is_noop() {
        let mut img = boxed();
        assert!(!bucket_fill(&mut img, egui::pos2(2.0, 2.0), Color32::BLACK));
    }

    #[test]
    fn test_fill_outside_bitmap_is_noop() {
        let mut img = boxed();
        let before = img.clone();
        assert!(!bucket_fill(&mut img, egui::pos2(50.0, 1.0), Color32::RED));
        assert_eq!(img, before);
    }

    #[test]
    fn test_region_counts_and_bounds() {
        let img = boxed();
        let region = flood_region(&img, (4, 4), |p| p[3] == 0).unwrap();
        assert_eq!(region.pixel_count, 16);
        assert_eq!((region.min_x, region.min_y, region.width(), region.height()), (3, 3, 4, 4));
    }
}
