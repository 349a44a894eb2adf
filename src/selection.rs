use egui::{Pos2, Rect};
use image::{GrayImage, Luma, Rgba, RgbaImage, imageops};

use crate::bitmap::{self, CANVAS_HEIGHT, CANVAS_WIDTH, erase_pixel, keep_inside};
use crate::fill::flood_region;
use crate::gizmo::BoxTransform;
use crate::layer::LayerId;

/// Default magic-wand colour distance.
pub const DEFAULT_TOLERANCE: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Rectangle,
    Freehand,
    Magic,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionShape {
    /// Normalised box in canvas coordinates
    Rectangle(Rect),
    /// Closed polyline; the box is derived from its points
    Freehand(Vec<Pos2>),
    /// Tight box plus a cropped mask of the same size
    Magic(MagicSelection),
}

/// Result of a magic-wand pick.
#[derive(Debug, Clone, PartialEq)]
pub struct MagicSelection {
    pub x: u32,
    pub y: u32,
    pub mask: GrayImage,
    pub pixel_count: usize,
}

impl MagicSelection {
    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }
}

/// The single active selection, scoped to one layer of the active frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub shape: SelectionShape,
    pub layer: LayerId,
}

/// Pixel box of a selection on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Selection {
    /// A rectangle from two drag corners, in any order.
    pub fn rectangle(a: Pos2, b: Pos2, layer: LayerId) -> Self {
        Self {
            shape: SelectionShape::Rectangle(Rect::from_two_pos(a, b)),
            layer,
        }
    }

    /// A lasso needs at least three points to enclose anything.
    pub fn freehand(points: Vec<Pos2>, layer: LayerId) -> Option<Self> {
        (points.len() >= 3).then_some(Self {
            shape: SelectionShape::Freehand(points),
            layer,
        })
    }

    pub fn magic(img: &RgbaImage, seed: Pos2, tolerance: u8, layer: LayerId) -> Option<Self> {
        if seed.x < 0.0 || seed.y < 0.0 {
            return None;
        }
        magic_wand(img, (seed.x as u32, seed.y as u32), tolerance).map(|m| Self {
            shape: SelectionShape::Magic(m),
            layer,
        })
    }

    /// Canvas-clamped pixel box; `None` if nothing of it lies on the canvas.
    pub fn bounds(&self) -> Option<PixelBox> {
        let rect = match &self.shape {
            SelectionShape::Rectangle(rect) => *rect,
            SelectionShape::Freehand(points) => Rect::from_points(points),
            SelectionShape::Magic(m) => {
                return Some(PixelBox { x: m.x, y: m.y, w: m.width(), h: m.height() });
            }
        };
        let x0 = rect.min.x.floor().clamp(0.0, CANVAS_WIDTH as f32) as u32;
        let y0 = rect.min.y.floor().clamp(0.0, CANVAS_HEIGHT as f32) as u32;
        let x1 = rect.max.x.ceil().clamp(0.0, CANVAS_WIDTH as f32) as u32;
        let y1 = rect.max.y.ceil().clamp(0.0, CANVAS_HEIGHT as f32) as u32;
        (x1 > x0 && y1 > y0).then_some(PixelBox { x: x0, y: y0, w: x1 - x0, h: y1 - y0 })
    }

    /// Mask covering `bounds()`, 255 inside the selection.
    fn mask(&self, b: PixelBox) -> GrayImage {
        match &self.shape {
            SelectionShape::Rectangle(_) => GrayImage::from_pixel(b.w, b.h, Luma([255])),
            SelectionShape::Freehand(points) => {
                let offset = egui::vec2(b.x as f32, b.y as f32);
                let local: Vec<Pos2> = points.iter().map(|p| *p - offset).collect();
                bitmap::fill_polygon(b.w, b.h, &local)
            }
            SelectionShape::Magic(m) => m.mask.clone(),
        }
    }

    /// Outline for display, in canvas coordinates.
    pub fn outline(&self) -> Vec<Pos2> {
        match &self.shape {
            SelectionShape::Freehand(points) => points.clone(),
            _ => match self.bounds() {
                Some(b) => {
                    let r = Rect::from_min_size(
                        egui::pos2(b.x as f32, b.y as f32),
                        egui::vec2(b.w as f32, b.h as f32),
                    );
                    vec![r.left_top(), r.right_top(), r.right_bottom(), r.left_bottom()]
                }
                None => Vec::new(),
            },
        }
    }
}

/// Grows a region from `seed` over pixels whose RGB lies within `tolerance` of the
/// seed's. Fully transparent pixels only ever match fully transparent pixels.
pub fn magic_wand(img: &RgbaImage, seed: (u32, u32), tolerance: u8) -> Option<MagicSelection> {
    let target = *img.get_pixel_checked(seed.0, seed.1)?;
    let cutoff = tolerance as i32 * tolerance as i32;
    let matches = |p: &Rgba<u8>| {
        if target[3] == 0 || p[3] == 0 {
            return target[3] == 0 && p[3] == 0;
        }
        let dr = p[0] as i32 - target[0] as i32;
        let dg = p[1] as i32 - target[1] as i32;
        let db = p[2] as i32 - target[2] as i32;
        dr * dr + dg * dg + db * db <= cutoff
    };
    let region = flood_region(img, seed, matches)?;
    let mask = imageops::crop_imm(&region.mask, region.min_x, region.min_y, region.width(), region.height()).to_image();
    Some(MagicSelection {
        x: region.min_x,
        y: region.min_y,
        mask,
        pixel_count: region.pixel_count,
    })
}

/// Pixels lifted off a layer, pending transform and commit.
#[derive(Clone, PartialEq)]
pub struct FloatingSelection {
    pub image: RgbaImage,
    pub layer: LayerId,
    /// Id of the frame the pixels were lifted from
    pub frame: String,
    pub transform: BoxTransform,
}

impl std::fmt::Debug for FloatingSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloatingSelection")
            .field("layer", &self.layer)
            .field("frame", &self.frame)
            .field("transform", &self.transform)
            .finish_non_exhaustive()
    }
}

impl FloatingSelection {
    /// Cuts the selected pixels out of `source`. The lifted copy starts at its
    /// original position, unrotated.
    pub fn lift(source: &mut RgbaImage, selection: &Selection, frame: &str) -> Option<Self> {
        let b = selection.bounds()?;
        let mask = selection.mask(b);
        let mut image = imageops::crop_imm(source, b.x, b.y, b.w, b.h).to_image();
        keep_inside(&mut image, &mask);

        for (mx, my, m) in mask.enumerate_pixels() {
            if m[0] == 0 {
                continue;
            }
            if let Some(px) = source.get_pixel_mut_checked(b.x + mx, b.y + my) {
                erase_pixel(px, m[0] as f32 / 255.0);
            }
        }

        Some(Self {
            image,
            layer: selection.layer.clone(),
            frame: frame.to_string(),
            transform: BoxTransform::new(b.x as f32, b.y as f32, b.w as f32, b.h as f32),
        })
    }

    /// Draws the transformed pixels back into `target` with a normal composite.
    pub fn commit(self, target: &mut RgbaImage) {
        let t = self.transform;
        bitmap::draw_transformed(target, &self.image, t.center(), t.size(), t.rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone() -> RgbaImage {
        // Left half red, right half blue.
        RgbaImage::from_fn(20, 10, |x, _| {
            if x < 10 { Rgba([200, 0, 0, 255]) } else { Rgba([0, 0, 200, 255]) }
        })
    }

    #[test]
    fn test_rectangle_is_normalised() {
        let sel = Selection::rectangle(egui::pos2(30.0, 40.0), egui::pos2(10.0, 5.0), LayerId::from("l"));
        assert_eq!(sel.bounds(), Some(PixelBox { x: 10, y: 5, w: 20, h: 35 }));
    }

    #[test]
    fn test_freehand_needs_three_points() {
        let layer = LayerId::from("l");
        assert!(Selection::freehand(vec![egui::pos2(0.0, 0.0), egui::pos2(5.0, 5.0)], layer.clone()).is_none());
        assert!(Selection::freehand(vec![egui::pos2(0.0, 0.0), egui::pos2(5.0, 0.0), egui::pos2(0.0, 5.0)], layer).is_some());
    }

    #[test]
    fn test_magic_wand_stops_at_colour_edge() {
        let img = two_tone();
        let m = magic_wand(&img, (3, 3), DEFAULT_TOLERANCE).unwrap();
        assert_eq!((m.x, m.y, m.width(), m.height()), (0, 0, 10, 10));
        assert_eq!(m.pixel_count, 100);
    }

    #[test]
    fn test_magic_wand_tolerance_admits_near_colours() {
        let mut img = two_tone();
        img.put_pixel(5, 5, Rgba([210, 10, 0, 255]));
        let m = magic_wand(&img, (0, 0), 20).unwrap();
        assert_eq!(m.pixel_count, 100);
        let strict = magic_wand(&img, (0, 0), 0).unwrap();
        assert_eq!(strict.pixel_count, 99);
    }

    #[test]
    fn test_transparent_only_matches_transparent() {
        let mut img = RgbaImage::new(4, 1);
        img.put_pixel(2, 0, Rgba([0, 0, 0, 1]));
        let m = magic_wand(&img, (0, 0), 255).unwrap();
        assert_eq!(m.pixel_count, 2);
    }

    #[test]
    fn test_lift_and_commit_in_place_restores_pixels() {
        let mut img = two_tone();
        let before = img.clone();
        let sel = Selection::rectangle(egui::pos2(5.0, 2.0), egui::pos2(15.0, 8.0), LayerId::from("l"));
        let floating = FloatingSelection::lift(&mut img, &sel, "f").unwrap();
        assert_eq!(img.get_pixel(6, 3)[3], 0);
        assert_eq!(img.get_pixel(2, 3)[3], 255);
        assert_eq!(floating.image.dimensions(), (10, 6));
        floating.commit(&mut img);
        assert_eq!(img, before);
    }

    #[test]
    fn test_lift_magic_keeps_only_mask() {
        let mut img = two_tone();
        let sel = Selection::magic(&img, egui::pos2(12.0, 1.0), 0, LayerId::from("l")).unwrap();
        let floating = FloatingSelection::lift(&mut img, &sel, "f").unwrap();
        assert_eq!(floating.transform, BoxTransform::new(10.0, 0.0, 10.0, 10.0));
        assert!(img.enumerate_pixels().all(|(x, _, p)| (x < 10) == (p[3] == 255)));
    }
}
