use egui::{Color32, Painter, Pos2, Rect, Shape, Stroke, Vec2};
use serde::{Deserialize, Serialize};

/// Boxes never shrink below this many logical pixels on either axis.
pub const MIN_BOX_SIZE: f32 = 4.0;
/// Pick radius around a handle, in logical canvas pixels.
pub const HANDLE_PICK_RADIUS: f32 = 8.0;

const HANDLE_SIZE: f32 = 8.0;
const HANDLE_COLOR: Color32 = Color32::from_rgb(30, 144, 255);
const HANDLE_HOVER_COLOR: Color32 = Color32::from_rgb(135, 206, 250);

/// A rectangle of size `w × h` whose unrotated top-left corner is (`x`, `y`),
/// rotated by `rotation` radians about its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxTransform {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub rotation: f32,
}

impl BoxTransform {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h, rotation: 0.0 }
    }

    pub fn center(&self) -> Pos2 {
        egui::pos2(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    pub fn size(&self) -> Vec2 {
        egui::vec2(self.w, self.h)
    }

    /// World point into the box's local frame (origin at the centre, unrotated).
    pub fn to_local(&self, p: Pos2) -> Vec2 {
        rotate(p - self.center(), -self.rotation)
    }

    pub fn to_world(&self, local: Vec2) -> Pos2 {
        self.center() + rotate(local, self.rotation)
    }

    pub fn contains(&self, p: Pos2) -> bool {
        let l = self.to_local(p);
        l.x.abs() <= self.w * 0.5 && l.y.abs() <= self.h * 0.5
    }

    pub fn corners(&self) -> [Pos2; 4] {
        let (hw, hh) = (self.w * 0.5, self.h * 0.5);
        [
            self.to_world(egui::vec2(-hw, -hh)),
            self.to_world(egui::vec2(hw, -hh)),
            self.to_world(egui::vec2(hw, hh)),
            self.to_world(egui::vec2(-hw, hh)),
        ]
    }

    pub fn handle_position(&self, handle: Handle) -> Pos2 {
        let (sx, sy) = handle.sign();
        self.to_world(egui::vec2(sx * self.w * 0.5, sy * self.h * 0.5))
    }
}

/// The eight resize handles: four corners and four edge midpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::TopLeft,
        Handle::Top,
        Handle::TopRight,
        Handle::Right,
        Handle::BottomRight,
        Handle::Bottom,
        Handle::BottomLeft,
        Handle::Left,
    ];

    /// Direction of the handle from the centre, per axis, in `{-1, 0, 1}`.
    pub fn sign(self) -> (f32, f32) {
        match self {
            Handle::TopLeft => (-1.0, -1.0),
            Handle::Top => (0.0, -1.0),
            Handle::TopRight => (1.0, -1.0),
            Handle::Right => (1.0, 0.0),
            Handle::BottomRight => (1.0, 1.0),
            Handle::Bottom => (0.0, 1.0),
            Handle::BottomLeft => (-1.0, 1.0),
            Handle::Left => (-1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize(Handle),
    Rotate,
}

/// Handles win over the body; anything outside the box rotates.
pub fn hit_test(b: &BoxTransform, p: Pos2, pick_radius: f32) -> DragKind {
    let local = b.to_local(p);
    for handle in Handle::ALL {
        let (sx, sy) = handle.sign();
        let at = egui::vec2(sx * b.w * 0.5, sy * b.h * 0.5);
        if (local - at).length() <= pick_radius {
            return DragKind::Resize(handle);
        }
    }
    if b.contains(p) {
        DragKind::Move
    } else {
        DragKind::Rotate
    }
}

/// One in-progress transform drag, applied against the box as it was at press time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformDrag {
    pub kind: DragKind,
    pub origin: Pos2,
    pub start: BoxTransform,
}

impl TransformDrag {
    pub fn begin(b: BoxTransform, pointer: Pos2) -> Self {
        Self {
            kind: hit_test(&b, pointer, HANDLE_PICK_RADIUS),
            origin: pointer,
            start: b,
        }
    }

    pub fn apply(&self, pointer: Pos2) -> BoxTransform {
        let start = self.start;
        match self.kind {
            DragKind::Move => {
                let delta = pointer - self.origin;
                BoxTransform { x: start.x + delta.x, y: start.y + delta.y, ..start }
            }
            DragKind::Rotate => {
                let c = start.center();
                let a0 = angle_of(self.origin - c);
                let a1 = angle_of(pointer - c);
                BoxTransform { rotation: start.rotation + (a1 - a0), ..start }
            }
            DragKind::Resize(handle) => resize(&start, handle, pointer),
        }
    }
}

/// Scales the box so the dragged handle follows `pointer` while the opposite
/// edge or corner stays fixed in world space.
fn resize(start: &BoxTransform, handle: Handle, pointer: Pos2) -> BoxTransform {
    let (sx, sy) = handle.sign();
    let local = start.to_local(pointer);
    let anchor = egui::vec2(-sx * start.w * 0.5, -sy * start.h * 0.5);

    let w = if sx != 0.0 { (sx * (local.x - anchor.x)).max(MIN_BOX_SIZE) } else { start.w };
    let h = if sy != 0.0 { (sy * (local.y - anchor.y)).max(MIN_BOX_SIZE) } else { start.h };

    let center_local = egui::vec2(anchor.x + sx * w * 0.5, anchor.y + sy * h * 0.5);
    let center = start.to_world(center_local);
    BoxTransform {
        x: center.x - w * 0.5,
        y: center.y - h * 0.5,
        w,
        h,
        rotation: start.rotation,
    }
}

fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    egui::vec2(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

fn angle_of(v: Vec2) -> f32 {
    v.y.atan2(v.x)
}

/// Draws the box outline and its handles. `to_screen` maps canvas to screen space.
pub fn paint(painter: &Painter, b: &BoxTransform, hovered: Option<DragKind>, to_screen: impl Fn(Pos2) -> Pos2) {
    let outline: Vec<Pos2> = b.corners().iter().map(|&p| to_screen(p)).collect();
    painter.add(Shape::closed_line(outline, Stroke::new(1.0, HANDLE_COLOR)));

    for handle in Handle::ALL {
        let pos = to_screen(b.handle_position(handle));
        let color = if hovered == Some(DragKind::Resize(handle)) {
            HANDLE_HOVER_COLOR
        } else {
            HANDLE_COLOR
        };
        painter.rect_filled(Rect::from_center_size(pos, Vec2::splat(HANDLE_SIZE)), 0.0, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Pos2, b: Pos2) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn test_hit_test_kinds() {
        let b = BoxTransform::new(100.0, 100.0, 200.0, 100.0);
        assert_eq!(hit_test(&b, egui::pos2(101.0, 99.0), 8.0), DragKind::Resize(Handle::TopLeft));
        assert_eq!(hit_test(&b, egui::pos2(300.0, 150.0), 8.0), DragKind::Resize(Handle::Right));
        assert_eq!(hit_test(&b, egui::pos2(200.0, 150.0), 8.0), DragKind::Move);
        assert_eq!(hit_test(&b, egui::pos2(50.0, 50.0), 8.0), DragKind::Rotate);
    }

    #[test]
    fn test_hit_test_follows_rotation() {
        let mut b = BoxTransform::new(100.0, 100.0, 200.0, 100.0);
        b.rotation = std::f32::consts::FRAC_PI_2;
        // Rotated a quarter turn, the right edge midpoint now sits below the centre.
        let right = b.handle_position(Handle::Right);
        assert!(approx(right, egui::pos2(200.0, 250.0)));
        assert_eq!(hit_test(&b, right, 8.0), DragKind::Resize(Handle::Right));
    }

    #[test]
    fn test_resize_keeps_opposite_corner() {
        let b = BoxTransform::new(0.0, 0.0, 100.0, 100.0);
        let drag = TransformDrag::begin(b, egui::pos2(100.0, 100.0));
        assert_eq!(drag.kind, DragKind::Resize(Handle::BottomRight));
        let out = drag.apply(egui::pos2(150.0, 120.0));
        assert!((out.w - 150.0).abs() < 1e-3);
        assert!((out.h - 120.0).abs() < 1e-3);
        assert!(approx(egui::pos2(out.x, out.y), egui::pos2(0.0, 0.0)));
    }

    #[test]
    fn test_resize_rotated_keeps_anchor_in_world() {
        let mut b = BoxTransform::new(0.0, 0.0, 100.0, 50.0);
        b.rotation = 0.7;
        let anchor = b.handle_position(Handle::TopLeft);
        let grab = b.handle_position(Handle::BottomRight);
        let drag = TransformDrag::begin(b, grab);
        let out = drag.apply(grab + egui::vec2(20.0, 35.0));
        assert!(approx(out.handle_position(Handle::TopLeft), anchor));
    }

    #[test]
    fn test_resize_respects_minimum() {
        let b = BoxTransform::new(0.0, 0.0, 100.0, 100.0);
        let drag = TransformDrag::begin(b, egui::pos2(100.0, 50.0));
        let out = drag.apply(egui::pos2(-500.0, 50.0));
        assert_eq!(out.w, MIN_BOX_SIZE);
        assert_eq!(out.h, 100.0);
        assert!(approx(egui::pos2(out.x, out.y), egui::pos2(0.0, 0.0)));
    }

    #[test]
    fn test_rotate_by_angle_about_centre() {
        let b = BoxTransform::new(0.0, 0.0, 100.0, 100.0);
        let drag = TransformDrag { kind: DragKind::Rotate, origin: egui::pos2(150.0, 50.0), start: b };
        let out = drag.apply(egui::pos2(50.0, 150.0));
        assert!((out.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-4);
        assert_eq!(out.center(), b.center());
    }

    #[test]
    fn test_move_translates() {
        let b = BoxTransform::new(10.0, 10.0, 20.0, 20.0);
        let drag = TransformDrag::begin(b, egui::pos2(20.0, 20.0));
        let out = drag.apply(egui::pos2(25.0, 40.0));
        assert_eq!((out.x, out.y), (15.0, 30.0));
    }
}
