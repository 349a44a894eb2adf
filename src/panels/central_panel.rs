use egui::epaint::Vertex;
use egui::{Align2, Color32, Event, FontId, Mesh, Painter, Pos2, Rect, Sense, Shape, Stroke, TextureId, TextureOptions, Vec2};

use crate::StoryboardApp;
use crate::bitmap::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::gizmo::{self, BoxTransform, HANDLE_PICK_RADIUS};
use crate::state::Gesture;
use crate::stroke::{PointerKind, StrokeSample};
use crate::texture_manager::{TextureGenerationError, color_image};
use crate::timeline::{ElementRef, TrackItem};
use crate::tool::ToolKind;

const SELECTION_COLOR: Color32 = Color32::from_rgb(0, 120, 255);
const ONION_TINT: Color32 = Color32::from_rgba_premultiplied(70, 70, 70, 70);
const UV_FULL: Rect = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));

/// Maps the fixed logical canvas into the space the panel gives it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasView {
    pub rect: Rect,
    pub scale: f32,
}

impl CanvasView {
    /// Largest aspect-preserving fit of the canvas, centred in `available`.
    pub fn fit(available: Rect) -> Self {
        let logical = Vec2::new(CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32);
        let scale = (available.width() / logical.x)
            .min(available.height() / logical.y)
            .max(0.01);
        let rect = Rect::from_center_size(available.center(), logical * scale);
        Self { rect, scale }
    }

    pub fn to_screen(&self, p: Pos2) -> Pos2 {
        self.rect.min + p.to_vec2() * self.scale
    }

    pub fn to_canvas(&self, p: Pos2) -> Pos2 {
        ((p - self.rect.min) / self.scale).to_pos2()
    }
}

pub fn central_panel(app: &mut StoryboardApp, ctx: &egui::Context) {
    egui::CentralPanel::default().show(ctx, |ui| {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let view = CanvasView::fit(response.rect);

        painter.rect_filled(response.rect, 0.0, ui.visuals().extreme_bg_color);
        painter.rect_filled(view.rect, 0.0, Color32::WHITE);

        draw_references(app, &painter, &view);
        draw_frames(app, ctx, &painter, &view);
        draw_animatics(app, ctx, &painter, &view);
        draw_stroke_overlay(app, ctx, &painter, &view);
        draw_floating(app, ctx, &painter, &view);
        draw_selection(app, &painter, &view);
        draw_captions(app, &painter, &view);
        draw_gizmo(app, ctx, &painter, &view);

        handle_pointer(app, ctx, &response, &view);
    });
}

fn texture_or_log(result: Result<TextureId, TextureGenerationError>, what: &str) -> Option<TextureId> {
    result
        .map_err(|err| log::warn!("Could not build texture for {what}: {err}"))
        .ok()
}

fn draw_frames(app: &mut StoryboardApp, ctx: &egui::Context, painter: &Painter, view: &CanvasView) {
    let doc = app.editor.document();
    let active = doc.active_frame_index();
    let revision = doc.revision();

    let mut layers = Vec::with_capacity(2);
    if app.settings.onion_skin && active > 0 {
        layers.push((active - 1, ONION_TINT));
    }
    layers.push((active, Color32::WHITE));

    for (index, tint) in layers {
        let Some(frame) = doc.frame(index) else {
            continue;
        };
        let texture = app.textures.get_or_create_texture(
            &frame.id,
            revision,
            || color_image(&frame.composite()),
            ctx,
        );
        if let Some(id) = texture_or_log(texture, "frame") {
            painter.image(id, view.rect, UV_FULL, tint);
        }
    }
}

fn draw_references(app: &StoryboardApp, painter: &Painter, view: &CanvasView) {
    let t = app.editor.current_time();
    for clip in app.editor.tracks().visible_references(t) {
        let b = clip.box_transform();
        let corners: Vec<Pos2> = b.corners().iter().map(|&p| view.to_screen(p)).collect();
        let alpha = (clip.opacity.clamp(0.0, 1.0) * 90.0) as u8;
        painter.add(Shape::convex_polygon(
            corners,
            Color32::from_rgba_unmultiplied(120, 160, 220, alpha),
            Stroke::new(1.0, Color32::from_rgb(90, 120, 170)),
        ));
        painter.text(
            view.to_screen(b.center()),
            Align2::CENTER_CENTER,
            &clip.name,
            FontId::proportional(14.0),
            Color32::from_rgb(60, 80, 120),
        );
    }
}

fn draw_animatics(app: &mut StoryboardApp, ctx: &egui::Context, painter: &Painter, view: &CanvasView) {
    let t = app.editor.current_time();
    for element in app.editor.tracks().visible_animatics(t) {
        let texture = app.textures.get_or_create_texture(
            &element.id,
            element.sprite_revision(),
            || {
                element
                    .sprite()
                    .ok_or(TextureGenerationError::Empty)
                    .and_then(|img| color_image(&img))
            },
            ctx,
        );
        let Some(id) = texture_or_log(texture, "sprite") else {
            continue;
        };
        let pos = element.position_at(t);
        let rect = Rect::from_min_size(view.to_screen(pos), element.sprite_size() * view.scale);
        painter.image(id, rect, UV_FULL, Color32::WHITE);
    }
}

fn draw_stroke_overlay(app: &mut StoryboardApp, ctx: &egui::Context, painter: &Painter, view: &CanvasView) {
    let Gesture::Stroking { renderer, .. } = app.editor.gesture() else {
        return;
    };
    let Some(overlay) = renderer.overlay() else {
        return;
    };
    let Ok(image) = color_image(overlay) else {
        return;
    };
    let alpha = (renderer.style().alpha * app.editor.tool_settings.opacity).clamp(0.0, 1.0);
    if let Some(handle) = app.stroke_overlay.as_mut() {
        handle.set(image, TextureOptions::LINEAR);
    } else {
        app.stroke_overlay = Some(ctx.load_texture("stroke_overlay", image, TextureOptions::LINEAR));
    }
    if let Some(handle) = &app.stroke_overlay {
        painter.image(handle.id(), view.rect, UV_FULL, Color32::from_white_alpha((alpha * 255.0) as u8));
    }
}

/// Draws a texture onto an arbitrary (possibly rotated) quad given in screen space.
fn textured_quad(painter: &Painter, texture: TextureId, corners: [Pos2; 4]) {
    let mut mesh = Mesh::with_texture(texture);
    let uvs = [Pos2::new(0.0, 0.0), Pos2::new(1.0, 0.0), Pos2::new(1.0, 1.0), Pos2::new(0.0, 1.0)];
    for (pos, uv) in corners.into_iter().zip(uvs) {
        mesh.vertices.push(Vertex { pos, uv, color: Color32::WHITE });
    }
    mesh.add_triangle(0, 1, 2);
    mesh.add_triangle(0, 2, 3);
    painter.add(Shape::mesh(mesh));
}

fn draw_floating(app: &mut StoryboardApp, ctx: &egui::Context, painter: &Painter, view: &CanvasView) {
    let Some(floating) = app.editor.floating() else {
        app.textures.invalidate("floating");
        return;
    };
    let texture = app.textures.get_or_create_texture(
        "floating",
        app.editor.document().revision(),
        || color_image(&floating.image),
        ctx,
    );
    if let Some(id) = texture_or_log(texture, "floating selection") {
        textured_quad(painter, id, floating.transform.corners().map(|p| view.to_screen(p)));
    }
}

fn draw_selection(app: &StoryboardApp, painter: &Painter, view: &CanvasView) {
    let stroke = Stroke::new(1.0, SELECTION_COLOR);
    if let Some(selection) = app.editor.selection() {
        if app.editor.floating().is_none() {
            let outline: Vec<Pos2> = selection.outline().into_iter().map(|p| view.to_screen(p)).collect();
            if outline.len() >= 2 {
                painter.add(Shape::closed_line(outline, stroke));
            }
        }
    }

    if let Gesture::Selecting { start, current, points, .. } = app.editor.gesture() {
        match app.editor.tool() {
            ToolKind::RectSelect => {
                let rect = Rect::from_two_pos(view.to_screen(*start), view.to_screen(*current));
                painter.rect_stroke(rect, 0.0, stroke);
            }
            _ => {
                let path: Vec<Pos2> = points.iter().map(|&p| view.to_screen(p)).collect();
                painter.add(Shape::line(path, stroke));
            }
        }
    }
}

fn draw_captions(app: &StoryboardApp, painter: &Painter, view: &CanvasView) {
    let t = app.editor.current_time();
    for dialogue in app.editor.tracks().visible_dialogues(t) {
        if dialogue.text.trim().is_empty() {
            continue;
        }
        let font = FontId::proportional((dialogue.font_size * view.scale).max(6.0));
        let galley = painter.layout_no_wrap(dialogue.text.clone(), font, Color32::WHITE);
        let anchor = view.to_screen(Pos2::new(dialogue.x, dialogue.y));
        let rect = Align2::CENTER_CENTER.anchor_size(anchor, galley.size());
        painter.rect_filled(rect.expand(4.0), 4.0, Color32::from_black_alpha(170));
        painter.galley(rect.min, galley, Color32::WHITE);
    }
}

fn draw_gizmo(app: &StoryboardApp, ctx: &egui::Context, painter: &Painter, view: &CanvasView) {
    if app.editor.tool() != ToolKind::Transform {
        return;
    }
    let t = app.editor.current_time();
    let target: Option<BoxTransform> = match (app.editor.floating(), app.editor.active_element()) {
        (Some(floating), _) => Some(floating.transform),
        (None, Some(ElementRef::Reference(id))) => app
            .editor
            .tracks()
            .references
            .iter()
            .find(|r| r.id == *id && r.is_active_at(t))
            .map(|r| r.box_transform()),
        _ => None,
    };
    let Some(b) = target else {
        return;
    };
    let hovered = ctx
        .input(|i| i.pointer.hover_pos())
        .map(|p| gizmo::hit_test(&b, view.to_canvas(p), HANDLE_PICK_RADIUS / view.scale));
    gizmo::paint(painter, &b, hovered, |p| view.to_screen(p));
}

/// Latest pen or touch pressure reported this frame.
fn pointer_pressure(ctx: &egui::Context) -> Option<f32> {
    ctx.input(|i| {
        i.events.iter().rev().find_map(|event| match event {
            Event::Touch { force, .. } => *force,
            _ => None,
        })
    })
}

fn handle_pointer(app: &mut StoryboardApp, ctx: &egui::Context, response: &egui::Response, view: &CanvasView) {
    if app.editor.is_loading() {
        return;
    }
    let (pressed, down, released, delta, pos) = ctx.input(|i| {
        (
            i.pointer.primary_pressed(),
            i.pointer.primary_down(),
            i.pointer.primary_released(),
            i.pointer.delta(),
            i.pointer.interact_pos(),
        )
    });
    let Some(pos) = pos else {
        return;
    };
    let pressure = pointer_pressure(ctx);
    let kind = if pressure.is_some() { PointerKind::Pen } else { PointerKind::Mouse };
    let sample = StrokeSample::new(view.to_canvas(pos), pressure, kind);

    let gesture = app.editor.gesture();
    let on_canvas = gesture.is_stroking() || gesture.is_selecting() || gesture.is_transforming();

    if pressed && response.hovered() && view.rect.contains(pos) {
        app.editor.pointer_down(sample);
    } else if on_canvas {
        if released || !down {
            app.editor.pointer_up();
        } else if !view.rect.contains(pos) {
            app.editor.pointer_leave();
        } else if delta != Vec2::ZERO {
            app.editor.pointer_move(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_view_round_trips_points() {
        let view = CanvasView::fit(Rect::from_min_size(Pos2::new(100.0, 50.0), Vec2::new(640.0, 600.0)));
        assert!((view.scale - 0.5).abs() < 1e-6);
        assert!((view.rect.height() - 360.0).abs() < 1e-3);

        let p = Pos2::new(300.0, 200.0);
        let back = view.to_canvas(view.to_screen(p));
        assert!((back - p).length() < 1e-3);
        assert_eq!(view.to_screen(Pos2::ZERO), view.rect.min);
    }
}
