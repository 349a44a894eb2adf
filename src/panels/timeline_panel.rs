use egui::{Align2, Color32, CursorIcon, FontId, Id, Painter, Rect, Sense, Shape, Stroke, Ui, Vec2, pos2, vec2};

use crate::StoryboardApp;
use crate::state::TimelineDragKind;
use crate::timeline::{ElementRef, TrackItem, TrackKind};
use crate::util::time::format_ms;

const LABEL_WIDTH: f32 = 90.0;
const RULER_HEIGHT: f32 = 24.0;
const LANE_HEIGHT: f32 = 34.0;
const ITEM_MARGIN: f32 = 4.0;
const EDGE_WIDTH: f32 = 6.0;
const KEYFRAME_SIZE: f32 = 5.0;
/// Empty room kept after the last item so things can be dragged past the end
const TAIL_MS: f64 = 5000.0;

const PLAYHEAD_COLOR: Color32 = Color32::from_rgb(230, 60, 60);
const ACTIVE_BORDER: Color32 = Color32::WHITE;

fn lane_color(kind: TrackKind) -> Color32 {
    match kind {
        TrackKind::Frames => Color32::from_rgb(100, 180, 255),
        TrackKind::Dialogue => Color32::from_rgb(255, 200, 100),
        TrackKind::Audio => Color32::from_rgb(180, 255, 100),
        TrackKind::Reference => Color32::from_rgb(190, 150, 255),
        TrackKind::Animatic => Color32::from_rgb(255, 140, 170),
    }
}

/// One item as laid out on its lane.
struct LaneItem {
    element: ElementRef,
    start: f64,
    duration: f64,
    label: String,
}

fn lane_items(app: &StoryboardApp, kind: TrackKind) -> Vec<LaneItem> {
    fn collect<T: TrackItem>(items: &[T], make: impl Fn(&T) -> (ElementRef, String)) -> Vec<LaneItem> {
        items
            .iter()
            .map(|item| {
                let (element, label) = make(item);
                LaneItem { element, start: item.start(), duration: item.duration(), label }
            })
            .collect()
    }

    let tracks = app.editor.tracks();
    match kind {
        TrackKind::Frames => {
            let doc = app.editor.document();
            doc.frames()
                .iter()
                .enumerate()
                .map(|(i, frame)| LaneItem {
                    element: ElementRef::Frame(i),
                    start: doc.frame_start(i),
                    duration: frame.duration,
                    label: format!("#{}", i + 1),
                })
                .collect()
        }
        TrackKind::Dialogue => collect(&tracks.dialogues, |d| (ElementRef::Dialogue(d.id.clone()), d.text.clone())),
        TrackKind::Audio => collect(&tracks.audio, |a| (ElementRef::Audio(a.id.clone()), a.name.clone())),
        TrackKind::Reference => collect(&tracks.references, |r| (ElementRef::Reference(r.id.clone()), r.name.clone())),
        TrackKind::Animatic => collect(&tracks.animatics, |a| (ElementRef::Animatic(a.id.clone()), a.name.clone())),
    }
}

pub fn timeline_panel(app: &mut StoryboardApp, ctx: &egui::Context, now: f64) {
    egui::TopBottomPanel::bottom("timeline_panel")
        .resizable(true)
        .default_height(RULER_HEIGHT + LANE_HEIGHT * 5.0 + 60.0)
        .show(ctx, |ui| {
            controls(app, ui, now);
            ui.add_space(4.0);
            egui::ScrollArea::horizontal()
                .auto_shrink([false; 2])
                .show(ui, |ui| lanes(app, ctx, ui, now));
        });
}

fn controls(app: &mut StoryboardApp, ui: &mut Ui, now: f64) {
    ui.horizontal(|ui| {
        let playing = app.editor.clock().is_playing();
        if ui.button(if playing { "⏸" } else { "▶" }).clicked() {
            app.editor.toggle_play(now);
        }
        if ui.button("⏮").clicked() {
            app.editor.scrub(0.0, now);
        }
        let mut looping = app.editor.clock().is_looping();
        if ui.checkbox(&mut looping, "Loop").changed() {
            app.editor.set_looping(looping, now);
        }
        ui.label(format!(
            "{} / {}",
            format_ms(app.editor.current_time()),
            format_ms(app.editor.scene_duration())
        ));
        ui.separator();
        ui.weak(format!("{:.0} px/s", app.editor.view.pixels_per_second()));
        let t = app.editor.current_time();
        for (clip, at) in app.editor.tracks().audible_clips(t) {
            ui.separator();
            ui.weak(format!("♪ {} @ {}", clip.name, format_ms(at)));
        }
    });
}

fn lanes(app: &mut StoryboardApp, ctx: &egui::Context, ui: &mut Ui, now: f64) {
    let end = app.editor.scene_duration() + TAIL_MS;
    let width = (LABEL_WIDTH + app.editor.view.time_to_x(end)).max(ui.available_width());
    let height = RULER_HEIGHT + LANE_HEIGHT * TrackKind::ALL.len() as f32;
    let (rect, _) = ui.allocate_exact_size(vec2(width, height), Sense::hover());
    let origin_x = rect.left() + LABEL_WIDTH;
    let painter = ui.painter_at(rect);
    let view = app.editor.view;
    let to_x = |t: f64| origin_x + view.time_to_x(t);

    painter.rect_filled(rect, 0.0, ui.visuals().extreme_bg_color);

    // Ruler: click to seek, drag sideways to zoom.
    let ruler = Rect::from_min_max(pos2(origin_x, rect.top()), pos2(rect.right(), rect.top() + RULER_HEIGHT));
    draw_ruler(app, &painter, ruler, end);
    let ruler_response = ui.interact(ruler, Id::new("timeline_ruler"), Sense::click_and_drag());
    if ruler_response.clicked() {
        if let Some(p) = ruler_response.interact_pointer_pos() {
            app.editor.scrub(app.editor.view.x_to_time(p.x - origin_x), now);
        }
    }
    if ruler_response.drag_started() {
        let x = press_x(ctx, &ruler_response) - origin_x;
        app.editor.timeline_press(TimelineDragKind::Zoom, None, x, now);
    }

    for (row, kind) in TrackKind::ALL.into_iter().enumerate() {
        let top = rect.top() + RULER_HEIGHT + row as f32 * LANE_HEIGHT;
        let lane = Rect::from_min_size(pos2(rect.left(), top), vec2(rect.width(), LANE_HEIGHT));
        painter.line_segment(
            [lane.left_bottom(), lane.right_bottom()],
            Stroke::new(1.0, ui.visuals().widgets.noninteractive.bg_stroke.color),
        );
        painter.text(
            pos2(lane.left() + 6.0, lane.center().y),
            Align2::LEFT_CENTER,
            kind.label(),
            FontId::proportional(13.0),
            ui.visuals().text_color(),
        );

        for item in lane_items(app, kind) {
            let x0 = to_x(item.start);
            let x1 = to_x(item.start + item.duration);
            let item_rect = Rect::from_min_max(pos2(x0, top + ITEM_MARGIN), pos2(x1, top + LANE_HEIGHT - ITEM_MARGIN));
            let active = app.editor.active_element() == Some(&item.element);
            draw_item(&painter, item_rect, &item.label, lane_color(kind), active);
            interact_item(app, ctx, ui, &item, item_rect, origin_x, now);
        }

        if kind == TrackKind::Animatic {
            keyframe_markers(app, ui, &painter, top, origin_x);
        }
    }

    // Playhead on top of everything.
    let x = to_x(app.editor.current_time());
    painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], Stroke::new(2.0, PLAYHEAD_COLOR));
    let handle = Rect::from_center_size(pos2(x, ruler.center().y), vec2(10.0, RULER_HEIGHT));
    painter.rect_filled(handle, 2.0, PLAYHEAD_COLOR);
    let handle_response = ui.interact(handle, Id::new("timeline_playhead"), Sense::drag());
    if handle_response.drag_started() {
        let x = press_x(ctx, &handle_response) - origin_x;
        app.editor.timeline_press(TimelineDragKind::Scrub, None, x, now);
    }

    // The gesture outlives the widget that started it, so follow the raw pointer.
    if app.editor.gesture().is_timeline_drag() {
        let (down, pos) = ctx.input(|i| (i.pointer.primary_down(), i.pointer.interact_pos()));
        match (down, pos) {
            (true, Some(p)) => app.editor.timeline_drag(p.x - origin_x, now),
            _ => app.editor.timeline_release(),
        }
    }
}

/// Where the press that started a drag landed, so a drag starts exactly at the grab point.
fn press_x(ctx: &egui::Context, response: &egui::Response) -> f32 {
    ctx.input(|i| i.pointer.press_origin())
        .or_else(|| response.interact_pointer_pos())
        .map_or(response.rect.left(), |p| p.x)
}

fn draw_ruler(app: &StoryboardApp, painter: &Painter, ruler: Rect, end: f64) {
    let pps = app.editor.view.pixels_per_second();
    // A label every second when zoomed in, thinning out as the zoom drops.
    let step_ms = if pps >= 60.0 {
        1000.0
    } else if pps >= 25.0 {
        2000.0
    } else {
        5000.0
    };
    let mut t = 0.0;
    while t <= end {
        let x = ruler.left() + app.editor.view.time_to_x(t);
        painter.line_segment(
            [pos2(x, ruler.bottom() - 8.0), pos2(x, ruler.bottom())],
            Stroke::new(1.0, Color32::GRAY),
        );
        painter.text(
            pos2(x + 3.0, ruler.top() + 2.0),
            Align2::LEFT_TOP,
            format_ms(t),
            FontId::monospace(10.0),
            Color32::GRAY,
        );
        t += step_ms;
    }
}

fn draw_item(painter: &Painter, rect: Rect, label: &str, color: Color32, active: bool) {
    painter.rect_filled(rect, 4.0, color);
    let border = if active { ACTIVE_BORDER } else { Color32::from_black_alpha(60) };
    painter.rect_stroke(rect, 4.0, Stroke::new(if active { 2.0 } else { 1.0 }, border));
    if rect.width() > 24.0 {
        let clipped = painter.with_clip_rect(rect.shrink(2.0));
        clipped.text(
            pos2(rect.left() + 6.0, rect.center().y),
            Align2::LEFT_CENTER,
            label,
            FontId::proportional(12.0),
            Color32::BLACK,
        );
    }
}

fn interact_item(
    app: &mut StoryboardApp,
    ctx: &egui::Context,
    ui: &Ui,
    item: &LaneItem,
    rect: Rect,
    origin_x: f32,
    now: f64,
) {
    let id = Id::new(("timeline_item", &item.element));
    let body = ui.interact(rect, id.with("body"), Sense::click_and_drag());
    let edge = Vec2::new(EDGE_WIDTH.min(rect.width() * 0.25), rect.height());
    let left = ui.interact(
        Rect::from_min_size(rect.left_top(), edge),
        id.with("left"),
        Sense::drag(),
    );
    let right = ui.interact(
        Rect::from_min_size(rect.right_top() - vec2(edge.x, 0.0), edge),
        id.with("right"),
        Sense::drag(),
    );

    if left.hovered() || right.hovered() {
        ctx.set_cursor_icon(CursorIcon::ResizeHorizontal);
    }

    if body.clicked() {
        app.editor.set_active_element(Some(item.element.clone()));
        if let ElementRef::Frame(i) = item.element {
            app.editor.set_active_frame(i, now);
        }
    }

    let started = [
        (left.drag_started(), TimelineDragKind::TrimStart, &left),
        (right.drag_started(), TimelineDragKind::TrimEnd, &right),
        (body.drag_started(), TimelineDragKind::Move, &body),
    ]
    .into_iter()
    .find(|(started, _, _)| *started);
    if let Some((_, kind, response)) = started {
        let x = press_x(ctx, response) - origin_x;
        app.editor.timeline_press(kind, Some(item.element.clone()), x, now);
    }
}

fn keyframe_markers(app: &mut StoryboardApp, ui: &Ui, painter: &Painter, top: f32, origin_x: f32) {
    let y = top + LANE_HEIGHT - ITEM_MARGIN - KEYFRAME_SIZE;
    let selected = app.editor.selected_keyframe().map(|(a, k)| (a.to_string(), k.to_string()));

    let mut markers = Vec::new();
    for element in &app.editor.tracks().animatics {
        for key in &element.keyframes {
            let x = origin_x + app.editor.view.time_to_x(element.start_time + key.time_ms);
            markers.push((element.id.clone(), key.id.clone(), pos2(x, y)));
        }
    }

    let mut clicked = None;
    for (animatic, key, center) in markers {
        let is_selected = selected.as_ref().is_some_and(|(a, k)| *a == animatic && *k == key);
        let color = if is_selected { Color32::YELLOW } else { Color32::from_gray(40) };
        let s = KEYFRAME_SIZE;
        let diamond = vec![
            center + vec2(0.0, -s),
            center + vec2(s, 0.0),
            center + vec2(0.0, s),
            center + vec2(-s, 0.0),
        ];
        painter.add(Shape::convex_polygon(diamond, color, Stroke::new(1.0, Color32::WHITE)));

        let hit = Rect::from_center_size(center, Vec2::splat(s * 2.5));
        if ui.interact(hit, Id::new(("keyframe", &key)), Sense::click()).clicked() {
            clicked = Some((animatic, key));
        }
    }
    if let Some((animatic, key)) = clicked {
        app.editor.select_keyframe(&animatic, &key);
    }
}
