use egui::{Slider, Ui};

use crate::StoryboardApp;
use crate::document::FrameInsert;
use crate::layer::MAX_LAYERS;
use crate::stroke::BrushPreset;
use crate::timeline::{ElementRef, TrackItem};
use crate::tool::ToolKind;
#[cfg(not(target_arch = "wasm32"))]
use crate::upload::AssetKind;

pub fn tools_panel(app: &mut StoryboardApp, ctx: &egui::Context) {
    egui::SidePanel::left("tools_panel")
        .resizable(true)
        .default_width(230.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                tool_section(app, ui);
                ui.separator();
                layer_section(app, ui);
                ui.separator();
                frame_section(app, ui);
                ui.separator();
                element_section(app, ui);
                ui.separator();
                scene_section(app, ui);
            });
        });
}

fn tool_section(app: &mut StoryboardApp, ui: &mut Ui) {
    ui.heading("Tools");

    let active = app.editor.tool();
    ui.horizontal_wrapped(|ui| {
        for tool in ToolKind::ALL {
            if ui.selectable_label(active == tool, tool.label()).clicked() {
                log::info!("Tool selected from UI: {}", tool.label());
                app.editor.set_tool(tool);
            }
        }
    });

    let settings = &mut app.editor.tool_settings;
    match active {
        ToolKind::Brush => {
            egui::ComboBox::from_label("Preset")
                .selected_text(settings.preset.label())
                .show_ui(ui, |ui| {
                    for preset in BrushPreset::ALL {
                        if ui.selectable_label(settings.preset == preset, preset.label()).clicked() {
                            settings.select_preset(preset);
                        }
                    }
                });
            ui.horizontal(|ui| {
                ui.label("Color:");
                egui::color_picker::color_edit_button_srgba(
                    ui,
                    &mut settings.color,
                    egui::color_picker::Alpha::Opaque,
                );
            });
            let mut size = settings.effective_size();
            if ui.add(Slider::new(&mut size, 1.0..=64.0).text("Size")).changed() {
                settings.size = Some(size);
            }
            ui.add(Slider::new(&mut settings.opacity, 0.05..=1.0).text("Opacity"));
        }
        ToolKind::Eraser => {
            ui.add(Slider::new(&mut settings.eraser_size, 1.0..=128.0).text("Size"));
        }
        ToolKind::Bucket => {
            ui.horizontal(|ui| {
                ui.label("Fill:");
                egui::color_picker::color_edit_button_srgba(
                    ui,
                    &mut settings.color,
                    egui::color_picker::Alpha::Opaque,
                );
            });
        }
        ToolKind::MagicWand => {
            ui.add(Slider::new(&mut settings.tolerance, 0..=255).text("Tolerance"));
        }
        ToolKind::RectSelect | ToolKind::Lasso | ToolKind::Transform => {}
    }

    if app.editor.floating().is_some() {
        ui.horizontal(|ui| {
            if ui.button("Commit").clicked() {
                app.editor.commit_floating();
            }
            if ui.button("Make sprite").clicked() {
                app.editor.animatic_from_floating("Sprite");
            }
        });
    } else if app.editor.selection().is_some() && ui.button("Clear selection").clicked() {
        app.editor.clear_selection();
    }

    ui.horizontal(|ui| {
        if ui.add_enabled(app.editor.can_undo(), egui::Button::new("Undo")).clicked() {
            app.editor.undo();
        }
        ui.label(format!("{} step(s)", app.editor.undo_depth()));
    });
}

fn layer_section(app: &mut StoryboardApp, ui: &mut Ui) {
    ui.heading("Layers");

    let active_id = app.editor.document().active_layer_id().clone();
    let layers: Vec<_> = app
        .editor
        .document()
        .active_frame()
        .layers
        .iter()
        .map(|l| (l.id.clone(), l.name.clone(), l.visible))
        .collect();

    // Topmost layer first.
    for (id, name, visible) in layers.iter().rev() {
        ui.horizontal(|ui| {
            let mut shown = *visible;
            if ui.checkbox(&mut shown, "").changed() {
                app.editor.toggle_layer_visibility(id);
            }
            if ui.selectable_label(*id == active_id, name).clicked() {
                app.editor.select_layer(id);
            }
            if layers.len() > 1 && ui.small_button("✕").clicked() {
                app.editor.delete_layer(id);
            }
        });
    }

    if let Some(layer) = app.editor.document().active_layer() {
        let mut name = layer.name.clone();
        if ui.text_edit_singleline(&mut name).changed() {
            app.editor.rename_layer(&active_id, &name);
        }
    }

    let can_add = layers.len() < MAX_LAYERS;
    if ui.add_enabled(can_add, egui::Button::new("+ Layer")).clicked() {
        app.editor.add_layer();
    }
}

fn frame_section(app: &mut StoryboardApp, ui: &mut Ui) {
    let index = app.editor.document().active_frame_index();
    let count = app.editor.document().frame_count();
    ui.heading(format!("Frame {} / {count}", index + 1));

    ui.horizontal_wrapped(|ui| {
        if ui.button("+ Before").clicked() {
            app.editor.add_frame(FrameInsert::Before);
        }
        if ui.button("+ After").clicked() {
            app.editor.add_frame(FrameInsert::After);
        }
        if ui.button("Duplicate").clicked() {
            app.editor.duplicate_frame(index);
        }
        if ui.add_enabled(count > 1, egui::Button::new("Delete")).clicked() {
            app.editor.delete_frame(index);
        }
    });

    if let Some(frame) = app.editor.document().frame(index) {
        let mut duration = frame.duration;
        let mut action = frame.action.clone().unwrap_or_default();
        if ui
            .add(egui::DragValue::new(&mut duration).speed(10.0).suffix(" ms"))
            .changed()
        {
            app.editor.set_frame_duration(index, duration);
        }
        ui.label("Action notes:");
        if ui.text_edit_multiline(&mut action).changed() {
            let action = (!action.trim().is_empty()).then_some(action);
            app.editor.set_frame_action(index, action);
        }
    }

    ui.checkbox(&mut app.settings.onion_skin, "Onion skin");
}

fn element_section(app: &mut StoryboardApp, ui: &mut Ui) {
    ui.heading("Timeline item");

    let Some(element) = app.editor.active_element().cloned() else {
        ui.weak("Nothing selected");
        return;
    };

    match &element {
        ElementRef::Frame(i) => {
            ui.label(format!("Frame {}", i + 1));
        }
        ElementRef::Dialogue(id) => {
            if let Some(mut d) = app.editor.tracks().dialogues.iter().find(|d| d.id == *id).cloned() {
                let mut changed = ui.text_edit_multiline(&mut d.text).changed();
                changed |= ui.add(Slider::new(&mut d.font_size, 10.0..=96.0).text("Font size")).changed();
                if changed {
                    replace_item(&mut app.editor.tracks_mut().dialogues, d);
                }
            }
        }
        ElementRef::Audio(id) => {
            if let Some(mut a) = app.editor.tracks().audio.iter().find(|a| a.id == *id).cloned() {
                ui.label(&a.name);
                if ui.add(Slider::new(&mut a.volume, 0.0..=1.0).text("Volume")).changed() {
                    replace_item(&mut app.editor.tracks_mut().audio, a);
                }
            }
        }
        ElementRef::Reference(id) => {
            if let Some(mut r) = app.editor.tracks().references.iter().find(|r| r.id == *id).cloned() {
                ui.label(&r.name);
                if ui.add(Slider::new(&mut r.opacity, 0.0..=1.0).text("Opacity")).changed() {
                    replace_item(&mut app.editor.tracks_mut().references, r);
                }
            }
        }
        ElementRef::Animatic(id) => {
            ui.horizontal(|ui| {
                if ui.button("Key position").clicked() {
                    app.editor.set_keyframe_at_playhead(id, None);
                }
                let has_key = app.editor.selected_keyframe().is_some_and(|(a, _)| a == id);
                if ui.add_enabled(has_key, egui::Button::new("Delete key")).clicked() {
                    app.editor.delete_selected_keyframe();
                }
            });
        }
    }

    ui.horizontal(|ui| {
        if ui.button("Split").clicked() {
            app.editor.split_element_at_playhead(&element);
        }
        if ui.button("Duplicate").clicked() {
            app.editor.duplicate_element(&element);
        }
        if ui.button("Delete").clicked() {
            app.editor.delete_element(&element);
        }
    });
}

/// Writes an edited copy back over the item with the same id.
fn replace_item<T: TrackItem>(items: &mut [T], edited: T) {
    if let Some(slot) = items.iter_mut().find(|i| i.id() == edited.id()) {
        *slot = edited;
    }
}

fn scene_section(app: &mut StoryboardApp, ui: &mut Ui) {
    ui.heading("Scene");

    ui.horizontal(|ui| {
        ui.text_edit_singleline(&mut app.scene_input);
        if ui.button("Open").clicked() {
            let key = app.scene_input.trim().to_string();
            if !key.is_empty() && key != app.editor.scene_key() {
                app.editor.open_scene(&key);
                app.textures.clear_cache();
            }
        }
    });

    if ui.button("+ Dialogue").clicked() {
        app.editor.add_dialogue("New line");
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        ui.label("Import file:");
        ui.text_edit_singleline(&mut app.import_path);
        ui.horizontal(|ui| {
            for (label, kind) in [("Audio", AssetKind::Audio), ("Image", AssetKind::Image)] {
                if ui.button(label).clicked() && !app.import_path.trim().is_empty() {
                    let path = std::path::PathBuf::from(app.import_path.trim());
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| label.to_string());
                    app.editor
                        .begin_upload(kind, &name, crate::upload::local_file_upload(kind, path));
                }
            }
        });
    }

    let status = if app.editor.is_loading() {
        "Loading…"
    } else if app.editor.is_saving() {
        "Saving…"
    } else if app.editor.has_unsaved_changes() {
        "Unsaved changes"
    } else {
        "Saved"
    };
    ui.weak(status);
}
